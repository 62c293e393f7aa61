use crate::error::Result;

mod env;
mod providers;
mod worker;

pub use providers::{
    AwsConfig, AwsCredentials, DEFAULT_SEQERA_BASE_URL, SecretConfig, SeqeraConfig,
};
pub use worker::{DEFAULT_TOPIC, RetryConfig, RetryMode, WorkerConfig};

#[derive(Debug, Clone, Default)]
pub struct AppConfig {
    pub worker: WorkerConfig,
    pub aws: AwsConfig,
    pub seqera: SeqeraConfig,
    pub secrets: SecretConfig,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            worker: WorkerConfig::from_env()?,
            aws: AwsConfig::from_env(),
            seqera: SeqeraConfig::from_env(),
            secrets: SecretConfig::from_env(),
        })
    }
}
