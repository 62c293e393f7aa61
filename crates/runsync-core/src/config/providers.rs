use super::env::{first_non_empty_env, normalize_base_url, read_env_u64, read_non_empty_env};

const ENV_AWS_REGION: &str = "AWS_REGION";
const ENV_AWS_DEFAULT_REGION: &str = "AWS_DEFAULT_REGION";
const ENV_OMICS_ENDPOINT: &str = "RUNSYNC_OMICS_ENDPOINT";
const ENV_SSM_ENDPOINT: &str = "RUNSYNC_SSM_ENDPOINT";
const ENV_AWS_TIMEOUT_MS: &str = "RUNSYNC_AWS_TIMEOUT_MS";
const ENV_SEQERA_BASE_URL: &str = "RUNSYNC_SEQERA_BASE_URL";
const ENV_SEQERA_TIMEOUT_MS: &str = "RUNSYNC_SEQERA_TIMEOUT_MS";
const ENV_SECRET_PREFIX: &str = "RUNSYNC_SECRET_PREFIX";

const DEFAULT_AWS_REGION: &str = "us-east-1";
const DEFAULT_AWS_TIMEOUT_MS: u64 = 5_000;
pub const DEFAULT_SEQERA_BASE_URL: &str = "https://api.cloud.seqera.io";
const DEFAULT_SEQERA_TIMEOUT_MS: u64 = 5_000;

#[derive(Clone, PartialEq, Eq)]
pub struct AwsCredentials {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub session_token: Option<String>,
}

impl std::fmt::Debug for AwsCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AwsCredentials")
            .field("access_key_id", &self.access_key_id)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AwsConfig {
    pub region: String,
    /// Fixed keys for local stacks. `None` defers to the SDK credential chain.
    pub credentials: Option<AwsCredentials>,
    /// Endpoint overrides; `None` uses the SDK's regional resolution.
    pub omics_endpoint: Option<String>,
    pub ssm_endpoint: Option<String>,
    pub timeout_ms: u64,
}

impl Default for AwsConfig {
    fn default() -> Self {
        Self {
            region: DEFAULT_AWS_REGION.to_string(),
            credentials: None,
            omics_endpoint: None,
            ssm_endpoint: None,
            timeout_ms: DEFAULT_AWS_TIMEOUT_MS,
        }
    }
}

impl AwsConfig {
    pub(super) fn from_env() -> Self {
        Self {
            region: first_non_empty_env(&[ENV_AWS_REGION, ENV_AWS_DEFAULT_REGION])
                .unwrap_or_else(|| DEFAULT_AWS_REGION.to_string()),
            credentials: None,
            omics_endpoint: read_non_empty_env(ENV_OMICS_ENDPOINT)
                .map(|raw| normalize_base_url(&raw)),
            ssm_endpoint: read_non_empty_env(ENV_SSM_ENDPOINT).map(|raw| normalize_base_url(&raw)),
            timeout_ms: read_env_u64(ENV_AWS_TIMEOUT_MS).unwrap_or(DEFAULT_AWS_TIMEOUT_MS),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeqeraConfig {
    pub base_url: String,
    pub timeout_ms: u64,
}

impl Default for SeqeraConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_SEQERA_BASE_URL.to_string(),
            timeout_ms: DEFAULT_SEQERA_TIMEOUT_MS,
        }
    }
}

impl SeqeraConfig {
    pub(super) fn from_env() -> Self {
        Self {
            base_url: read_non_empty_env(ENV_SEQERA_BASE_URL)
                .map(|raw| normalize_base_url(&raw))
                .unwrap_or_else(|| DEFAULT_SEQERA_BASE_URL.to_string()),
            timeout_ms: read_env_u64(ENV_SEQERA_TIMEOUT_MS).unwrap_or(DEFAULT_SEQERA_TIMEOUT_MS),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SecretConfig {
    pub parameter_prefix: Option<String>,
}

impl SecretConfig {
    pub(super) fn from_env() -> Self {
        Self {
            parameter_prefix: read_non_empty_env(ENV_SECRET_PREFIX)
                .map(|raw| raw.trim_matches('/').to_string())
                .filter(|value| !value.is_empty()),
        }
    }
}
