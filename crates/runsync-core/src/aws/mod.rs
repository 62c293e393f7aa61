//! AWS SDK clients for the two services the worker talks to.
//!
//! The worker is synchronous, so the SDK futures run on a small runtime
//! owned by [`AwsClients`] and shared by every client built from it.

use std::sync::Arc;
use std::time::Duration;

use aws_config::retry::RetryConfig;
use aws_config::timeout::TimeoutConfig;
use aws_config::{BehaviorVersion, Region, SdkConfig};
use tokio::runtime::Runtime;

use crate::config::AwsConfig;
use crate::error::Result;

mod omics;
mod ssm;

pub use omics::{OmicsClient, OmicsRun, OmicsRunLookup};
pub use ssm::SsmClient;

const RUNTIME_THREADS: usize = 2;
const STATIC_PROVIDER_NAME: &str = "runsync-static";

/// Loaded SDK configuration plus the runtime that drives it.
#[derive(Clone)]
pub struct AwsClients {
    runtime: Arc<Runtime>,
    sdk_config: SdkConfig,
    omics_endpoint: Option<String>,
    ssm_endpoint: Option<String>,
}

impl std::fmt::Debug for AwsClients {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AwsClients")
            .field("region", &self.sdk_config.region())
            .field("omics_endpoint", &self.omics_endpoint)
            .field("ssm_endpoint", &self.ssm_endpoint)
            .finish_non_exhaustive()
    }
}

impl AwsClients {
    /// Resolves region, timeouts and credentials. Explicit credentials in
    /// `config` win; otherwise the SDK default chain (environment, profile,
    /// SSO, container and instance roles) is used.
    ///
    /// SDK-level retries are disabled: a failed call surfaces to the
    /// worker, which owns backoff and attempt accounting.
    pub fn load(config: &AwsConfig) -> Result<Self> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(RUNTIME_THREADS)
            .thread_name("runsync-aws")
            .enable_all()
            .build()?;

        let mut loader = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(config.region.clone()))
            .retry_config(RetryConfig::disabled())
            .timeout_config(
                TimeoutConfig::builder()
                    .operation_timeout(Duration::from_millis(config.timeout_ms))
                    .build(),
            );
        if let Some(credentials) = &config.credentials {
            loader = loader.credentials_provider(aws_sdk_ssm::config::Credentials::new(
                credentials.access_key_id.clone(),
                credentials.secret_access_key.clone(),
                credentials.session_token.clone(),
                None,
                STATIC_PROVIDER_NAME,
            ));
        }
        let sdk_config = runtime.block_on(loader.load());

        Ok(Self {
            runtime: Arc::new(runtime),
            sdk_config,
            omics_endpoint: config.omics_endpoint.clone(),
            ssm_endpoint: config.ssm_endpoint.clone(),
        })
    }

    pub fn omics(&self) -> OmicsClient {
        let mut builder = aws_sdk_omics::config::Builder::from(&self.sdk_config);
        if let Some(endpoint) = &self.omics_endpoint {
            builder = builder.endpoint_url(endpoint);
        }
        OmicsClient::new(
            self.runtime.clone(),
            aws_sdk_omics::Client::from_conf(builder.build()),
        )
    }

    pub fn ssm(&self) -> SsmClient {
        let mut builder = aws_sdk_ssm::config::Builder::from(&self.sdk_config);
        if let Some(endpoint) = &self.ssm_endpoint {
            builder = builder.endpoint_url(endpoint);
        }
        SsmClient::new(
            self.runtime.clone(),
            aws_sdk_ssm::Client::from_conf(builder.build()),
        )
    }
}

/// `code: message` the way AWS error metadata reads in logs.
pub(crate) fn describe_failure(code: Option<&str>, message: Option<&str>, fallback: &str) -> String {
    match (code, message) {
        (Some(code), Some(message)) => format!("{code}: {message}"),
        (Some(code), None) => code.to_string(),
        (None, Some(message)) => message.to_string(),
        (None, None) => fallback.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failure_description_prefers_code_and_message() {
        assert_eq!(
            describe_failure(Some("ThrottlingException"), Some("slow down"), "dispatch failure"),
            "ThrottlingException: slow down"
        );
        assert_eq!(
            describe_failure(Some("AccessDeniedException"), None, "x"),
            "AccessDeniedException"
        );
        assert_eq!(describe_failure(None, None, "dispatch failure"), "dispatch failure");
    }
}
