use std::sync::Arc;

use aws_sdk_ssm::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use aws_sdk_ssm::operation::get_parameter::GetParameterError;
use tokio::runtime::Runtime;

use crate::error::{Result, RunSyncError};

use super::describe_failure;

#[derive(Clone)]
pub struct SsmClient {
    runtime: Arc<Runtime>,
    client: aws_sdk_ssm::Client,
}

impl std::fmt::Debug for SsmClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SsmClient").finish_non_exhaustive()
    }
}

impl SsmClient {
    pub(super) const fn new(runtime: Arc<Runtime>, client: aws_sdk_ssm::Client) -> Self {
        Self { runtime, client }
    }

    /// Decrypted parameter value, or `None` when the parameter does not exist.
    pub fn get_parameter(&self, name: &str) -> Result<Option<String>> {
        let request = self
            .client
            .get_parameter()
            .name(name)
            .with_decryption(true)
            .send();
        match self.runtime.block_on(request) {
            Ok(output) => Ok(output
                .parameter()
                .and_then(|parameter| parameter.value())
                .map(ToString::to_string)
                .filter(|value| !value.trim().is_empty())),
            Err(err)
                if err
                    .as_service_error()
                    .is_some_and(GetParameterError::is_parameter_not_found) =>
            {
                Ok(None)
            }
            Err(err) => Err(get_parameter_failure(&err)),
        }
    }
}

fn get_parameter_failure(err: &SdkError<GetParameterError>) -> RunSyncError {
    let fallback = DisplayErrorContext(err).to_string();
    let detail = describe_failure(err.code(), err.message(), &fallback);
    match err.raw_response() {
        Some(response) => RunSyncError::SecretUnavailable(format!(
            "GetParameter returned {}: {detail}",
            response.status().as_u16()
        )),
        None => RunSyncError::SecretUnavailable(format!("GetParameter failed: {detail}")),
    }
}

#[cfg(test)]
mod tests {
    use crate::aws::AwsClients;
    use crate::config::{AwsConfig, AwsCredentials};
    use crate::error::RunSyncError;
    use crate::test_support::spawn_stub_server;

    fn clients(base_url: &str) -> AwsClients {
        AwsClients::load(&AwsConfig {
            region: "us-west-2".to_string(),
            credentials: Some(AwsCredentials {
                access_key_id: "AKIDTEST".to_string(),
                secret_access_key: "secret".to_string(),
                session_token: None,
            }),
            omics_endpoint: None,
            ssm_endpoint: Some(base_url.to_string()),
            timeout_ms: 2_000,
        })
        .expect("aws clients")
    }

    #[test]
    fn get_parameter_sends_signed_decrypting_request() {
        let (base_url, server) = spawn_stub_server(vec![(
            200,
            r#"{"Parameter":{"Name":"/org/token","Type":"SecureString","Value":"tok-1"}}"#
                .to_string(),
        )]);

        let value = clients(&base_url)
            .ssm()
            .get_parameter("/org/token")
            .expect("parameter");
        assert_eq!(value.as_deref(), Some("tok-1"));

        let requests = server.join().expect("server");
        assert!(requests[0].request_line.starts_with("POST / "));
        assert_eq!(
            requests[0].header("x-amz-target"),
            Some("AmazonSSM.GetParameter")
        );
        let authorization = requests[0].header("authorization").expect("signed");
        assert!(authorization.starts_with("AWS4-HMAC-SHA256 Credential=AKIDTEST/"));
        assert!(authorization.contains("/us-west-2/ssm/aws4_request"));
        let body: serde_json::Value = serde_json::from_str(&requests[0].body).expect("json body");
        assert_eq!(body["Name"], "/org/token");
        assert_eq!(body["WithDecryption"], true);
    }

    #[test]
    fn missing_parameter_is_none() {
        let (base_url, server) = spawn_stub_server(vec![(
            400,
            r#"{"__type":"ParameterNotFound","message":"no such parameter"}"#.to_string(),
        )]);

        let value = clients(&base_url)
            .ssm()
            .get_parameter("/org/token")
            .expect("lookup");
        assert_eq!(value, None);
        server.join().expect("server");
    }

    #[test]
    fn service_failure_is_secret_unavailable() {
        let (base_url, server) = spawn_stub_server(vec![(
            500,
            r#"{"__type":"InternalServerError","message":"boom"}"#.to_string(),
        )]);

        let err = clients(&base_url)
            .ssm()
            .get_parameter("/org/token")
            .expect_err("failure");
        match err {
            RunSyncError::SecretUnavailable(message) => {
                assert!(message.contains("500"), "{message}");
                assert!(message.contains("InternalServerError"), "{message}");
            }
            other => panic!("unexpected error: {other:?}"),
        }
        server.join().expect("server");
    }
}
