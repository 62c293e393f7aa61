use std::sync::Arc;
use std::time::Duration;

use reqwest::blocking::Client;
use serde::Deserialize;
use tracing::debug;

use crate::config::{SecretConfig, SeqeraConfig};
use crate::error::{Result, RunSyncError};
use crate::models::{LaboratoryRun, ObservedStatus, Platform};
use crate::secrets::{SecretStore, resolve_access_token};
use crate::status::{UNKNOWN_STATUS, observe};

use super::ProviderStatusAdapter;

#[derive(Debug, Deserialize)]
struct WorkflowEnvelope {
    workflow: Option<WorkflowBody>,
}

#[derive(Debug, Deserialize)]
struct WorkflowBody {
    status: Option<String>,
}

/// Seqera Cloud adapter. Each laboratory has its own bearer token, looked up
/// in the secret store on every call.
#[derive(Clone)]
pub struct SeqeraAdapter {
    http: Client,
    base_url: String,
    secrets: Arc<dyn SecretStore>,
    secret_config: SecretConfig,
}

impl std::fmt::Debug for SeqeraAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SeqeraAdapter")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl SeqeraAdapter {
    pub fn new(
        config: &SeqeraConfig,
        secrets: Arc<dyn SecretStore>,
        secret_config: SecretConfig,
    ) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()?;
        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            secrets,
            secret_config,
        })
    }
}

impl ProviderStatusAdapter for SeqeraAdapter {
    fn platform(&self) -> Platform {
        Platform::SeqeraCloud
    }

    fn fetch_status(&self, run: &LaboratoryRun) -> Result<ObservedStatus> {
        let platform = Platform::SeqeraCloud.as_str();
        let external_run_id = run
            .external_run_id()
            .ok_or_else(|| RunSyncError::MissingExternalReference(run.run_id.clone()))?;
        let token = resolve_access_token(
            self.secrets.as_ref(),
            &self.secret_config,
            &run.organization_id,
            &run.laboratory_id,
        )?;

        let url = format!("{}/workflow/{external_run_id}", self.base_url);
        let mut request = self.http.get(url).bearer_auth(token);
        if let Some(workspace_id) = run
            .workspace_id
            .as_deref()
            .map(str::trim)
            .filter(|value| !value.is_empty())
        {
            request = request.query(&[("workspaceId", workspace_id)]);
        }
        let response = request
            .send()
            .map_err(|err| RunSyncError::provider(platform, None, err.to_string()))?;
        let status = response.status();
        let body = response
            .text()
            .map_err(|err| RunSyncError::provider(platform, Some(status.as_u16()), err.to_string()))?;
        if !status.is_success() {
            return Err(RunSyncError::provider(
                platform,
                Some(status.as_u16()),
                body.chars().take(256).collect::<String>(),
            ));
        }

        let envelope: WorkflowEnvelope = serde_json::from_str(&body).map_err(|err| {
            RunSyncError::provider(
                platform,
                Some(status.as_u16()),
                format!("invalid workflow body: {err}"),
            )
        })?;
        let raw = envelope
            .workflow
            .and_then(|workflow| workflow.status)
            .unwrap_or_else(|| UNKNOWN_STATUS.to_string());
        debug!(run_id = %run.run_id, external_run_id, status = %raw, "seqera workflow");
        Ok(observe(Platform::SeqeraCloud, &raw))
    }
}
