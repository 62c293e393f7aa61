use std::collections::HashMap;
use std::sync::Mutex;

use crate::aws::SsmClient;
use crate::config::SecretConfig;
use crate::error::{Result, RunSyncError};

/// Read-only lookup of named secrets.
pub trait SecretStore: Send + Sync {
    /// `Ok(None)` when the secret does not exist; `Err` when the store
    /// itself could not be reached.
    fn get_secret(&self, name: &str) -> Result<Option<String>>;
}

/// `/[prefix/]organization/{org}/laboratory/{lab}/access-token`
pub fn access_token_parameter_name(
    config: &SecretConfig,
    organization_id: &str,
    laboratory_id: &str,
) -> String {
    let tail = format!("organization/{organization_id}/laboratory/{laboratory_id}/access-token");
    match config.parameter_prefix.as_deref() {
        Some(prefix) => format!("/{prefix}/{tail}"),
        None => format!("/{tail}"),
    }
}

/// Resolves the per-laboratory provider token.
pub fn resolve_access_token(
    store: &dyn SecretStore,
    config: &SecretConfig,
    organization_id: &str,
    laboratory_id: &str,
) -> Result<String> {
    let name = access_token_parameter_name(config, organization_id, laboratory_id);
    store
        .get_secret(&name)?
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .ok_or_else(|| RunSyncError::AccessTokenUnavailable {
            organization_id: organization_id.to_string(),
            laboratory_id: laboratory_id.to_string(),
        })
}

#[derive(Debug, Clone)]
pub struct SsmSecretStore {
    client: SsmClient,
}

impl SsmSecretStore {
    pub fn new(client: SsmClient) -> Self {
        Self { client }
    }
}

impl SecretStore for SsmSecretStore {
    fn get_secret(&self, name: &str) -> Result<Option<String>> {
        self.client.get_parameter(name)
    }
}

/// In-process secret map for local runs and tests.
#[derive(Debug, Default)]
pub struct StaticSecretStore {
    values: Mutex<HashMap<String, String>>,
}

impl StaticSecretStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, name: impl Into<String>, value: impl Into<String>) -> Result<()> {
        self.values
            .lock()
            .map_err(|_| RunSyncError::mutex_poisoned("secrets"))?
            .insert(name.into(), value.into());
        Ok(())
    }
}

impl SecretStore for StaticSecretStore {
    fn get_secret(&self, name: &str) -> Result<Option<String>> {
        let values = self
            .values
            .lock()
            .map_err(|_| RunSyncError::mutex_poisoned("secrets"))?;
        Ok(values.get(name).cloned())
    }
}
