use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::aws::AwsClients;
use crate::config::AppConfig;
use crate::error::Result;
use crate::providers::{HealthOmicsAdapter, ProviderRegistry, SeqeraAdapter};
use crate::request_log::RequestLog;
use crate::secrets::{SecretStore, SsmSecretStore};
use crate::state::SqliteStateStore;
use crate::worker::ReconciliationWorker;

mod dead_letter_service;
mod queue_service;
mod run_service;

pub const STATE_DB_FILE: &str = "state.sqlite3";
pub const REQUEST_LOG_FILE: &str = "logs/requests.jsonl";

/// Application handle: one state store, one worker, and the request log,
/// all rooted in a single state directory.
#[derive(Clone)]
pub struct RunSync {
    root: PathBuf,
    pub state: Arc<SqliteStateStore>,
    worker: ReconciliationWorker,
    request_log: RequestLog,
}

impl std::fmt::Debug for RunSync {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunSync")
            .field("root", &self.root)
            .finish_non_exhaustive()
    }
}

impl RunSync {
    /// Opens `root` with configuration and provider clients taken from the
    /// environment.
    pub fn new(root_dir: impl Into<PathBuf>) -> Result<Self> {
        Self::with_config(root_dir, &AppConfig::from_env()?)
    }

    pub fn with_config(root_dir: impl Into<PathBuf>, config: &AppConfig) -> Result<Self> {
        let providers = default_provider_registry(config)?;
        Self::with_providers(root_dir, config, providers)
    }

    /// Opens `root` with an explicit provider registry.
    pub fn with_providers(
        root_dir: impl Into<PathBuf>,
        config: &AppConfig,
        providers: ProviderRegistry,
    ) -> Result<Self> {
        let root = root_dir.into();
        fs::create_dir_all(&root)?;
        let state = Arc::new(SqliteStateStore::open(root.join(STATE_DB_FILE))?);
        let request_log = RequestLog::new(root.join(REQUEST_LOG_FILE));
        let worker = ReconciliationWorker::new(
            state.clone(),
            state.clone(),
            providers,
            config.worker.clone(),
        )
        .with_request_log(request_log.clone());

        Ok(Self {
            root,
            state,
            worker,
            request_log,
        })
    }

    pub fn initialize(&self) -> Result<()> {
        if let Some(parent) = self.request_log.path().and_then(Path::parent) {
            fs::create_dir_all(parent)?;
        }
        self.state.migrate()
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub const fn worker(&self) -> &ReconciliationWorker {
        &self.worker
    }
}

/// HealthOmics through the AWS SDK and Seqera Cloud with tokens from SSM.
pub fn default_provider_registry(config: &AppConfig) -> Result<ProviderRegistry> {
    let aws = AwsClients::load(&config.aws)?;
    let omics = HealthOmicsAdapter::new(Arc::new(aws.omics()));
    let secrets: Arc<dyn SecretStore> = Arc::new(SsmSecretStore::new(aws.ssm()));
    let seqera = SeqeraAdapter::new(&config.seqera, secrets, config.secrets.clone())?;
    Ok(ProviderRegistry::new()
        .with(Arc::new(omics))
        .with(Arc::new(seqera)))
}

#[cfg(test)]
mod tests;
