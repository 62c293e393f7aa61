use std::sync::Arc;

use tracing::debug;

use crate::aws::OmicsRunLookup;
use crate::error::{Result, RunSyncError};
use crate::models::{LaboratoryRun, ObservedStatus, Platform};
use crate::status::{UNKNOWN_STATUS, observe};

use super::ProviderStatusAdapter;

#[derive(Clone)]
pub struct HealthOmicsAdapter {
    runs: Arc<dyn OmicsRunLookup>,
}

impl std::fmt::Debug for HealthOmicsAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HealthOmicsAdapter").finish_non_exhaustive()
    }
}

impl HealthOmicsAdapter {
    pub fn new(runs: Arc<dyn OmicsRunLookup>) -> Self {
        Self { runs }
    }
}

impl ProviderStatusAdapter for HealthOmicsAdapter {
    fn platform(&self) -> Platform {
        Platform::AwsHealthOmics
    }

    fn fetch_status(&self, run: &LaboratoryRun) -> Result<ObservedStatus> {
        let external_run_id = run
            .external_run_id()
            .ok_or_else(|| RunSyncError::MissingExternalReference(run.run_id.clone()))?;
        let remote = self.runs.get_run(external_run_id)?;
        let raw = remote.status.as_deref().unwrap_or(UNKNOWN_STATUS);
        debug!(
            run_id = %run.run_id,
            external_run_id,
            status = raw,
            "healthomics get-run"
        );
        Ok(observe(Platform::AwsHealthOmics, raw))
    }
}
