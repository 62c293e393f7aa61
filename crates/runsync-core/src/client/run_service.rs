use std::time::Instant;

use chrono::Utc;

use crate::error::{Result, RunSyncError};
use crate::models::{LaboratoryRun, NewLaboratoryRun, Platform, PublishReceipt};
use crate::status::canonical_status;
use crate::store::RunStore;

use super::RunSync;

fn initial_status(platform: Platform) -> &'static str {
    match platform {
        Platform::AwsHealthOmics => "PENDING",
        Platform::SeqeraCloud => "SUBMITTED",
    }
}

impl RunSync {
    pub fn register_run(&self, new_run: NewLaboratoryRun) -> Result<LaboratoryRun> {
        let request_id = uuid::Uuid::new_v4().to_string();
        let started = Instant::now();

        let output = (|| -> Result<LaboratoryRun> {
            if new_run.laboratory_id.trim().is_empty() || new_run.organization_id.trim().is_empty() {
                return Err(RunSyncError::Validation(
                    "laboratory and organization ids are required".to_string(),
                ));
            }
            let run_id = new_run
                .run_id
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
                .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
            let status = new_run
                .status
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
                .unwrap_or_else(|| initial_status(new_run.platform).to_string());
            let now = Utc::now().to_rfc3339();
            let run = LaboratoryRun {
                run_id,
                laboratory_id: new_run.laboratory_id,
                organization_id: new_run.organization_id,
                platform: new_run.platform.as_str().to_string(),
                external_run_id: new_run.external_run_id,
                workspace_id: new_run.workspace_id,
                canonical_status: canonical_status(new_run.platform, &status),
                status,
                workflow_name: new_run.workflow_name,
                owner: new_run.owner,
                settings: new_run.settings,
                created_at: now.clone(),
                created_by: new_run.created_by.clone(),
                modified_at: now,
                modified_by: new_run.created_by,
                version: 1,
            };
            self.state.put_run(&run)?;
            Ok(run)
        })();

        match output {
            Ok(run) => {
                self.request_log.log_status(
                    request_id,
                    "run.register",
                    "ok",
                    started,
                    Some(run.run_id.clone()),
                    Some(serde_json::json!({
                        "platform": run.platform,
                        "laboratory_id": run.laboratory_id,
                    })),
                );
                Ok(run)
            }
            Err(err) => {
                self.request_log
                    .log_error(request_id, "run.register", started, None, &err, None);
                Err(err)
            }
        }
    }

    pub fn get_run(&self, run_id: &str) -> Result<LaboratoryRun> {
        self.state
            .get_run(run_id)?
            .ok_or_else(|| RunSyncError::RunNotFound(run_id.to_string()))
    }

    pub fn list_runs(&self, laboratory_id: &str, limit: usize) -> Result<Vec<LaboratoryRun>> {
        self.state.list_runs(laboratory_id, limit)
    }

    /// Publishes the first status-check message for a stored run.
    pub fn start_reconciliation(&self, run_id: &str) -> Result<PublishReceipt> {
        let request_id = uuid::Uuid::new_v4().to_string();
        let started = Instant::now();

        let output = self
            .get_run(run_id)
            .and_then(|run| self.worker.enqueue_run(&run));
        match output {
            Ok(receipt) => {
                self.request_log.log_status(
                    request_id,
                    "run.track",
                    "ok",
                    started,
                    Some(run_id.to_string()),
                    Some(serde_json::to_value(receipt).unwrap_or_default()),
                );
                Ok(receipt)
            }
            Err(err) => {
                self.request_log.log_error(
                    request_id,
                    "run.track",
                    started,
                    Some(run_id.to_string()),
                    &err,
                    None,
                );
                Err(err)
            }
        }
    }
}
