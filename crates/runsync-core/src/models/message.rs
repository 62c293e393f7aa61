use serde::{Deserialize, Serialize};

use crate::error::{Result, RunSyncError};

use super::run::LaboratoryRun;

pub const OPERATION_UPDATE: &str = "UPDATE";
pub const TYPE_LABORATORY_RUN: &str = "LaboratoryRun";

/// Unit of work on the requeue channel.
///
/// The channel is shared with other record types, so `Operation`, `Type` and
/// `Record` stay loosely typed until the worker decides the message is a
/// laboratory-run status check. `Record` is the snapshot at publish time and
/// is never trusted for the current status.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct ReconciliationMessage {
    pub operation: String,
    #[serde(rename = "Type")]
    pub message_type: String,
    pub record: serde_json::Value,
    /// Consecutive failed cycles; reset to zero after a successful check.
    #[serde(default)]
    pub attempt: u32,
    /// Poll-cycle number within the run's chain.
    #[serde(default)]
    pub sequence: u64,
}

impl ReconciliationMessage {
    /// First message of a run's chain.
    pub fn for_run(run: &LaboratoryRun) -> Result<Self> {
        Ok(Self {
            operation: OPERATION_UPDATE.to_string(),
            message_type: TYPE_LABORATORY_RUN.to_string(),
            record: serde_json::to_value(run)?,
            attempt: 0,
            sequence: 0,
        })
    }

    pub fn is_run_status_check(&self) -> bool {
        self.operation == OPERATION_UPDATE && self.message_type == TYPE_LABORATORY_RUN
    }

    pub fn run_snapshot(&self) -> Result<LaboratoryRun> {
        serde_json::from_value(self.record.clone()).map_err(|err| {
            RunSyncError::Validation(format!("malformed LaboratoryRun record: {err}"))
        })
    }

    /// `RunId` from the embedded record, readable even when the rest of the
    /// snapshot no longer matches the current schema.
    pub fn snapshot_run_id(&self) -> Option<&str> {
        self.record
            .get("RunId")
            .and_then(serde_json::Value::as_str)
            .filter(|value| !value.trim().is_empty())
    }

    /// Successor after a successful check: carries the fresh snapshot.
    pub fn next_cycle(&self, run: &LaboratoryRun) -> Result<Self> {
        Ok(Self {
            operation: self.operation.clone(),
            message_type: self.message_type.clone(),
            record: serde_json::to_value(run)?,
            attempt: 0,
            sequence: self.sequence.saturating_add(1),
        })
    }

    /// Successor after a failed check: keeps the snapshot it was given.
    #[must_use]
    pub fn retry(&self) -> Self {
        Self {
            attempt: self.attempt.saturating_add(1),
            sequence: self.sequence.saturating_add(1),
            ..self.clone()
        }
    }

    /// Successor under the unbounded retry mode: same snapshot, attempt
    /// counter untouched.
    #[must_use]
    pub fn requeue_unchanged(&self) -> Self {
        Self {
            sequence: self.sequence.saturating_add(1),
            ..self.clone()
        }
    }

    /// `RunId:Sequence:Attempt`. Redelivering the same message yields the same
    /// successor key, so the channel absorbs the duplicate, while genuine
    /// successive checks always carry a fresh sequence.
    pub fn dedup_key(&self, run_id: &str) -> String {
        format!("{run_id}:{}:{}", self.sequence, self.attempt)
    }
}
