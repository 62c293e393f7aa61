use crate::error::Result;
use crate::models::LaboratoryRun;

/// Durable home of laboratory runs.
pub trait RunStore: Send + Sync {
    fn get_run(&self, run_id: &str) -> Result<Option<LaboratoryRun>>;

    /// Writes `run` only when the stored version still equals `run.version`.
    /// Returns the record as stored, version advanced by one.
    ///
    /// Fails with `StoreConflict` when another writer got there first and
    /// with `RunNotFound` when the run has been removed.
    fn update_run(&self, run: &LaboratoryRun) -> Result<LaboratoryRun>;
}
