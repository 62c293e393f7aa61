use rusqlite::{OptionalExtension, Row, params};

use crate::error::{Result, RunSyncError};
use crate::models::{CanonicalStatus, LaboratoryRun};
use crate::store::RunStore;

use super::{SqliteStateStore, i64_to_u64_saturating, usize_to_i64_saturating};

const RUN_COLUMNS: &str = r"
    run_id, laboratory_id, organization_id, platform, external_run_id, workspace_id,
    status, canonical_status, workflow_name, owner, settings_json,
    created_at, created_by, modified_at, modified_by, version
";

impl SqliteStateStore {
    #[cfg(test)]
    pub(crate) fn corrupt_run_settings_for_test(&self, run_id: &str) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "UPDATE laboratory_runs SET settings_json = '{not json' WHERE run_id = ?1",
                params![run_id],
            )?;
            Ok(())
        })
    }

    /// Inserts a new run. Fails when a run with the same id already exists.
    pub fn put_run(&self, run: &LaboratoryRun) -> Result<()> {
        let settings_json = serde_json::to_string(&run.settings)?;
        self.with_conn(|conn| {
            let inserted = conn.execute(
                r"
                INSERT OR IGNORE INTO laboratory_runs(
                    run_id, laboratory_id, organization_id, platform, external_run_id, workspace_id,
                    status, canonical_status, workflow_name, owner, settings_json,
                    created_at, created_by, modified_at, modified_by, version
                )
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)
                ",
                params![
                    run.run_id,
                    run.laboratory_id,
                    run.organization_id,
                    run.platform,
                    run.external_run_id,
                    run.workspace_id,
                    run.status,
                    run.canonical_status.as_str(),
                    run.workflow_name,
                    run.owner,
                    settings_json,
                    run.created_at,
                    run.created_by,
                    run.modified_at,
                    run.modified_by,
                    u64_to_i64_saturating(run.version),
                ],
            )?;
            if inserted == 0 {
                return Err(RunSyncError::Validation(format!(
                    "laboratory run already exists: {}",
                    run.run_id
                )));
            }
            Ok(())
        })
    }

    pub fn list_runs(&self, laboratory_id: &str, limit: usize) -> Result<Vec<LaboratoryRun>> {
        if limit == 0 {
            return Ok(Vec::new());
        }
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                r"
                SELECT {RUN_COLUMNS}
                FROM laboratory_runs
                WHERE laboratory_id = ?1
                ORDER BY created_at DESC, run_id ASC
                LIMIT ?2
                "
            ))?;
            let rows = stmt.query_map(
                params![laboratory_id, usize_to_i64_saturating(limit)],
                run_from_row,
            )?;
            let mut out = Vec::new();
            for row in rows {
                out.push(row??);
            }
            Ok(out)
        })
    }

    fn read_run(&self, run_id: &str) -> Result<Option<LaboratoryRun>> {
        self.with_conn(|conn| {
            let row = conn
                .query_row(
                    &format!("SELECT {RUN_COLUMNS} FROM laboratory_runs WHERE run_id = ?1"),
                    params![run_id],
                    run_from_row,
                )
                .optional()?;
            row.transpose()
        })
    }

    fn write_run_if_version(&self, run: &LaboratoryRun) -> Result<LaboratoryRun> {
        let settings_json = serde_json::to_string(&run.settings)?;
        let next_version = run.version.saturating_add(1);
        self.with_tx(|tx| {
            let affected = tx.execute(
                r"
                UPDATE laboratory_runs
                SET laboratory_id = ?2,
                    organization_id = ?3,
                    platform = ?4,
                    external_run_id = ?5,
                    workspace_id = ?6,
                    status = ?7,
                    canonical_status = ?8,
                    workflow_name = ?9,
                    owner = ?10,
                    settings_json = ?11,
                    modified_at = ?12,
                    modified_by = ?13,
                    version = ?14
                WHERE run_id = ?1 AND version = ?15
                ",
                params![
                    run.run_id,
                    run.laboratory_id,
                    run.organization_id,
                    run.platform,
                    run.external_run_id,
                    run.workspace_id,
                    run.status,
                    run.canonical_status.as_str(),
                    run.workflow_name,
                    run.owner,
                    settings_json,
                    run.modified_at,
                    run.modified_by,
                    u64_to_i64_saturating(next_version),
                    u64_to_i64_saturating(run.version),
                ],
            )?;
            if affected == 1 {
                return Ok(());
            }
            let exists = tx
                .query_row(
                    "SELECT 1 FROM laboratory_runs WHERE run_id = ?1",
                    params![run.run_id],
                    |_| Ok(()),
                )
                .optional()?
                .is_some();
            if exists {
                Err(RunSyncError::StoreConflict {
                    run_id: run.run_id.clone(),
                    expected: run.version,
                })
            } else {
                Err(RunSyncError::RunNotFound(run.run_id.clone()))
            }
        })?;

        let mut stored = run.clone();
        stored.version = next_version;
        Ok(stored)
    }
}

impl RunStore for SqliteStateStore {
    fn get_run(&self, run_id: &str) -> Result<Option<LaboratoryRun>> {
        self.read_run(run_id)
    }

    fn update_run(&self, run: &LaboratoryRun) -> Result<LaboratoryRun> {
        self.write_run_if_version(run).map_err(|err| match err {
            RunSyncError::Sqlite(inner) => RunSyncError::StoreWriteFailed(inner.to_string()),
            other => other,
        })
    }
}

fn run_from_row(row: &Row<'_>) -> rusqlite::Result<Result<LaboratoryRun>> {
    let settings_json: String = row.get(10)?;
    let canonical_raw: String = row.get(7)?;
    let version: i64 = row.get(15)?;
    let run_id: String = row.get(0)?;
    let settings = match serde_json::from_str(&settings_json) {
        Ok(value) => value,
        Err(err) => {
            return Ok(Err(RunSyncError::StoreReadFailed(format!(
                "run {run_id} has unreadable settings: {err}"
            ))));
        }
    };
    Ok(Ok(LaboratoryRun {
        run_id,
        laboratory_id: row.get(1)?,
        organization_id: row.get(2)?,
        platform: row.get(3)?,
        external_run_id: row.get(4)?,
        workspace_id: row.get(5)?,
        status: row.get(6)?,
        canonical_status: canonical_raw.parse().unwrap_or(CanonicalStatus::Unknown),
        workflow_name: row.get(8)?,
        owner: row.get(9)?,
        settings,
        created_at: row.get(11)?,
        created_by: row.get(12)?,
        modified_at: row.get(13)?,
        modified_by: row.get(14)?,
        version: i64_to_u64_saturating(version),
    }))
}

fn u64_to_i64_saturating(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}
