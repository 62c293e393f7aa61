use rusqlite::Connection;

use crate::error::{Result, RunSyncError};

use super::SqliteStateStore;

const MIGRATION_SCHEMA_SQL: &str = r"
    PRAGMA journal_mode = WAL;
    PRAGMA foreign_keys = ON;
    CREATE TABLE IF NOT EXISTS laboratory_runs (
        run_id TEXT PRIMARY KEY,
        laboratory_id TEXT NOT NULL,
        organization_id TEXT NOT NULL,
        platform TEXT NOT NULL,
        external_run_id TEXT,
        workspace_id TEXT,
        status TEXT NOT NULL,
        canonical_status TEXT NOT NULL,
        workflow_name TEXT NOT NULL,
        owner TEXT NOT NULL,
        settings_json TEXT NOT NULL,
        created_at TEXT NOT NULL,
        created_by TEXT NOT NULL,
        modified_at TEXT NOT NULL,
        modified_by TEXT NOT NULL,
        version INTEGER NOT NULL DEFAULT 1
    );

    CREATE TABLE IF NOT EXISTS channel_messages (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        topic TEXT NOT NULL,
        ordering_group TEXT NOT NULL,
        dedup_key TEXT NOT NULL,
        body_json TEXT NOT NULL,
        status TEXT NOT NULL,
        receive_count INTEGER NOT NULL DEFAULT 0,
        created_at TEXT NOT NULL,
        visible_at TEXT NOT NULL,
        lease_expires_at TEXT,
        updated_at TEXT NOT NULL,
        last_error TEXT
    );

    CREATE INDEX IF NOT EXISTS idx_laboratory_runs_laboratory
    ON laboratory_runs(laboratory_id, created_at DESC);
    CREATE INDEX IF NOT EXISTS idx_channel_messages_group
    ON channel_messages(topic, ordering_group, status, id);
    CREATE INDEX IF NOT EXISTS idx_channel_messages_dedup
    ON channel_messages(topic, dedup_key, created_at);
    CREATE INDEX IF NOT EXISTS idx_channel_messages_status_visible
    ON channel_messages(status, visible_at);
    CREATE UNIQUE INDEX IF NOT EXISTS idx_channel_messages_dead_letter_key
    ON channel_messages(topic, dedup_key)
    WHERE status IN ('dead_letter', 'redriven');
";

impl SqliteStateStore {
    pub fn migrate(&self) -> Result<()> {
        let conn = self
            .conn
            .lock()
            .map_err(|_| RunSyncError::mutex_poisoned("sqlite"))?;
        conn.execute_batch(MIGRATION_SCHEMA_SQL)?;
        ensure_required_column(
            &conn,
            "laboratory_runs",
            "version",
            "unsupported laboratory_runs schema: version is missing; reset state database",
        )?;
        ensure_required_column(
            &conn,
            "laboratory_runs",
            "canonical_status",
            "unsupported laboratory_runs schema: canonical_status is missing; reset state database",
        )?;
        ensure_required_column(
            &conn,
            "channel_messages",
            "lease_expires_at",
            "unsupported channel_messages schema: lease_expires_at is missing; reset state database",
        )?;
        drop(conn);
        Ok(())
    }
}

fn has_column(conn: &Connection, table: &str, column: &str) -> Result<bool> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({table})"))?;
    let rows = stmt.query_map([], |row| row.get::<_, String>(1))?;
    for row in rows {
        if row? == column {
            return Ok(true);
        }
    }
    Ok(false)
}

fn ensure_required_column(
    conn: &Connection,
    table: &str,
    column: &str,
    error_message: &'static str,
) -> Result<()> {
    if has_column(conn, table, column)? {
        Ok(())
    } else {
        Err(RunSyncError::Validation(error_message.to_string()))
    }
}
