use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Instant;

use chrono::Utc;

use crate::error::{Result, RunSyncError};
use crate::models::RequestLogEntry;

/// Append-only JSONL audit trail of processed messages and operator calls.
/// Writing never fails the operation being logged.
#[derive(Debug, Clone, Default)]
pub struct RequestLog {
    path: Option<PathBuf>,
    lock: Arc<Mutex<()>>,
}

impl RequestLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
            lock: Arc::new(Mutex::new(())),
        }
    }

    pub fn disabled() -> Self {
        Self::default()
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub(crate) fn try_log(&self, entry: &RequestLogEntry) {
        let Some(path) = &self.path else {
            return;
        };
        let Ok(serialized) = serde_json::to_string(entry) else {
            return;
        };
        let Ok(_guard) = self.lock.lock() else {
            return;
        };
        if let Some(parent) = path.parent() {
            let _ = std::fs::create_dir_all(parent);
        }
        if let Ok(mut file) = OpenOptions::new().create(true).append(true).open(path) {
            let mut line = serialized;
            line.push('\n');
            let _ = file.write_all(line.as_bytes());
        }
    }

    pub(crate) fn log_status(
        &self,
        request_id: String,
        operation: &str,
        status: &str,
        started: Instant,
        run_id: Option<String>,
        details: Option<serde_json::Value>,
    ) {
        self.try_log(&RequestLogEntry {
            request_id,
            operation: operation.to_string(),
            status: status.to_string(),
            latency_ms: started.elapsed().as_millis(),
            created_at: Utc::now().to_rfc3339(),
            run_id,
            error_code: None,
            error_message: None,
            details,
        });
    }

    pub(crate) fn log_error(
        &self,
        request_id: String,
        operation: &str,
        started: Instant,
        run_id: Option<String>,
        err: &RunSyncError,
        details: Option<serde_json::Value>,
    ) {
        self.try_log(&RequestLogEntry {
            request_id,
            operation: operation.to_string(),
            status: "error".to_string(),
            latency_ms: started.elapsed().as_millis(),
            created_at: Utc::now().to_rfc3339(),
            run_id,
            error_code: Some(err.code().to_string()),
            error_message: Some(err.to_string()),
            details,
        });
    }

    /// Most recent entries first. Lines that no longer parse are skipped.
    pub fn list_recent(&self, limit: usize) -> Result<Vec<RequestLogEntry>> {
        let Some(path) = &self.path else {
            return Ok(Vec::new());
        };
        if limit == 0 || !path.exists() {
            return Ok(Vec::new());
        }
        let _guard = self
            .lock
            .lock()
            .map_err(|_| RunSyncError::mutex_poisoned("request log"))?;
        let raw = std::fs::read_to_string(path)?;
        Ok(raw
            .lines()
            .rev()
            .filter_map(|line| serde_json::from_str::<RequestLogEntry>(line).ok())
            .take(limit)
            .collect())
    }
}
