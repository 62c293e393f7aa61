use crate::error::{Result, RunSyncError};

use super::env::{read_env_i64_at_least, read_env_u32, read_non_empty_env};

const ENV_POLL_INTERVAL_SECS: &str = "RUNSYNC_POLL_INTERVAL_SECS";
const ENV_MAX_ATTEMPTS: &str = "RUNSYNC_MAX_ATTEMPTS";
const ENV_SECRET_MAX_ATTEMPTS: &str = "RUNSYNC_SECRET_MAX_ATTEMPTS";
const ENV_BACKOFF_MAX_SECS: &str = "RUNSYNC_BACKOFF_MAX_SECS";
const ENV_RETRY_MODE: &str = "RUNSYNC_RETRY_MODE";
const ENV_VISIBILITY_TIMEOUT_SECS: &str = "RUNSYNC_VISIBILITY_TIMEOUT_SECS";
const ENV_DEDUP_WINDOW_SECS: &str = "RUNSYNC_DEDUP_WINDOW_SECS";
const ENV_TOPIC: &str = "RUNSYNC_TOPIC";

pub const DEFAULT_TOPIC: &str = "laboratory-run-status";
const DEFAULT_POLL_INTERVAL_SECS: i64 = 30;
const DEFAULT_MAX_ATTEMPTS: u32 = 8;
const DEFAULT_SECRET_MAX_ATTEMPTS: u32 = 3;
const DEFAULT_BACKOFF_MAX_SECS: i64 = 300;
const DEFAULT_VISIBILITY_TIMEOUT_SECS: i64 = 120;
const DEFAULT_DEDUP_WINDOW_SECS: i64 = 300;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RetryMode {
    /// Failed cycles back off exponentially and dead-letter past the cap.
    #[default]
    Bounded,
    /// Failed cycles requeue immediately, forever, with the attempt counter
    /// untouched. Matches the behavior of the original Lambda workers.
    Unbounded,
}

impl RetryMode {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Bounded => "bounded",
            Self::Unbounded => "unbounded",
        }
    }

    fn parse(raw: Option<&str>) -> Result<Self> {
        let normalized = raw.map(|value| value.trim().to_ascii_lowercase());
        match normalized.as_deref() {
            None | Some("bounded") => Ok(Self::Bounded),
            Some("unbounded" | "legacy") => Ok(Self::Unbounded),
            Some(other) => Err(RunSyncError::Validation(format!(
                "invalid {ENV_RETRY_MODE}: {other} (expected bounded|unbounded)"
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryConfig {
    pub mode: RetryMode,
    pub max_attempts: u32,
    pub secret_max_attempts: u32,
    pub backoff_max_seconds: i64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            mode: RetryMode::Bounded,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            secret_max_attempts: DEFAULT_SECRET_MAX_ATTEMPTS,
            backoff_max_seconds: DEFAULT_BACKOFF_MAX_SECS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerConfig {
    pub topic: String,
    pub poll_interval_seconds: i64,
    pub visibility_timeout_seconds: i64,
    pub dedup_window_seconds: i64,
    pub retry: RetryConfig,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            topic: DEFAULT_TOPIC.to_string(),
            poll_interval_seconds: DEFAULT_POLL_INTERVAL_SECS,
            visibility_timeout_seconds: DEFAULT_VISIBILITY_TIMEOUT_SECS,
            dedup_window_seconds: DEFAULT_DEDUP_WINDOW_SECS,
            retry: RetryConfig::default(),
        }
    }
}

impl WorkerConfig {
    pub(super) fn from_env() -> Result<Self> {
        let retry = RetryConfig {
            mode: RetryMode::parse(read_non_empty_env(ENV_RETRY_MODE).as_deref())?,
            max_attempts: read_env_u32(ENV_MAX_ATTEMPTS)
                .filter(|value| *value > 0)
                .unwrap_or(DEFAULT_MAX_ATTEMPTS),
            secret_max_attempts: read_env_u32(ENV_SECRET_MAX_ATTEMPTS)
                .filter(|value| *value > 0)
                .unwrap_or(DEFAULT_SECRET_MAX_ATTEMPTS),
            backoff_max_seconds: read_env_i64_at_least(
                ENV_BACKOFF_MAX_SECS,
                DEFAULT_BACKOFF_MAX_SECS,
                1,
            ),
        };
        Ok(Self {
            topic: read_non_empty_env(ENV_TOPIC).unwrap_or_else(|| DEFAULT_TOPIC.to_string()),
            poll_interval_seconds: read_env_i64_at_least(
                ENV_POLL_INTERVAL_SECS,
                DEFAULT_POLL_INTERVAL_SECS,
                0,
            ),
            visibility_timeout_seconds: read_env_i64_at_least(
                ENV_VISIBILITY_TIMEOUT_SECS,
                DEFAULT_VISIBILITY_TIMEOUT_SECS,
                1,
            ),
            dedup_window_seconds: read_env_i64_at_least(
                ENV_DEDUP_WINDOW_SECS,
                DEFAULT_DEDUP_WINDOW_SECS,
                0,
            ),
            retry,
        })
    }
}
