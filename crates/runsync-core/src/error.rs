use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

pub type Result<T> = std::result::Result<T, RunSyncError>;

#[derive(Debug, Error)]
pub enum RunSyncError {
    #[error("laboratory run not found: {0}")]
    RunNotFound(String),

    #[error("laboratory run {0} has no external run id")]
    MissingExternalReference(String),

    #[error("unsupported platform `{platform}` for run {run_id}")]
    UnsupportedPlatform { run_id: String, platform: String },

    #[error(
        "access token unavailable for organization {organization_id} laboratory {laboratory_id}"
    )]
    AccessTokenUnavailable {
        organization_id: String,
        laboratory_id: String,
    },

    #[error("secret store unavailable: {0}")]
    SecretUnavailable(String),

    #[error("{platform} status call failed{}: {message}", status_suffix(.status))]
    ProviderCallFailed {
        platform: String,
        status: Option<u16>,
        message: String,
    },

    #[error("run store write failed: {0}")]
    StoreWriteFailed(String),

    #[error("run store read failed: {0}")]
    StoreReadFailed(String),

    #[error("run store conflict on {run_id}: expected version {expected}")]
    StoreConflict { run_id: String, expected: u64 },

    #[error("channel error: {0}")]
    Channel(String),

    #[error("validation failed: {0}")]
    Validation(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),

    #[error(transparent)]
    Http(#[from] reqwest::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

/// How the worker treats a failed reconciliation cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureClass {
    /// The chain ends; retrying cannot help.
    Terminal,
    /// Credentials are missing or unreadable; retried under the tighter secret budget.
    Secret,
    /// Network, provider or store hiccup.
    Transient,
}

impl FailureClass {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Terminal => "terminal",
            Self::Secret => "secret",
            Self::Transient => "transient",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ErrorPayload {
    pub code: String,
    pub message: String,
    pub operation: String,
    pub trace_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub run_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl RunSyncError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::RunNotFound(_) => "RUN_NOT_FOUND",
            Self::MissingExternalReference(_) => "MISSING_EXTERNAL_REFERENCE",
            Self::UnsupportedPlatform { .. } => "UNSUPPORTED_PLATFORM",
            Self::AccessTokenUnavailable { .. } => "ACCESS_TOKEN_UNAVAILABLE",
            Self::SecretUnavailable(_) => "SECRET_UNAVAILABLE",
            Self::ProviderCallFailed { .. } => "PROVIDER_CALL_FAILED",
            Self::StoreWriteFailed(_) => "STORE_WRITE_FAILED",
            Self::StoreReadFailed(_) => "STORE_READ_FAILED",
            Self::StoreConflict { .. } => "STORE_CONFLICT",
            Self::Channel(_) => "CHANNEL_ERROR",
            Self::Validation(_) => "VALIDATION_FAILED",
            Self::Io(_) => "IO_ERROR",
            Self::Json(_) => "JSON_ERROR",
            Self::Sqlite(_) => "SQLITE_ERROR",
            Self::Http(_) => "HTTP_ERROR",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    pub const fn failure_class(&self) -> FailureClass {
        match self {
            Self::RunNotFound(_)
            | Self::MissingExternalReference(_)
            | Self::UnsupportedPlatform { .. }
            | Self::Validation(_)
            | Self::Json(_) => FailureClass::Terminal,
            Self::AccessTokenUnavailable { .. } | Self::SecretUnavailable(_) => {
                FailureClass::Secret
            }
            Self::ProviderCallFailed { .. }
            | Self::StoreWriteFailed(_)
            | Self::StoreReadFailed(_)
            | Self::StoreConflict { .. }
            | Self::Channel(_)
            | Self::Io(_)
            | Self::Sqlite(_)
            | Self::Http(_)
            | Self::Internal(_) => FailureClass::Transient,
        }
    }

    pub fn to_payload(&self, operation: impl Into<String>, run_id: Option<String>) -> ErrorPayload {
        ErrorPayload {
            code: self.code().to_string(),
            message: self.to_string(),
            operation: operation.into(),
            trace_id: Uuid::new_v4().to_string(),
            run_id,
            details: None,
        }
    }

    pub(crate) fn mutex_poisoned(name: &str) -> Self {
        Self::Internal(format!("{name} lock poisoned"))
    }

    pub(crate) fn provider(
        platform: impl Into<String>,
        status: Option<u16>,
        message: impl Into<String>,
    ) -> Self {
        Self::ProviderCallFailed {
            platform: platform.into(),
            status,
            message: message.into(),
        }
    }
}

fn status_suffix(status: &Option<u16>) -> String {
    status
        .map(|code| format!(" with status {code}"))
        .unwrap_or_default()
}
