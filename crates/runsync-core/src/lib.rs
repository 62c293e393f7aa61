// Public fallible APIs in this crate share one concrete error contract (`RunSyncError`).
#![allow(
    clippy::missing_errors_doc,
    reason = "crate-wide fallible API uses one explicit error type; per-item boilerplate would duplicate contract"
)]

pub mod aws;
pub mod channel;
pub mod client;
pub mod config;
pub mod error;
pub mod models;
pub mod providers;
pub mod request_log;
pub(crate) mod retry_policy;
pub mod secrets;
pub mod state;
pub mod status;
pub mod store;
#[cfg(test)]
pub(crate) mod test_support;
pub mod worker;

pub use channel::RequeueChannel;
pub use client::RunSync;
pub use config::AppConfig;
pub use error::{Result, RunSyncError};
pub use providers::{ProviderRegistry, ProviderStatusAdapter};
pub use state::SqliteStateStore;
pub use store::RunStore;
pub use worker::ReconciliationWorker;
