use std::sync::Arc;

use aws_sdk_omics::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use aws_sdk_omics::operation::get_run::{GetRunError, GetRunOutput};
use tokio::runtime::Runtime;

use crate::error::{Result, RunSyncError};
use crate::models::Platform;

use super::describe_failure;

/// Subset of the HealthOmics `GetRun` response the worker reads.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OmicsRun {
    pub id: Option<String>,
    pub name: Option<String>,
    pub status: Option<String>,
    pub status_message: Option<String>,
}

impl From<&GetRunOutput> for OmicsRun {
    fn from(output: &GetRunOutput) -> Self {
        Self {
            id: output.id().map(ToString::to_string),
            name: output.name().map(ToString::to_string),
            status: output.status().map(|status| status.as_str().to_string()),
            status_message: output.status_message().map(ToString::to_string),
        }
    }
}

/// Looks up one HealthOmics run by id.
pub trait OmicsRunLookup: Send + Sync {
    fn get_run(&self, run_id: &str) -> Result<OmicsRun>;
}

#[derive(Clone)]
pub struct OmicsClient {
    runtime: Arc<Runtime>,
    client: aws_sdk_omics::Client,
}

impl std::fmt::Debug for OmicsClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OmicsClient").finish_non_exhaustive()
    }
}

impl OmicsClient {
    pub(super) const fn new(runtime: Arc<Runtime>, client: aws_sdk_omics::Client) -> Self {
        Self { runtime, client }
    }
}

impl OmicsRunLookup for OmicsClient {
    fn get_run(&self, run_id: &str) -> Result<OmicsRun> {
        let output = self
            .runtime
            .block_on(self.client.get_run().id(run_id.trim()).send())
            .map_err(|err| get_run_failure(&err))?;
        Ok(OmicsRun::from(&output))
    }
}

fn get_run_failure(err: &SdkError<GetRunError>) -> RunSyncError {
    let status = err.raw_response().map(|response| response.status().as_u16());
    let fallback = DisplayErrorContext(err).to_string();
    RunSyncError::provider(
        Platform::AwsHealthOmics.as_str(),
        status,
        describe_failure(err.code(), err.message(), &fallback),
    )
}
