//! Reconciliation worker: one status-check cycle per message, then either the
//! chain ends or exactly one successor is published.

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use tracing::{debug, error, info, warn};

use crate::channel::RequeueChannel;
use crate::config::{RetryMode, WorkerConfig};
use crate::error::{Result, RunSyncError};
use crate::models::{
    Delivery, DrainReport, LaboratoryRun, ObservedStatus, PublishReceipt, PublishRequest,
    ReconcileOutcome, ReconciliationMessage, STATUS_CHECK_ACTOR,
};
use crate::providers::ProviderRegistry;
use crate::request_log::RequestLog;
use crate::retry_policy::{RetryDecision, decide_retry, retry_backoff_seconds};
use crate::store::RunStore;

const OPERATION_RECONCILE: &str = "reconcile.message";

/// Result of a successful status check, before the successor decision.
struct CheckedRun {
    run: LaboratoryRun,
    observed: ObservedStatus,
    updated: bool,
}

#[derive(Clone)]
pub struct ReconciliationWorker {
    runs: Arc<dyn RunStore>,
    channel: Arc<dyn RequeueChannel>,
    providers: ProviderRegistry,
    config: WorkerConfig,
    request_log: RequestLog,
}

impl std::fmt::Debug for ReconciliationWorker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReconciliationWorker")
            .field("topic", &self.config.topic)
            .field("providers", &self.providers)
            .finish_non_exhaustive()
    }
}

impl ReconciliationWorker {
    pub fn new(
        runs: Arc<dyn RunStore>,
        channel: Arc<dyn RequeueChannel>,
        providers: ProviderRegistry,
        config: WorkerConfig,
    ) -> Self {
        Self {
            runs,
            channel,
            providers,
            config,
            request_log: RequestLog::disabled(),
        }
    }

    #[must_use]
    pub fn with_request_log(mut self, request_log: RequestLog) -> Self {
        self.request_log = request_log;
        self
    }

    pub const fn config(&self) -> &WorkerConfig {
        &self.config
    }

    /// Publishes the first message of `run`'s chain.
    pub fn enqueue_run(&self, run: &LaboratoryRun) -> Result<PublishReceipt> {
        let message = ReconciliationMessage::for_run(run)?;
        self.publish(&run.run_id, &message, 0)
    }

    pub(crate) fn publish(
        &self,
        run_id: &str,
        message: &ReconciliationMessage,
        delay_seconds: i64,
    ) -> Result<PublishReceipt> {
        self.channel.publish(&PublishRequest {
            topic: self.config.topic.clone(),
            ordering_group: run_id.to_string(),
            dedup_key: message.dedup_key(run_id),
            message: message.clone(),
            delay_seconds,
            dedup_window_seconds: self.config.dedup_window_seconds,
        })
    }

    /// Runs one reconciliation cycle.
    ///
    /// Every failure inside the cycle is turned into an outcome. The only
    /// error returned is a failure to publish the successor or the
    /// dead-letter record; the caller must then hand the same message back
    /// to the channel.
    pub fn process(&self, message: &ReconciliationMessage) -> Result<ReconcileOutcome> {
        let request_id = uuid::Uuid::new_v4().to_string();
        let started = Instant::now();
        let run_id = message.snapshot_run_id().map(ToString::to_string);

        let result = self.process_inner(message);
        let mut details = serde_json::json!({
            "sequence": message.sequence,
            "attempt": message.attempt,
        });
        match &result {
            Ok((outcome, cause)) => {
                details["outcome"] = serde_json::to_value(outcome).unwrap_or_default();
                match cause {
                    None => self.request_log.log_status(
                        request_id,
                        OPERATION_RECONCILE,
                        outcome.label(),
                        started,
                        run_id,
                        Some(details),
                    ),
                    Some(cause) => self.request_log.log_error(
                        request_id,
                        OPERATION_RECONCILE,
                        started,
                        run_id,
                        cause,
                        Some(details),
                    ),
                }
            }
            Err(err) => self.request_log.log_error(
                request_id,
                OPERATION_RECONCILE,
                started,
                run_id,
                err,
                Some(details),
            ),
        }
        result.map(|(outcome, _)| outcome)
    }

    /// Outcome plus the failure that led to it, if any.
    fn process_inner(
        &self,
        message: &ReconciliationMessage,
    ) -> Result<(ReconcileOutcome, Option<RunSyncError>)> {
        if !message.is_run_status_check() {
            debug!(
                operation = %message.operation,
                message_type = %message.message_type,
                "ignoring message"
            );
            return Ok((
                ReconcileOutcome::Ignored {
                    operation: message.operation.clone(),
                    message_type: message.message_type.clone(),
                },
                None,
            ));
        }

        let Some(run_id) = message.snapshot_run_id() else {
            let err = RunSyncError::Validation("message record carries no RunId".to_string());
            warn!(code = err.code(), "dropping message without run id");
            return Ok((
                ReconcileOutcome::Dropped {
                    run_id: None,
                    code: err.code().to_string(),
                },
                Some(err),
            ));
        };

        match self.check_run(run_id) {
            Ok(checked) => self.continue_chain(run_id, message, checked).map(|o| (o, None)),
            Err(err) => self
                .handle_failure(run_id, message, &err)
                .map(|outcome| (outcome, Some(err))),
        }
    }

    fn check_run(&self, run_id: &str) -> Result<CheckedRun> {
        let current = self
            .runs
            .get_run(run_id)?
            .ok_or_else(|| RunSyncError::RunNotFound(run_id.to_string()))?;
        if current.external_run_id().is_none() {
            return Err(RunSyncError::MissingExternalReference(run_id.to_string()));
        }
        let adapter = current
            .platform()
            .and_then(|platform| self.providers.get(platform))
            .ok_or_else(|| RunSyncError::UnsupportedPlatform {
                run_id: run_id.to_string(),
                platform: current.platform.clone(),
            })?;

        let observed = adapter.fetch_status(&current)?;
        if !current.status_differs(&observed.raw) {
            return Ok(CheckedRun {
                run: current,
                observed,
                updated: false,
            });
        }

        let mut next = current.clone();
        next.status.clone_from(&observed.raw);
        next.canonical_status = observed.canonical;
        next.modified_at = Utc::now().to_rfc3339();
        next.modified_by = STATUS_CHECK_ACTOR.to_string();
        let stored = self.runs.update_run(&next)?;
        info!(
            run_id,
            platform = %stored.platform,
            from = %current.status,
            to = %stored.status,
            "run status updated"
        );
        Ok(CheckedRun {
            run: stored,
            observed,
            updated: true,
        })
    }

    fn continue_chain(
        &self,
        run_id: &str,
        message: &ReconciliationMessage,
        checked: CheckedRun,
    ) -> Result<ReconcileOutcome> {
        if checked.observed.terminal {
            info!(run_id, status = %checked.observed.raw, "run reached terminal status");
            return Ok(ReconcileOutcome::Finished {
                run_id: run_id.to_string(),
                status: checked.observed.raw,
                updated: checked.updated,
            });
        }

        let successor = message.next_cycle(&checked.run)?;
        let delay_seconds = self.config.poll_interval_seconds;
        let receipt = self.publish(run_id, &successor, delay_seconds)?;
        debug!(
            run_id,
            sequence = successor.sequence,
            deduplicated = !receipt.is_published(),
            "successor published"
        );
        Ok(ReconcileOutcome::Rescheduled {
            run_id: run_id.to_string(),
            status: checked.observed.raw,
            updated: checked.updated,
            delay_seconds,
            deduplicated: !receipt.is_published(),
        })
    }

    fn handle_failure(
        &self,
        run_id: &str,
        message: &ReconciliationMessage,
        err: &RunSyncError,
    ) -> Result<ReconcileOutcome> {
        let class = err.failure_class();
        let attempt = message.attempt.saturating_add(1);
        match decide_retry(&self.config.retry, class, attempt, run_id) {
            RetryDecision::Drop => {
                warn!(run_id, code = err.code(), error = %err, "ending run chain");
                Ok(ReconcileOutcome::Dropped {
                    run_id: Some(run_id.to_string()),
                    code: err.code().to_string(),
                })
            }
            RetryDecision::Retry { delay_seconds } => {
                let successor = match self.config.retry.mode {
                    RetryMode::Bounded => message.retry(),
                    RetryMode::Unbounded => message.requeue_unchanged(),
                };
                self.publish(run_id, &successor, delay_seconds)?;
                warn!(
                    run_id,
                    code = err.code(),
                    class = class.as_str(),
                    attempt = successor.attempt,
                    delay_seconds,
                    error = %err,
                    "status check failed; retrying"
                );
                Ok(ReconcileOutcome::Retrying {
                    run_id: run_id.to_string(),
                    code: err.code().to_string(),
                    attempt: successor.attempt,
                    delay_seconds,
                })
            }
            RetryDecision::DeadLetter => {
                let parked = message.retry();
                self.channel
                    .dead_letter(&self.config.topic, run_id, &parked, err.code())?;
                error!(
                    run_id,
                    code = err.code(),
                    attempt = parked.attempt,
                    error = %err,
                    "retry budget exhausted; message dead-lettered"
                );
                Ok(ReconcileOutcome::DeadLettered {
                    run_id: run_id.to_string(),
                    code: err.code().to_string(),
                    attempt: parked.attempt,
                })
            }
        }
    }

    /// Processes one leased delivery and settles it with the channel.
    /// `None` means the delivery was released for redelivery.
    pub fn handle_delivery(&self, delivery: &Delivery) -> Result<Option<ReconcileOutcome>> {
        let Some(message) = delivery.message() else {
            warn!(message_id = delivery.message_id, "acknowledging undecodable message");
            self.channel.acknowledge(delivery.message_id)?;
            return Ok(Some(ReconcileOutcome::Dropped {
                run_id: None,
                code: "JSON_ERROR".to_string(),
            }));
        };

        match self.process(&message) {
            Ok(outcome) => {
                self.channel.acknowledge(delivery.message_id)?;
                Ok(Some(outcome))
            }
            Err(err) => {
                let delay_seconds = retry_backoff_seconds(
                    self.config.retry.backoff_max_seconds,
                    delivery.receive_count,
                    &delivery.dedup_key,
                );
                error!(
                    message_id = delivery.message_id,
                    run_id = %delivery.ordering_group,
                    delay_seconds,
                    error = %err,
                    "could not publish follow-up; releasing delivery"
                );
                self.channel
                    .release(delivery.message_id, delay_seconds, Some(&err.to_string()))?;
                Ok(None)
            }
        }
    }

    /// One pass over the channel: recover expired leases, lease up to
    /// `limit` group heads, and work them on up to `concurrency` threads.
    pub fn drain(&self, limit: usize, concurrency: usize) -> Result<DrainReport> {
        let mut report = DrainReport {
            recovered: self.channel.recover_expired_leases(&self.config.topic)?,
            ..DrainReport::default()
        };
        let deliveries = self.channel.receive(
            &self.config.topic,
            limit,
            self.config.visibility_timeout_seconds,
        )?;
        report.fetched = deliveries.len();

        let workers = concurrency.clamp(1, deliveries.len().max(1));
        if workers == 1 {
            for delivery in &deliveries {
                self.settle(delivery, &mut report)?;
            }
            return Ok(report);
        }

        let mut buckets: Vec<Vec<&Delivery>> = vec![Vec::new(); workers];
        for (index, delivery) in deliveries.iter().enumerate() {
            buckets[index % workers].push(delivery);
        }
        std::thread::scope(|scope| -> Result<()> {
            let handles: Vec<_> = buckets
                .into_iter()
                .map(|bucket| {
                    scope.spawn(move || -> Result<DrainReport> {
                        let mut partial = DrainReport::default();
                        for delivery in bucket {
                            self.settle(delivery, &mut partial)?;
                        }
                        Ok(partial)
                    })
                })
                .collect();
            for handle in handles {
                let partial = handle
                    .join()
                    .map_err(|_| RunSyncError::Internal("drain thread panicked".to_string()))??;
                report.absorb(&partial);
            }
            Ok(())
        })?;
        Ok(report)
    }

    fn settle(&self, delivery: &Delivery, report: &mut DrainReport) -> Result<()> {
        match self.handle_delivery(delivery)? {
            Some(outcome) => report.record(&outcome),
            None => report.released += 1,
        }
        Ok(())
    }
}
