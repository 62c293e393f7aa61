use std::time::Instant;

use crate::error::{Result, RunSyncError};
use crate::models::{ChannelMessage, ChannelMessageStatus, ReconciliationMessage, RedriveReport};
use crate::store::RunStore;

use super::RunSync;

impl RunSync {
    pub fn list_dead_letters(&self, limit: usize) -> Result<Vec<ChannelMessage>> {
        self.state.list_channel_messages(
            &self.worker.config().topic,
            ChannelMessageStatus::DeadLetter,
            limit,
        )
    }

    /// Puts a dead-lettered run back on its chain with a fresh retry budget.
    /// The republished message opens the next sequence at attempt 0.
    pub fn redrive_dead_letter(&self, dead_letter_id: i64) -> Result<RedriveReport> {
        let request_id = uuid::Uuid::new_v4().to_string();
        let started = Instant::now();

        let output = self.redrive_inner(dead_letter_id);
        match &output {
            Ok(report) => self.request_log.log_status(
                request_id,
                "queue.redrive",
                "ok",
                started,
                Some(report.run_id.clone()),
                Some(serde_json::to_value(report).unwrap_or_default()),
            ),
            Err(err) => self.request_log.log_error(
                request_id,
                "queue.redrive",
                started,
                None,
                err,
                Some(serde_json::json!({ "dead_letter_id": dead_letter_id })),
            ),
        }
        output
    }

    fn redrive_inner(&self, dead_letter_id: i64) -> Result<RedriveReport> {
        let row = self
            .state
            .get_channel_message(dead_letter_id)?
            .filter(|row| row.topic == self.worker.config().topic)
            .ok_or_else(|| {
                RunSyncError::Validation(format!("dead letter not found: {dead_letter_id}"))
            })?;
        if row.status != ChannelMessageStatus::DeadLetter.as_str() {
            return Err(RunSyncError::Validation(format!(
                "message {dead_letter_id} is {}, not dead_letter",
                row.status
            )));
        }
        let parked: ReconciliationMessage = serde_json::from_value(row.body).map_err(|err| {
            RunSyncError::Validation(format!("dead letter {dead_letter_id} is not a run message: {err}"))
        })?;
        let run_id = row.ordering_group;

        let record = match self.state.get_run(&run_id)? {
            Some(run) => serde_json::to_value(run)?,
            None => parked.record.clone(),
        };
        let fresh = ReconciliationMessage {
            record,
            attempt: 0,
            sequence: parked.sequence.saturating_add(1),
            ..parked
        };
        let receipt = self.worker.publish(&run_id, &fresh, 0)?;
        self.state.mark_dead_letter_redriven(dead_letter_id)?;

        Ok(RedriveReport {
            dead_letter_id,
            run_id,
            message_id: receipt.message_id(),
            deduplicated: !receipt.is_published(),
        })
    }
}
