use std::time::Instant;

use crate::error::Result;
use crate::models::{ChannelOverview, DrainReport, RequestLogEntry};

use super::RunSync;

impl RunSync {
    pub fn drain_channel(&self, limit: usize, concurrency: usize) -> Result<DrainReport> {
        let request_id = uuid::Uuid::new_v4().to_string();
        let started = Instant::now();

        match self.worker.drain(limit, concurrency) {
            Ok(report) => {
                if report.fetched > 0 || report.recovered > 0 {
                    self.request_log.log_status(
                        request_id,
                        "queue.drain",
                        "ok",
                        started,
                        None,
                        Some(serde_json::json!({
                            "limit": limit,
                            "concurrency": concurrency,
                            "report": report,
                        })),
                    );
                }
                Ok(report)
            }
            Err(err) => {
                self.request_log.log_error(
                    request_id,
                    "queue.drain",
                    started,
                    None,
                    &err,
                    Some(serde_json::json!({
                        "limit": limit,
                        "concurrency": concurrency,
                    })),
                );
                Err(err)
            }
        }
    }

    pub fn channel_overview(&self) -> Result<ChannelOverview> {
        Ok(ChannelOverview {
            counts: self.state.channel_counts(&self.worker.config().topic)?,
            dead_letter_rate: self.state.dead_letter_rates_by_topic()?,
        })
    }

    pub fn list_request_logs(&self, limit: usize) -> Result<Vec<RequestLogEntry>> {
        self.request_log.list_recent(limit)
    }
}
