use std::thread;
use std::time::Duration;

use anyhow::Result;
use chrono::{DateTime, Utc};
use runsync_core::RunSync;
use runsync_core::models::DrainReport;

#[derive(Debug, serde::Serialize)]
pub(super) struct QueueWorkReport {
    mode: &'static str,
    started_at: DateTime<Utc>,
    iterations: u32,
    failed_cycles: u32,
    #[serde(flatten)]
    totals: DrainReport,
}

impl QueueWorkReport {
    fn new(mode: &'static str) -> Self {
        Self {
            mode,
            started_at: Utc::now(),
            iterations: 0,
            failed_cycles: 0,
            totals: DrainReport::default(),
        }
    }
}

pub(super) fn run_queue_worker(
    app: &RunSync,
    iterations: u32,
    limit: usize,
    concurrency: usize,
    sleep_ms: u64,
    stop_when_idle: bool,
) -> Result<QueueWorkReport> {
    let mut total = QueueWorkReport::new("work");
    for i in 0..iterations {
        let report = app.drain_channel(limit, concurrency)?;
        total.iterations = i + 1;
        total.totals.absorb(&report);
        tracing::debug!(
            iteration = i + 1,
            fetched = report.fetched,
            processed = report.processed,
            "queue work iteration"
        );

        if stop_when_idle && report.fetched == 0 {
            break;
        }
        if i + 1 < iterations {
            thread::sleep(Duration::from_millis(sleep_ms));
        }
    }
    Ok(total)
}

/// Cycle limits for the daemon loop.
#[derive(Debug, Clone, Copy)]
pub(super) struct DaemonLimits {
    pub(super) max_cycles: u32,
    pub(super) sleep_ms: u64,
    pub(super) stop_when_idle: bool,
    pub(super) idle_cycles: u32,
}

pub(super) fn run_queue_daemon(
    app: &RunSync,
    limit: usize,
    concurrency: usize,
    limits: DaemonLimits,
) -> QueueWorkReport {
    drive_daemon(|| app.drain_channel(limit, concurrency), limits)
}

fn drive_daemon(
    mut drain: impl FnMut() -> runsync_core::Result<DrainReport>,
    limits: DaemonLimits,
) -> QueueWorkReport {
    let mut total = QueueWorkReport::new("daemon");
    let mut idle_streak = 0u32;
    let mut cycle = 0u32;

    loop {
        if limits.max_cycles > 0 && cycle >= limits.max_cycles {
            break;
        }
        cycle += 1;
        total.iterations = cycle;

        let report = match drain() {
            Ok(report) => report,
            Err(err) => {
                total.failed_cycles += 1;
                tracing::warn!(cycle, error = %err, code = err.code(), "queue drain failed");
                thread::sleep(Duration::from_millis(limits.sleep_ms));
                continue;
            }
        };
        total.totals.absorb(&report);

        if report.fetched == 0 {
            idle_streak = idle_streak.saturating_add(1);
        } else {
            idle_streak = 0;
        }
        if limits.stop_when_idle && idle_streak >= limits.idle_cycles.max(1) {
            break;
        }

        thread::sleep(Duration::from_millis(limits.sleep_ms));
    }

    tracing::info!(cycles = cycle, processed = total.totals.processed, "queue daemon stopped");
    total
}
