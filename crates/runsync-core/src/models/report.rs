use serde::{Deserialize, Serialize};

/// Result of one reconciliation cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ReconcileOutcome {
    /// Not a laboratory-run status check; acknowledged untouched.
    Ignored {
        operation: String,
        message_type: String,
    },
    /// The chain ended on a condition retrying cannot fix.
    Dropped {
        run_id: Option<String>,
        code: String,
    },
    /// Provider reported a terminal status; no successor.
    Finished {
        run_id: String,
        status: String,
        updated: bool,
    },
    /// Status is still moving; a successor was published.
    Rescheduled {
        run_id: String,
        status: String,
        updated: bool,
        delay_seconds: i64,
        deduplicated: bool,
    },
    /// The cycle failed; a delayed successor carries the next attempt.
    Retrying {
        run_id: String,
        code: String,
        attempt: u32,
        delay_seconds: i64,
    },
    /// The retry budget ran out; the message went to the dead-letter path.
    DeadLettered {
        run_id: String,
        code: String,
        attempt: u32,
    },
}

impl ReconcileOutcome {
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Ignored { .. } => "ignored",
            Self::Dropped { .. } => "dropped",
            Self::Finished { .. } => "finished",
            Self::Rescheduled { .. } => "rescheduled",
            Self::Retrying { .. } => "retrying",
            Self::DeadLettered { .. } => "dead_lettered",
        }
    }

    pub const fn status_updated(&self) -> bool {
        match self {
            Self::Finished { updated, .. } | Self::Rescheduled { updated, .. } => *updated,
            _ => false,
        }
    }

    /// True when the run's chain continues through a successor message.
    pub const fn continues_chain(&self) -> bool {
        matches!(self, Self::Rescheduled { .. } | Self::Retrying { .. })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct DrainReport {
    pub recovered: u64,
    pub fetched: usize,
    pub processed: usize,
    pub ignored: usize,
    pub dropped: usize,
    pub finished: usize,
    pub rescheduled: usize,
    pub retrying: usize,
    pub dead_lettered: usize,
    pub released: usize,
    pub status_updates: usize,
}

impl DrainReport {
    pub fn record(&mut self, outcome: &ReconcileOutcome) {
        self.processed += 1;
        if outcome.status_updated() {
            self.status_updates += 1;
        }
        match outcome {
            ReconcileOutcome::Ignored { .. } => self.ignored += 1,
            ReconcileOutcome::Dropped { .. } => self.dropped += 1,
            ReconcileOutcome::Finished { .. } => self.finished += 1,
            ReconcileOutcome::Rescheduled { .. } => self.rescheduled += 1,
            ReconcileOutcome::Retrying { .. } => self.retrying += 1,
            ReconcileOutcome::DeadLettered { .. } => self.dead_lettered += 1,
        }
    }

    pub fn absorb(&mut self, other: &Self) {
        self.recovered += other.recovered;
        self.fetched += other.fetched;
        self.processed += other.processed;
        self.ignored += other.ignored;
        self.dropped += other.dropped;
        self.finished += other.finished;
        self.rescheduled += other.rescheduled;
        self.retrying += other.retrying;
        self.dead_lettered += other.dead_lettered;
        self.released += other.released;
        self.status_updates += other.status_updates;
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedriveReport {
    pub dead_letter_id: i64,
    pub run_id: String,
    pub message_id: i64,
    pub deduplicated: bool,
}
