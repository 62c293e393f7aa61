mod channel;
mod message;
mod report;
mod run;
mod status;
mod trace;

pub use channel::{
    ChannelCounts, ChannelMessage, ChannelMessageStatus, ChannelOverview, DeadLetterRate,
    Delivery, PublishReceipt, PublishRequest,
};
pub use message::{OPERATION_UPDATE, ReconciliationMessage, TYPE_LABORATORY_RUN};
pub use report::{DrainReport, ReconcileOutcome, RedriveReport};
pub use run::{LaboratoryRun, NewLaboratoryRun, Platform, STATUS_CHECK_ACTOR};
pub use status::{CanonicalStatus, ObservedStatus};
pub use trace::RequestLogEntry;
