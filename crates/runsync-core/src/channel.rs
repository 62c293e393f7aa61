use crate::error::Result;
use crate::models::{Delivery, PublishReceipt, PublishRequest, ReconciliationMessage};

/// Ordered, deduplicating, at-least-once message channel.
///
/// Messages in one ordering group are handed out strictly one at a time in
/// publish order: the next message of a group becomes deliverable only after
/// its predecessor is acknowledged. Messages in different groups are
/// independent.
pub trait RequeueChannel: Send + Sync {
    fn publish(&self, request: &PublishRequest) -> Result<PublishReceipt>;

    /// Leases up to `limit` visible group heads on `topic`.
    fn receive(
        &self,
        topic: &str,
        limit: usize,
        visibility_timeout_seconds: i64,
    ) -> Result<Vec<Delivery>>;

    fn acknowledge(&self, message_id: i64) -> Result<()>;

    /// Returns a leased message to its group head, visible again after
    /// `delay_seconds`.
    fn release(&self, message_id: i64, delay_seconds: i64, error: Option<&str>) -> Result<()>;

    /// Makes messages whose lease ran out deliverable again.
    fn recover_expired_leases(&self, topic: &str) -> Result<u64>;

    /// Parks `message` on the dead-letter path of `topic`.
    fn dead_letter(
        &self,
        topic: &str,
        ordering_group: &str,
        message: &ReconciliationMessage,
        reason: &str,
    ) -> Result<i64>;
}
