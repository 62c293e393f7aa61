use serde::{Deserialize, Serialize};
use std::str::FromStr;

use super::message::ReconciliationMessage;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ChannelMessageStatus {
    New,
    Processing,
    Done,
    DeadLetter,
    Redriven,
}

impl ChannelMessageStatus {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::New => "new",
            Self::Processing => "processing",
            Self::Done => "done",
            Self::DeadLetter => "dead_letter",
            Self::Redriven => "redriven",
        }
    }
}

impl std::fmt::Display for ChannelMessageStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ChannelMessageStatus {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw {
            "new" => Ok(Self::New),
            "processing" => Ok(Self::Processing),
            "done" => Ok(Self::Done),
            "dead_letter" => Ok(Self::DeadLetter),
            "redriven" => Ok(Self::Redriven),
            other => Err(format!("unknown channel message status: {other}")),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PublishRequest {
    pub topic: String,
    pub ordering_group: String,
    pub dedup_key: String,
    pub message: ReconciliationMessage,
    pub delay_seconds: i64,
    /// A publish whose `dedup_key` was already accepted on the same topic
    /// within this many seconds is absorbed.
    pub dedup_window_seconds: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum PublishReceipt {
    Published { message_id: i64 },
    Deduplicated { existing_message_id: i64 },
}

impl PublishReceipt {
    pub const fn message_id(self) -> i64 {
        match self {
            Self::Published { message_id }
            | Self::Deduplicated {
                existing_message_id: message_id,
            } => message_id,
        }
    }

    pub const fn is_published(self) -> bool {
        matches!(self, Self::Published { .. })
    }
}

/// A message handed to a consumer under a lease.
#[derive(Debug, Clone, PartialEq)]
pub struct Delivery {
    pub message_id: i64,
    pub topic: String,
    pub ordering_group: String,
    pub dedup_key: String,
    pub receive_count: u32,
    pub body: serde_json::Value,
}

impl Delivery {
    /// Decodes the body. Bodies that are not reconciliation envelopes at all
    /// come back as `None` so the consumer can acknowledge and move on.
    pub fn message(&self) -> Option<ReconciliationMessage> {
        serde_json::from_value(self.body.clone()).ok()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChannelMessage {
    pub id: i64,
    pub topic: String,
    pub ordering_group: String,
    pub dedup_key: String,
    pub status: String,
    pub receive_count: u32,
    pub body: serde_json::Value,
    pub created_at: String,
    pub visible_at: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct ChannelCounts {
    pub new_total: u64,
    pub new_due: u64,
    pub processing: u64,
    pub done: u64,
    pub dead_letter: u64,
    pub redriven: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub earliest_visible_at: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DeadLetterRate {
    pub topic: String,
    pub total: u64,
    pub dead_letter: u64,
    pub dead_letter_rate: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ChannelOverview {
    pub counts: ChannelCounts,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dead_letter_rate: Vec<DeadLetterRate>,
}
