//! Provider status vocabularies.
//!
//! Each provider keeps its own raw status strings; this module is the only
//! place that decides which of them are terminal and how they map onto
//! [`CanonicalStatus`]. Comparisons are case-insensitive.

use crate::models::{CanonicalStatus, ObservedStatus, Platform};

/// Sentinel stored when a provider response carries no status at all.
pub const UNKNOWN_STATUS: &str = "UNKNOWN";

const HEALTHOMICS_TERMINAL: &[&str] = &["CANCELLED", "COMPLETED", "DELETED", "FAILED"];
const SEQERA_TERMINAL: &[&str] = &["CANCELLED", "FAILED", "SUCCEEDED"];

pub const fn terminal_statuses(platform: Platform) -> &'static [&'static str] {
    match platform {
        Platform::AwsHealthOmics => HEALTHOMICS_TERMINAL,
        Platform::SeqeraCloud => SEQERA_TERMINAL,
    }
}

pub fn is_terminal(platform: Platform, raw: &str) -> bool {
    let raw = raw.trim();
    terminal_statuses(platform)
        .iter()
        .any(|terminal| terminal.eq_ignore_ascii_case(raw))
}

pub fn canonical_status(platform: Platform, raw: &str) -> CanonicalStatus {
    let upper = raw.trim().to_ascii_uppercase();
    match platform {
        Platform::AwsHealthOmics => match upper.as_str() {
            "PENDING" | "STARTING" => CanonicalStatus::Pending,
            "RUNNING" | "STOPPING" => CanonicalStatus::Running,
            "COMPLETED" => CanonicalStatus::Succeeded,
            "FAILED" => CanonicalStatus::Failed,
            "CANCELLED" | "DELETED" => CanonicalStatus::Cancelled,
            _ => CanonicalStatus::Unknown,
        },
        Platform::SeqeraCloud => match upper.as_str() {
            "SUBMITTED" => CanonicalStatus::Pending,
            "RUNNING" => CanonicalStatus::Running,
            "SUCCEEDED" => CanonicalStatus::Succeeded,
            "FAILED" => CanonicalStatus::Failed,
            "CANCELLED" => CanonicalStatus::Cancelled,
            _ => CanonicalStatus::Unknown,
        },
    }
}

pub fn observe(platform: Platform, raw: &str) -> ObservedStatus {
    let trimmed = raw.trim();
    let raw = if trimmed.is_empty() {
        UNKNOWN_STATUS
    } else {
        trimmed
    };
    ObservedStatus {
        raw: raw.to_string(),
        canonical: canonical_status(platform, raw),
        terminal: is_terminal(platform, raw),
    }
}
