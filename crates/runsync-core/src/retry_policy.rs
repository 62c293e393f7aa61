use crate::config::{RetryConfig, RetryMode};
use crate::error::FailureClass;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RetryDecision {
    Drop,
    Retry { delay_seconds: i64 },
    DeadLetter,
}

/// `attempt` is the number the successor would carry, i.e. the failed
/// attempt count including the cycle that just failed.
pub(crate) fn decide_retry(
    config: &RetryConfig,
    class: FailureClass,
    attempt: u32,
    seed: &str,
) -> RetryDecision {
    if class == FailureClass::Terminal {
        return RetryDecision::Drop;
    }
    if config.mode == RetryMode::Unbounded {
        return RetryDecision::Retry { delay_seconds: 0 };
    }
    if !should_retry(config, class, attempt) {
        return RetryDecision::DeadLetter;
    }
    RetryDecision::Retry {
        delay_seconds: retry_backoff_seconds(config.backoff_max_seconds, attempt, seed),
    }
}

pub(crate) const fn should_retry(config: &RetryConfig, class: FailureClass, attempt: u32) -> bool {
    let max_attempts = match class {
        FailureClass::Terminal => 0,
        FailureClass::Secret => config.secret_max_attempts,
        FailureClass::Transient => config.max_attempts,
    };
    attempt <= max_attempts
}

pub(crate) fn retry_backoff_seconds(max_seconds: i64, attempt: u32, seed: &str) -> i64 {
    let max = max_seconds.max(1);
    let capped_exp = attempt.saturating_sub(1).min(10);
    let base = 1_i64 << capped_exp;
    let baseline = base.min(max);
    let jitter_bound = (baseline / 4).max(1);
    let jitter_seed = format!("{seed}:{attempt}");
    let hash = blake3::hash(jitter_seed.as_bytes());
    let bytes = hash.as_bytes();
    let rand = i64::from(u16::from_be_bytes([bytes[0], bytes[1]]));
    let jitter = rand % (jitter_bound + 1);
    (baseline + jitter).min(max)
}
