//! Capped exponential backoff, pure and clock-free so it's testable
//! without a real timer (scenario D).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Per-project backoff state. `backoff_until >= last_error_time` by
/// construction: `backoff_until` is always derived from `last_error_time`
/// plus a delay, never set independently.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BackoffState {
    /// Consecutive failures observed since the last success.
    pub consecutive_errors: u32,
    /// Timestamp of the most recent recorded failure.
    pub last_error_time: Option<DateTime<Utc>>,
    /// Instant before which new attempts should be skipped.
    pub backoff_until: Option<DateTime<Utc>>,
}

impl Default for BackoffState {
    fn default() -> Self {
        Self {
            consecutive_errors: 0,
            last_error_time: None,
            backoff_until: None,
        }
    }
}

/// Capped exponential backoff: `cap_ms.min(base_ms * 2^(errors-1))`.
///
/// A pure function over `errors` so callers (and scenario D) can assert
/// on it without touching a clock.
pub fn next_backoff_ms(base_ms: u64, cap_ms: u64, errors: u32) -> u64 {
    if errors == 0 {
        return 0;
    }
    let shift = errors.saturating_sub(1).min(63);
    let factor = 1u64.checked_shl(shift).unwrap_or(u64::MAX);
    let scaled = base_ms.saturating_mul(factor);
    cap_ms.min(scaled)
}

impl BackoffState {
    /// Whether `now` is still within the backoff window.
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        self.backoff_until.map(|until| now < until).unwrap_or(false)
    }

    /// Remaining backoff duration at `now`, if any.
    pub fn remaining(&self, now: DateTime<Utc>) -> Option<chrono::Duration> {
        self.backoff_until.and_then(|until| {
            let delta = until - now;
            (delta > chrono::Duration::zero()).then_some(delta)
        })
    }

    /// Record a failure: increment the error count and set a fresh
    /// `backoff_until` derived from `now` and the capped-exponential
    /// delay.
    pub fn record_failure(&mut self, now: DateTime<Utc>, base_ms: u64, cap_ms: u64) {
        self.consecutive_errors += 1;
        self.last_error_time = Some(now);
        let delay_ms = next_backoff_ms(base_ms, cap_ms, self.consecutive_errors);
        self.backoff_until = Some(now + chrono::Duration::milliseconds(delay_ms as i64));
    }

    /// Record a success: reset error count and clear the backoff window.
    pub fn record_success(&mut self) {
        self.consecutive_errors = 0;
        self.backoff_until = None;
    }
}
