//! Per-request admission verdicts.

use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};

/// Outcome of counting one request against one window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Verdict {
    pub allowed: bool,
    /// The tier's quota.
    pub limit: u32,
    /// Requests still admissible in the current window.
    pub remaining: u32,
    /// When the current window expires.
    pub reset_at: DateTime<Utc>,
}

impl Verdict {
    pub fn allowed(limit: u32, remaining: u32, reset_at: DateTime<Utc>) -> Self {
        Self {
            allowed: true,
            limit,
            remaining,
            reset_at,
        }
    }

    pub fn denied(limit: u32, reset_at: DateTime<Utc>) -> Self {
        Self {
            allowed: false,
            limit,
            remaining: 0,
            reset_at,
        }
    }

    /// Time until the window resets, never negative.
    pub fn retry_after(&self, now: DateTime<Utc>) -> Duration {
        (self.reset_at - now).to_std().unwrap_or(Duration::ZERO)
    }

    /// [`Verdict::retry_after`] in whole seconds, rounded up.
    pub fn retry_after_secs(&self, now: DateTime<Utc>) -> u64 {
        self.retry_after(now).as_millis().div_ceil(1000) as u64
    }

    /// Reset instant as epoch seconds, rounded up so clients never retry early.
    pub fn reset_epoch_secs(&self) -> i64 {
        let secs = self.reset_at.timestamp();
        if self.reset_at.timestamp_subsec_nanos() > 0 {
            secs + 1
        } else {
            secs
        }
    }
}

/// `now + by`, saturating at the far end of the calendar.
pub(crate) fn instant_after(now: DateTime<Utc>, by: Duration) -> DateTime<Utc> {
    TimeDelta::from_std(by)
        .ok()
        .and_then(|delta| now.checked_add_signed(delta))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}
