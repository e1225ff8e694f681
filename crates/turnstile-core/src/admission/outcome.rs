//! What the gate hands back to the HTTP layer.

use crate::domain::Tier;

/// `X-RateLimit-Limit`
pub const LIMIT_HEADER: &str = "x-ratelimit-limit";
/// `X-RateLimit-Remaining`
pub const REMAINING_HEADER: &str = "x-ratelimit-remaining";
/// `X-RateLimit-Reset`, epoch seconds.
pub const RESET_HEADER: &str = "x-ratelimit-reset";
/// `Retry-After`, seconds. Only sent on denial.
pub const RETRY_AFTER_HEADER: &str = "retry-after";

/// The `X-RateLimit-*` triple attached to every limited response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitHeaders {
    pub limit: u32,
    pub remaining: u32,
    /// Epoch seconds at which the window resets.
    pub reset: i64,
}

impl RateLimitHeaders {
    pub fn pairs(&self) -> [(&'static str, String); 3] {
        [
            (LIMIT_HEADER, self.limit.to_string()),
            (REMAINING_HEADER, self.remaining.to_string()),
            (RESET_HEADER, self.reset.to_string()),
        ]
    }
}

/// A denied request. The shape is the same for every tier so clients need a
/// single back-off handler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Denial {
    pub tier: Tier,
    pub message: String,
    /// Seconds until the window resets, rounded up.
    pub retry_after: u64,
    pub headers: RateLimitHeaders,
}

impl Denial {
    pub(crate) fn new(tier: Tier, retry_after: u64, headers: RateLimitHeaders) -> Self {
        Self {
            tier,
            message: format!("Too many requests. Please try again in {retry_after} seconds."),
            retry_after,
            headers,
        }
    }

    /// The triple plus `Retry-After`.
    pub fn header_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = self.headers.pairs().to_vec();
        pairs.push((RETRY_AFTER_HEADER, self.retry_after.to_string()));
        pairs
    }
}

/// Result of [`crate::AdmissionGate::admit`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdmissionResult {
    /// Proceed; the headers may be attached to the normal response.
    Admitted(RateLimitHeaders),
    /// Answer 429 with the denial's body and headers.
    Denied(Denial),
}

impl AdmissionResult {
    pub fn is_admitted(&self) -> bool {
        matches!(self, AdmissionResult::Admitted(_))
    }

    pub fn headers(&self) -> &RateLimitHeaders {
        match self {
            AdmissionResult::Admitted(headers) => headers,
            AdmissionResult::Denied(denial) => &denial.headers,
        }
    }
}
