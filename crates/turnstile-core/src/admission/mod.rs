//! Admission control: the window limiter, the store guard and the gate that
//! ties them to identifiers and policies.

mod config;
mod gate;
mod guard;
mod limiter;
mod outcome;

#[cfg(test)]
pub(crate) mod testing;

pub use config::AdmissionConfig;
pub use gate::{AdmissionGate, AdmissionRequest};
pub use guard::{FailClosed, FailOpen, StoreFailureStrategy, StoreGuard};
pub use limiter::SlidingWindowLimiter;
pub use outcome::{
    AdmissionResult, Denial, LIMIT_HEADER, REMAINING_HEADER, RESET_HEADER, RETRY_AFTER_HEADER,
    RateLimitHeaders,
};
