//! Domain-level error types.

use thiserror::Error;

use crate::domain::Tier;

/// Policy table errors - raised while building or querying the registry.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PolicyError {
    #[error("Unknown rate limit tier: {0}")]
    UnknownTier(String),

    #[error("Invalid policy for tier {tier}: {reason}")]
    InvalidPolicy { tier: Tier, reason: String },
}

/// Admission errors - the only failures allowed to escape the gate.
///
/// Store outages and exceeded limits are not errors: the first is absorbed by
/// the failure strategy, the second is an ordinary denial.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AdmissionError {
    #[error("Unknown rate limit tier: {0}")]
    UnknownTier(String),
}
