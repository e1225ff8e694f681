use std::time::Duration;

use crate::domain::UnknownTierMode;

/// Admission gate configuration.
#[derive(Debug, Clone)]
pub struct AdmissionConfig {
    /// Namespace for counter store keys.
    pub key_prefix: String,
    /// Upper bound on one counter store round-trip.
    pub store_timeout: Duration,
    /// Admit (`true`) or deny (`false`) while the store is unavailable.
    pub fail_open: bool,
    pub unknown_tier: UnknownTierMode,
}

impl Default for AdmissionConfig {
    fn default() -> Self {
        Self {
            key_prefix: "ratelimit".to_string(),
            store_timeout: Duration::from_millis(100),
            fail_open: true,
            unknown_tier: UnknownTierMode::Reject,
        }
    }
}

impl AdmissionConfig {
    pub fn with_store_timeout(mut self, timeout: Duration) -> Self {
        self.store_timeout = timeout;
        self
    }
}
