//! Store failure handling.
//!
//! Every counter store round-trip goes through [`StoreGuard::protect`], which
//! bounds it with a timeout and turns failures into a verdict chosen by the
//! injected [`StoreFailureStrategy`]. The default, [`FailOpen`], trades
//! strictness for availability: while the store is down nothing is rate
//! limited. That is acceptable for abuse mitigation, not for billing or hard
//! quota enforcement.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::domain::{Identifier, Policy, Verdict, instant_after};
use crate::ports::{Clock, StoreError};

/// Decides the verdict when the counter store cannot be reached.
pub trait StoreFailureStrategy: Send + Sync {
    fn on_store_error(&self, policy: &Policy, now: DateTime<Utc>) -> Verdict;
}

/// Admit with the tier's full quota.
#[derive(Debug, Clone, Copy, Default)]
pub struct FailOpen;

impl StoreFailureStrategy for FailOpen {
    fn on_store_error(&self, policy: &Policy, now: DateTime<Utc>) -> Verdict {
        Verdict::allowed(policy.quota, policy.quota, instant_after(now, policy.window))
    }
}

/// Deny until the store is back.
#[derive(Debug, Clone, Copy, Default)]
pub struct FailClosed;

impl StoreFailureStrategy for FailClosed {
    fn on_store_error(&self, policy: &Policy, now: DateTime<Utc>) -> Verdict {
        Verdict::denied(policy.quota, instant_after(now, policy.window))
    }
}

pub struct StoreGuard {
    strategy: Arc<dyn StoreFailureStrategy>,
    clock: Arc<dyn Clock>,
    timeout: Duration,
}

impl StoreGuard {
    pub fn new(
        strategy: Arc<dyn StoreFailureStrategy>,
        clock: Arc<dyn Clock>,
        timeout: Duration,
    ) -> Self {
        Self {
            strategy,
            clock,
            timeout,
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Run one store call under the timeout. A failed or late call logs a
    /// single warning and yields the strategy's verdict.
    pub async fn protect<F>(&self, identifier: &Identifier, policy: &Policy, call: F) -> Verdict
    where
        F: Future<Output = Result<Verdict, StoreError>>,
    {
        let error = match tokio::time::timeout(self.timeout, call).await {
            Ok(Ok(verdict)) => return verdict,
            Ok(Err(e)) => e,
            Err(_) => StoreError::Timeout(self.timeout),
        };

        tracing::warn!(
            identifier = %identifier.redacted(),
            tier = %policy.tier,
            error = %error,
            "Counter store unavailable, applying failure strategy"
        );

        self.strategy.on_store_error(policy, self.clock.now())
    }
}
