//! Admission gate - the per-request entry point.

use std::sync::Arc;

use super::config::AdmissionConfig;
use super::guard::{FailClosed, FailOpen, StoreFailureStrategy, StoreGuard};
use super::limiter::SlidingWindowLimiter;
use super::outcome::{AdmissionResult, Denial, RateLimitHeaders};
use crate::domain::{Identifier, Policy, PolicyRegistry, Tier, UnknownTierMode, Verdict};
use crate::error::AdmissionError;
use crate::ports::{Clock, CounterStore, SystemClock};

/// What the gate needs to know about a request.
#[derive(Debug, Clone, Default)]
pub struct AdmissionRequest {
    /// Authenticated user id, if any.
    pub user_id: Option<String>,
    /// Raw `X-Forwarded-For` chain.
    pub forwarded_for: Option<String>,
    /// Direct connection address.
    pub peer_addr: Option<String>,
}

impl AdmissionRequest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_user_id(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    pub fn with_forwarded_for(mut self, chain: impl Into<String>) -> Self {
        self.forwarded_for = Some(chain.into());
        self
    }

    pub fn with_peer_addr(mut self, addr: impl Into<String>) -> Self {
        self.peer_addr = Some(addr.into());
        self
    }

    pub fn identifier(&self) -> Identifier {
        Identifier::resolve(
            self.user_id.as_deref(),
            self.forwarded_for.as_deref(),
            self.peer_addr.as_deref(),
        )
    }
}

/// Resolves identifier and policy, counts the request and turns the verdict
/// into an [`AdmissionResult`].
///
/// Holds no in-process lock: all coordination between concurrent requests
/// and API instances happens in the counter store's atomic increment.
pub struct AdmissionGate {
    registry: Arc<PolicyRegistry>,
    limiter: SlidingWindowLimiter,
    guard: StoreGuard,
    unknown_tier: UnknownTierMode,
}

impl AdmissionGate {
    /// Gate on the system clock, with [`FailOpen`] or [`FailClosed`] picked
    /// by `config.fail_open`.
    pub fn new(
        store: Arc<dyn CounterStore>,
        registry: Arc<PolicyRegistry>,
        config: AdmissionConfig,
    ) -> Self {
        let strategy: Arc<dyn StoreFailureStrategy> = if config.fail_open {
            Arc::new(FailOpen)
        } else {
            Arc::new(FailClosed)
        };
        Self::with_parts(store, registry, config, Arc::new(SystemClock), strategy)
    }

    pub fn with_parts(
        store: Arc<dyn CounterStore>,
        registry: Arc<PolicyRegistry>,
        config: AdmissionConfig,
        clock: Arc<dyn Clock>,
        strategy: Arc<dyn StoreFailureStrategy>,
    ) -> Self {
        Self {
            registry,
            limiter: SlidingWindowLimiter::new(store, clock.clone(), config.key_prefix),
            guard: StoreGuard::new(strategy, clock, config.store_timeout),
            unknown_tier: config.unknown_tier,
        }
    }

    /// Admit a request under the tier called `tier_name`.
    ///
    /// Fails only when the name is unknown and the gate runs in
    /// [`UnknownTierMode::Reject`].
    pub async fn admit(
        &self,
        request: &AdmissionRequest,
        tier_name: &str,
    ) -> Result<AdmissionResult, AdmissionError> {
        let policy = self.resolve_policy(tier_name)?;
        Ok(self.admit_policy(request, &policy).await)
    }

    /// Admit a request under a known tier.
    pub async fn admit_tier(&self, request: &AdmissionRequest, tier: Tier) -> AdmissionResult {
        let policy = *self.registry.policy(tier);
        self.admit_policy(request, &policy).await
    }

    /// Current quota for the caller without counting a request.
    pub async fn peek_tier(&self, request: &AdmissionRequest, tier: Tier) -> Verdict {
        let policy = self.registry.policy(tier);
        let identifier = request.identifier();
        self.guard
            .protect(&identifier, policy, self.limiter.peek(&identifier, policy))
            .await
    }

    fn resolve_policy(&self, tier_name: &str) -> Result<Policy, AdmissionError> {
        match self.registry.lookup(tier_name) {
            Ok(policy) => Ok(*policy),
            Err(_) => match self.unknown_tier {
                UnknownTierMode::Reject => {
                    tracing::error!(tier = %tier_name, "Unknown rate limit tier");
                    Err(AdmissionError::UnknownTier(tier_name.to_string()))
                }
                UnknownTierMode::MostConservative => {
                    let fallback = self.registry.most_conservative();
                    tracing::error!(
                        tier = %tier_name,
                        fallback = %fallback.tier,
                        "Unknown rate limit tier, applying most conservative policy"
                    );
                    Ok(*fallback)
                }
            },
        }
    }

    async fn admit_policy(&self, request: &AdmissionRequest, policy: &Policy) -> AdmissionResult {
        let identifier = request.identifier();
        let verdict = self
            .guard
            .protect(&identifier, policy, self.limiter.check(&identifier, policy))
            .await;

        let headers = RateLimitHeaders {
            limit: verdict.limit,
            remaining: verdict.remaining,
            reset: verdict.reset_epoch_secs(),
        };

        if verdict.allowed {
            return AdmissionResult::Admitted(headers);
        }

        let retry_after = verdict.retry_after_secs(self.limiter.now());
        tracing::debug!(
            identifier = %identifier.redacted(),
            tier = %policy.tier,
            retry_after,
            "Rate limit exceeded"
        );
        AdmissionResult::Denied(Denial::new(policy.tier, retry_after, headers))
    }
}

impl std::fmt::Debug for AdmissionGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdmissionGate")
            .field("registry", &self.registry)
            .field("store_timeout", &self.guard.timeout())
            .field("unknown_tier", &self.unknown_tier)
            .finish_non_exhaustive()
    }
}
