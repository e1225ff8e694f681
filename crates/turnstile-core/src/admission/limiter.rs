//! Window counter limiter.
//!
//! Each `(tier, identifier)` pair owns one bucket in the counter store. The
//! first request of a window creates the bucket and starts its expiry; every
//! request increments it; the store's TTL ends the window. Buckets are fixed,
//! not continuously sliding, so up to twice the quota can pass across a
//! bucket boundary.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::domain::{Identifier, Policy, Verdict, instant_after};
use crate::ports::{Clock, CounterStore, StoreError, WindowRecord};

pub struct SlidingWindowLimiter {
    store: Arc<dyn CounterStore>,
    clock: Arc<dyn Clock>,
    key_prefix: String,
}

impl SlidingWindowLimiter {
    pub fn new(
        store: Arc<dyn CounterStore>,
        clock: Arc<dyn Clock>,
        key_prefix: impl Into<String>,
    ) -> Self {
        Self {
            store,
            clock,
            key_prefix: key_prefix.into(),
        }
    }

    /// Store key for a bucket: `<prefix>:<tier>:<identifier>`.
    pub fn key_for(&self, identifier: &Identifier, policy: &Policy) -> String {
        format!("{}:{}:{}", self.key_prefix, policy.tier, identifier)
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Count one request and decide whether it is admitted.
    ///
    /// The Nth request of a window with quota N is admitted with
    /// `remaining == 0`; the N+1th is denied.
    pub async fn check(
        &self,
        identifier: &Identifier,
        policy: &Policy,
    ) -> Result<Verdict, StoreError> {
        let key = self.key_for(identifier, policy);
        let record = self.store.increment(&key, policy.window).await?;
        Ok(counted_verdict(record, policy, self.clock.now()))
    }

    /// The current state of a bucket without consuming quota.
    pub async fn peek(
        &self,
        identifier: &Identifier,
        policy: &Policy,
    ) -> Result<Verdict, StoreError> {
        let key = self.key_for(identifier, policy);
        let now = self.clock.now();

        let verdict = match self.store.get(&key, policy.window).await? {
            Some(record) => {
                let used = u32::try_from(record.count).unwrap_or(u32::MAX);
                let remaining = policy.quota.saturating_sub(used);
                let reset_at = instant_after(now, record.ttl);
                if remaining > 0 {
                    Verdict::allowed(policy.quota, remaining, reset_at)
                } else {
                    Verdict::denied(policy.quota, reset_at)
                }
            }
            None => Verdict::allowed(
                policy.quota,
                policy.quota,
                instant_after(now, policy.window),
            ),
        };
        Ok(verdict)
    }
}

fn counted_verdict(record: WindowRecord, policy: &Policy, now: DateTime<Utc>) -> Verdict {
    let reset_at = instant_after(now, record.ttl);
    let quota = u64::from(policy.quota);

    if record.count <= quota {
        // count <= quota, so the difference fits in u32
        let remaining = (quota - record.count) as u32;
        Verdict::allowed(policy.quota, remaining, reset_at)
    } else {
        Verdict::denied(policy.quota, reset_at)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::admission::testing::{MemoryStore, test_clock};
    use crate::domain::{PolicyRegistry, Tier};
    use crate::ports::ManualClock;

    fn limiter(clock: &ManualClock) -> SlidingWindowLimiter {
        let store = Arc::new(MemoryStore::new(clock.clone()));
        SlidingWindowLimiter::new(store, Arc::new(clock.clone()), "test")
    }

    fn credential() -> Policy {
        *PolicyRegistry::default().policy(Tier::Credential)
    }

    #[test]
    fn test_key_layout() {
        let clock = test_clock();
        let limiter = limiter(&clock);
        let id = Identifier::User("42".to_string());
        assert_eq!(
            limiter.key_for(&id, &credential()),
            "test:credential:user:42"
        );
    }

    #[tokio::test]
    async fn test_quota_is_exact() {
        let clock = test_clock();
        let limiter = limiter(&clock);
        let id = Identifier::User("42".to_string());
        let policy = credential();

        for expected in [4, 3, 2, 1, 0] {
            let verdict = limiter.check(&id, &policy).await.unwrap();
            assert!(verdict.allowed);
            assert_eq!(verdict.remaining, expected);
            assert_eq!(verdict.limit, 5);
        }

        let sixth = limiter.check(&id, &policy).await.unwrap();
        assert!(!sixth.allowed);
        assert_eq!(sixth.remaining, 0);
    }

    #[tokio::test]
    async fn test_reset_at_tracks_bucket_expiry() {
        let clock = test_clock();
        let limiter = limiter(&clock);
        let id = Identifier::User("42".to_string());
        let policy = credential();
        let start = clock.now();

        let first = limiter.check(&id, &policy).await.unwrap();
        assert_eq!(first.reset_at, start + chrono::TimeDelta::minutes(15));

        // later requests do not push the expiry out
        clock.advance(Duration::from_secs(120));
        let second = limiter.check(&id, &policy).await.unwrap();
        assert_eq!(second.reset_at, first.reset_at);
    }

    #[tokio::test]
    async fn test_counts_do_not_leak_across_windows() {
        let clock = test_clock();
        let limiter = limiter(&clock);
        let id = Identifier::Address("203.0.113.5".to_string());
        let policy = credential();

        for _ in 0..6 {
            limiter.check(&id, &policy).await.unwrap();
        }
        clock.advance(policy.window);

        let verdict = limiter.check(&id, &policy).await.unwrap();
        assert!(verdict.allowed);
        assert_eq!(verdict.remaining, policy.quota - 1);
    }

    #[tokio::test]
    async fn test_peek_does_not_consume_quota() {
        let clock = test_clock();
        let limiter = limiter(&clock);
        let id = Identifier::User("7".to_string());
        let policy = credential();

        let fresh = limiter.peek(&id, &policy).await.unwrap();
        assert!(fresh.allowed);
        assert_eq!(fresh.remaining, 5);

        limiter.check(&id, &policy).await.unwrap();
        limiter.check(&id, &policy).await.unwrap();

        let peeked = limiter.peek(&id, &policy).await.unwrap();
        assert_eq!(peeked.remaining, 3);
        let again = limiter.peek(&id, &policy).await.unwrap();
        assert_eq!(again.remaining, 3);
    }

    #[tokio::test]
    async fn test_peek_reports_exhausted_bucket() {
        let clock = test_clock();
        let limiter = limiter(&clock);
        let id = Identifier::User("7".to_string());
        let policy = credential();

        for _ in 0..7 {
            limiter.check(&id, &policy).await.unwrap();
        }

        let peeked = limiter.peek(&id, &policy).await.unwrap();
        assert!(!peeked.allowed);
        assert_eq!(peeked.remaining, 0);
    }
}
