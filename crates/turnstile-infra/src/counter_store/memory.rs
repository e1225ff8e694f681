//! In-memory counter store - used when Redis is not configured or unreachable.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use tokio::sync::Mutex;

use turnstile_core::ports::{Clock, CounterStore, StoreError, SystemClock, WindowRecord};

struct Bucket {
    count: u64,
    expires_at: DateTime<Utc>,
}

impl Bucket {
    fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }

    fn ttl(&self, now: DateTime<Utc>) -> Duration {
        (self.expires_at - now).to_std().unwrap_or(Duration::ZERO)
    }
}

/// In-memory counter store using a HashMap behind an async mutex.
///
/// The mutex is the atomic primitive: increments on one process never lose
/// updates. Counts are per-process, not shared across instances, and are lost
/// on restart.
pub struct InMemoryCounterStore {
    buckets: Mutex<HashMap<String, Bucket>>,
    clock: Arc<dyn Clock>,
}

impl InMemoryCounterStore {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            buckets: Mutex::new(HashMap::new()),
            clock,
        }
    }

    /// Drop every expired bucket. Returns how many were removed.
    pub async fn purge_expired(&self) -> usize {
        let now = self.clock.now();
        let mut buckets = self.buckets.lock().await;
        let before = buckets.len();
        buckets.retain(|_, bucket| !bucket.is_expired(now));
        before - buckets.len()
    }
}

impl Default for InMemoryCounterStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CounterStore for InMemoryCounterStore {
    async fn increment(&self, key: &str, window: Duration) -> Result<WindowRecord, StoreError> {
        let window = TimeDelta::from_std(window)
            .map_err(|e| StoreError::Command(format!("window out of range: {e}")))?;
        let now = self.clock.now();
        let mut buckets = self.buckets.lock().await;

        let bucket = buckets.entry(key.to_string()).or_insert(Bucket {
            count: 0,
            expires_at: now + window,
        });

        // An expired bucket is a new window; the expiry is only set here.
        if bucket.is_expired(now) {
            bucket.count = 0;
            bucket.expires_at = now + window;
        }
        bucket.count += 1;

        Ok(WindowRecord {
            count: bucket.count,
            ttl: bucket.ttl(now),
        })
    }

    async fn get(&self, key: &str, _window: Duration) -> Result<Option<WindowRecord>, StoreError> {
        let now = self.clock.now();
        let buckets = self.buckets.lock().await;

        Ok(buckets
            .get(key)
            .filter(|bucket| !bucket.is_expired(now))
            .map(|bucket| WindowRecord {
                count: bucket.count,
                ttl: bucket.ttl(now),
            }))
    }
}
