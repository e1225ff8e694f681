//! Test doubles shared by the admission tests.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::{Context, SubscriberExt};
use tracing_subscriber::{Layer, Registry};

use crate::ports::{Clock, CounterStore, ManualClock, StoreError, WindowRecord};

pub fn test_clock() -> ManualClock {
    ManualClock::new(DateTime::from_timestamp(1_700_000_000, 0).unwrap())
}

/// Mutex-backed store whose expiry follows a [`ManualClock`].
pub struct MemoryStore {
    clock: ManualClock,
    buckets: Mutex<HashMap<String, (u64, DateTime<Utc>)>>,
}

impl MemoryStore {
    pub fn new(clock: ManualClock) -> Self {
        Self {
            clock,
            buckets: Mutex::new(HashMap::new()),
        }
    }
}

fn ttl(expires_at: DateTime<Utc>, now: DateTime<Utc>) -> Duration {
    (expires_at - now).to_std().unwrap_or(Duration::ZERO)
}

#[async_trait]
impl CounterStore for MemoryStore {
    async fn increment(&self, key: &str, window: Duration) -> Result<WindowRecord, StoreError> {
        let now = self.clock.now();
        let mut buckets = self.buckets.lock().unwrap();
        let bucket = buckets
            .entry(key.to_string())
            .or_insert((0, now + TimeDelta::from_std(window).unwrap()));
        if bucket.1 <= now {
            *bucket = (0, now + TimeDelta::from_std(window).unwrap());
        }
        bucket.0 += 1;
        Ok(WindowRecord {
            count: bucket.0,
            ttl: ttl(bucket.1, now),
        })
    }

    async fn get(&self, key: &str, _window: Duration) -> Result<Option<WindowRecord>, StoreError> {
        let now = self.clock.now();
        let buckets = self.buckets.lock().unwrap();
        Ok(buckets
            .get(key)
            .filter(|(_, expires_at)| *expires_at > now)
            .map(|(count, expires_at)| WindowRecord {
                count: *count,
                ttl: ttl(*expires_at, now),
            }))
    }
}

/// How [`BrokenStore`] misbehaves.
pub enum Breakage {
    Refuse,
    Hang,
}

/// A store that never answers successfully.
pub struct BrokenStore(pub Breakage);

impl BrokenStore {
    async fn fail<T>(&self) -> Result<T, StoreError> {
        match self.0 {
            Breakage::Refuse => Err(StoreError::Connection("connection refused".to_string())),
            Breakage::Hang => {
                tokio::time::sleep(Duration::from_secs(30)).await;
                Err(StoreError::Command("unreachable".to_string()))
            }
        }
    }
}

#[async_trait]
impl CounterStore for BrokenStore {
    async fn increment(&self, _key: &str, _window: Duration) -> Result<WindowRecord, StoreError> {
        self.fail().await
    }

    async fn get(&self, _key: &str, _window: Duration) -> Result<Option<WindowRecord>, StoreError> {
        self.fail().await
    }
}

/// Layer that records every WARN event as `message field=value ...`.
#[derive(Clone, Default)]
struct WarningCapture {
    events: Arc<Mutex<Vec<String>>>,
}

struct FieldVisitor(String);

impl tracing::field::Visit for FieldVisitor {
    fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn std::fmt::Debug) {
        if field.name() == "message" {
            self.0.push_str(&format!("{:?}", value));
        } else {
            self.0.push_str(&format!(" {}={:?}", field.name(), value));
        }
    }
}

impl<S: Subscriber> Layer<S> for WarningCapture {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        if *event.metadata().level() != Level::WARN {
            return;
        }
        let mut visitor = FieldVisitor(String::new());
        event.record(&mut visitor);
        self.events.lock().unwrap().push(visitor.0);
    }
}

/// Run `fut` on the current thread and return its output together with the
/// WARN events it emitted.
pub async fn capture_warnings<F: Future>(fut: F) -> (F::Output, Vec<String>) {
    let capture = WarningCapture::default();
    let subscriber = Registry::default().with(capture.clone());
    let output = {
        let _guard = tracing::subscriber::set_default(subscriber);
        fut.await
    };
    let events = capture.events.lock().unwrap().clone();
    (output, events)
}
