//! Counter store port - the shared, atomic, TTL-capable store every API
//! instance counts against.

use std::time::Duration;

use async_trait::async_trait;

/// State of one window bucket as seen right after a store operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowRecord {
    /// Requests counted in the bucket so far.
    pub count: u64,
    /// Time left before the bucket expires.
    pub ttl: Duration,
}

/// Counter store trait - abstraction over counter backends (Redis, in-memory).
///
/// Implementations must make `increment` atomic: concurrent callers on the
/// same key see distinct, consecutive counts, and only the increment that
/// creates the key sets its expiry.
#[async_trait]
pub trait CounterStore: Send + Sync {
    /// Increment `key`, creating it with a `window` expiry if absent, and
    /// return the post-increment count with the remaining TTL.
    async fn increment(&self, key: &str, window: Duration) -> Result<WindowRecord, StoreError>;

    /// Read a bucket without counting. `None` if absent or expired. A bucket
    /// found without an expiry is given `window`, as `increment` would.
    async fn get(&self, key: &str, window: Duration) -> Result<Option<WindowRecord>, StoreError>;
}

/// Counter store errors.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Connection failed: {0}")]
    Connection(String),

    #[error("Command failed: {0}")]
    Command(String),

    #[error("Timed out after {0:?}")]
    Timeout(Duration),
}
