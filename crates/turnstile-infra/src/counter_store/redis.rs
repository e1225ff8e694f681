//! Redis counter store - the shared store all API instances count against.

use std::time::Duration;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{Client, RedisError, Script};

use turnstile_core::ports::{CounterStore, StoreError, WindowRecord};

/// Atomic increment. The expiry is set only by the increment that creates the
/// key; a key that somehow lost its expiry gets one so it cannot count forever.
/// Returns `{count, pttl_ms}`.
const INCREMENT_SCRIPT: &str = r#"
local count = redis.call('INCR', KEYS[1])
if count == 1 then
    redis.call('PEXPIRE', KEYS[1], ARGV[1])
end

local ttl = redis.call('PTTL', KEYS[1])
if ttl < 0 then
    redis.call('PEXPIRE', KEYS[1], ARGV[1])
    ttl = tonumber(ARGV[1])
end
return {count, ttl}
"#;

/// Atomic read. Returns `{count, pttl_ms}`, or nil when the key is absent. A
/// key without an expiry gets one, so a peek never reports a zero TTL.
const PEEK_SCRIPT: &str = r#"
local count = redis.call('GET', KEYS[1])
if not count then
    return nil
end

local ttl = redis.call('PTTL', KEYS[1])
if ttl < 0 then
    redis.call('PEXPIRE', KEYS[1], ARGV[1])
    ttl = tonumber(ARGV[1])
end
return {tonumber(count), ttl}
"#;

/// Redis connection configuration.
#[derive(Debug, Clone)]
pub struct RedisConfig {
    /// Redis URL (e.g., redis://localhost:6379)
    pub url: String,
    /// Connection timeout
    pub connect_timeout: Duration,
    /// Whether to fall back to the in-memory store if Redis is unavailable
    pub fallback_to_memory: bool,
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            url: "redis://localhost:6379".to_string(),
            connect_timeout: Duration::from_secs(5),
            fallback_to_memory: true,
        }
    }
}

/// Redis-backed counter store.
///
/// Uses the connection manager for automatic reconnection; the manager is
/// cheap to clone, one clone per call.
pub struct RedisCounterStore {
    conn: ConnectionManager,
    increment: Script,
    peek: Script,
}

impl RedisCounterStore {
    pub async fn new(config: &RedisConfig) -> Result<Self, StoreError> {
        let client =
            Client::open(config.url.as_str()).map_err(|e| StoreError::Connection(e.to_string()))?;

        // Use timeout to prevent hanging if Redis is unreachable
        let conn = tokio::time::timeout(config.connect_timeout, ConnectionManager::new(client))
            .await
            .map_err(|_| StoreError::Timeout(config.connect_timeout))?
            .map_err(|e| StoreError::Connection(e.to_string()))?;

        tracing::info!(url = %config.url, "Connected to Redis counter store");

        Ok(Self {
            conn,
            increment: Script::new(INCREMENT_SCRIPT),
            peek: Script::new(PEEK_SCRIPT),
        })
    }
}

fn store_error(e: RedisError) -> StoreError {
    if e.is_io_error() || e.is_connection_dropped() || e.is_connection_refusal() {
        StoreError::Connection(e.to_string())
    } else if e.is_timeout() {
        StoreError::Timeout(Duration::ZERO)
    } else {
        StoreError::Command(e.to_string())
    }
}

fn record(count: i64, ttl_ms: i64) -> WindowRecord {
    WindowRecord {
        count: count.max(0) as u64,
        ttl: Duration::from_millis(ttl_ms.max(0) as u64),
    }
}

#[async_trait]
impl CounterStore for RedisCounterStore {
    async fn increment(&self, key: &str, window: Duration) -> Result<WindowRecord, StoreError> {
        let mut conn = self.conn.clone();

        let (count, ttl_ms): (i64, i64) = self
            .increment
            .key(key)
            .arg(window.as_millis() as u64)
            .invoke_async(&mut conn)
            .await
            .map_err(store_error)?;

        Ok(record(count, ttl_ms))
    }

    async fn get(&self, key: &str, window: Duration) -> Result<Option<WindowRecord>, StoreError> {
        let mut conn = self.conn.clone();

        let found: Option<(i64, i64)> = self
            .peek
            .key(key)
            .arg(window.as_millis() as u64)
            .invoke_async(&mut conn)
            .await
            .map_err(store_error)?;

        Ok(found.map(|(count, ttl_ms)| record(count, ttl_ms)))
    }
}
