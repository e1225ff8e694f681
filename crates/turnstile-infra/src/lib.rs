//! # Turnstile Infrastructure
//!
//! Concrete implementations of the ports defined in `turnstile-core`.
//!
//! ## Feature Flags
//!
//! - `full` (default) - All features enabled
//! - `minimal` - No external services, in-memory counter store only
//! - `redis` - Redis counter store shared across API instances
//! - `auth` - JWT bearer token validation for per-user keys

pub mod counter_store;

#[cfg(feature = "auth")]
pub mod auth;

// Re-exports - In-Memory
pub use counter_store::InMemoryCounterStore;

#[cfg(feature = "auth")]
pub use auth::{JwtConfig, JwtTokenService};

// Re-exports - Redis
#[cfg(feature = "redis")]
pub use counter_store::{RedisConfig, RedisCounterStore};
