//! Application state - shared across all handlers.

use std::sync::Arc;
use std::time::Duration;

use turnstile_core::AdmissionGate;
use turnstile_core::domain::RouteTiers;
use turnstile_core::ports::{CounterStore, TokenService};
use turnstile_infra::{InMemoryCounterStore, JwtTokenService};

#[cfg(feature = "redis")]
use turnstile_infra::{RedisConfig, RedisCounterStore};

use crate::config::AppConfig;
use crate::handlers;

const PURGE_INTERVAL: Duration = Duration::from_secs(60);

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub gate: Arc<AdmissionGate>,
    pub routes: Arc<RouteTiers>,
    pub tokens: Arc<dyn TokenService>,
}

impl AppState {
    /// Build the application state with appropriate implementations.
    pub async fn new(config: &AppConfig) -> anyhow::Result<Self> {
        let registry = Arc::new(config.policy_registry()?);
        for policy in registry.iter() {
            tracing::info!(
                tier = %policy.tier,
                quota = policy.quota,
                window_secs = policy.window.as_secs(),
                "Rate limit policy"
            );
        }

        let routes = handlers::route_tiers();
        if let Err(e) = routes.validate(&registry) {
            if config.environment.is_production() {
                tracing::error!(error = %e, "Route table references an unknown tier");
            } else {
                return Err(e.into());
            }
        }

        let store = build_store(config).await?;
        let gate = AdmissionGate::new(store, registry, config.admission.clone());

        tracing::info!(gate = ?gate, "Application state initialized");

        Ok(Self {
            gate: Arc::new(gate),
            routes: Arc::new(routes),
            tokens: Arc::new(JwtTokenService::new(config.jwt.clone())),
        })
    }
}

#[cfg(feature = "redis")]
async fn build_store(config: &AppConfig) -> anyhow::Result<Arc<dyn CounterStore>> {
    let Some(redis) = &config.redis else {
        tracing::warn!("REDIS_URL not set. Counters are per-process (in-memory mode).");
        return Ok(memory_store());
    };

    connect_redis(redis).await
}

#[cfg(feature = "redis")]
async fn connect_redis(config: &RedisConfig) -> anyhow::Result<Arc<dyn CounterStore>> {
    match RedisCounterStore::new(config).await {
        Ok(store) => Ok(Arc::new(store)),
        Err(e) if config.fallback_to_memory => {
            tracing::error!(
                "Failed to connect to Redis: {}. Using in-memory fallback.",
                e
            );
            Ok(memory_store())
        }
        Err(e) => Err(e.into()),
    }
}

#[cfg(not(feature = "redis"))]
async fn build_store(_config: &AppConfig) -> anyhow::Result<Arc<dyn CounterStore>> {
    tracing::info!("Running without redis feature - using in-memory counter store");
    Ok(memory_store())
}

/// In-memory store plus a background task that drops expired windows.
fn memory_store() -> Arc<dyn CounterStore> {
    let store = Arc::new(InMemoryCounterStore::new());

    let purged = store.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(PURGE_INTERVAL);
        loop {
            interval.tick().await;
            let removed = purged.purge_expired().await;
            if removed > 0 {
                tracing::debug!(removed, "Purged expired rate limit windows");
            }
        }
    });

    store
}
