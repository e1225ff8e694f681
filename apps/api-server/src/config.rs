//! Application configuration loaded from environment variables.

use std::collections::HashMap;
use std::env;
use std::str::FromStr;
use std::time::Duration;

use turnstile_core::AdmissionConfig;
use turnstile_core::domain::{PolicyRegistry, Tier, UnknownTierMode};
use turnstile_core::error::PolicyError;
use turnstile_infra::JwtConfig;
#[cfg(feature = "redis")]
use turnstile_infra::RedisConfig;

const TIER_OVERRIDE_PREFIX: &str = "RATE_LIMIT_TIER_";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {key}: {reason}")]
    Invalid { key: String, reason: String },

    #[error(transparent)]
    Policy(#[from] PolicyError),
}

impl ConfigError {
    fn invalid(key: &str, reason: &str) -> Self {
        ConfigError::Invalid {
            key: key.to_string(),
            reason: reason.to_string(),
        }
    }
}

/// Environment variables as read at startup.
struct Vars(HashMap<String, String>);

impl Vars {
    fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    fn string(&self, key: &str, default: &str) -> String {
        self.get(key).unwrap_or(default).to_string()
    }

    fn number<T: FromStr>(&self, key: &str, default: T) -> Result<T, ConfigError> {
        match self.get(key) {
            Some(value) => value
                .trim()
                .parse()
                .map_err(|_| ConfigError::invalid(key, "not a number")),
            None => Ok(default),
        }
    }

    /// `true`/`1`/`yes`/`on` or `false`/`0`/`no`/`off`, case-insensitive.
    fn flag(&self, key: &str, default: bool) -> Result<bool, ConfigError> {
        let Some(value) = self.get(key) else {
            return Ok(default);
        };
        match value.trim().to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" | "on" => Ok(true),
            "false" | "0" | "no" | "off" => Ok(false),
            _ => Err(ConfigError::invalid(key, "expected true or false")),
        }
    }
}

/// Deployment environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Development,
    Production,
}

impl Environment {
    fn from_vars(vars: &Vars) -> Self {
        match vars.get("APP_ENV").or_else(|| vars.get("RUST_ENV")) {
            Some("production" | "prod") => Environment::Production,
            _ => Environment::Development,
        }
    }

    pub fn is_production(self) -> bool {
        self == Environment::Production
    }

    /// Unknown tier names fail requests in development and degrade to the
    /// strictest tier in production.
    pub fn unknown_tier_mode(self) -> UnknownTierMode {
        match self {
            Environment::Development => UnknownTierMode::Reject,
            Environment::Production => UnknownTierMode::MostConservative,
        }
    }
}

/// A `RATE_LIMIT_TIER_<TIER>=<quota>,<window_secs>` override.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TierOverride {
    pub tier: Tier,
    pub quota: u32,
    pub window: Duration,
}

/// Application configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub environment: Environment,
    /// `None` when `REDIS_URL` is unset: counters stay in process memory.
    #[cfg(feature = "redis")]
    pub redis: Option<RedisConfig>,
    pub admission: AdmissionConfig,
    pub tier_overrides: Vec<TierOverride>,
    pub jwt: JwtConfig,
}

impl AppConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(&Vars(env::vars().collect()))
    }

    fn from_vars(vars: &Vars) -> Result<Self, ConfigError> {
        let environment = Environment::from_vars(vars);

        let timeout_ms: u64 = vars.number("RATE_LIMIT_STORE_TIMEOUT_MS", 100)?;
        if timeout_ms == 0 {
            return Err(ConfigError::invalid(
                "RATE_LIMIT_STORE_TIMEOUT_MS",
                "must be at least 1",
            ));
        }

        let admission = AdmissionConfig {
            key_prefix: vars.string("RATE_LIMIT_KEY_PREFIX", "ratelimit"),
            store_timeout: Duration::from_millis(timeout_ms),
            fail_open: vars.flag("RATE_LIMIT_FAIL_OPEN", true)?,
            unknown_tier: environment.unknown_tier_mode(),
        };

        if !admission.fail_open {
            tracing::warn!(
                "RATE_LIMIT_FAIL_OPEN=false: requests will be denied while the counter store is down"
            );
        }

        Ok(Self {
            host: vars.string("HOST", "127.0.0.1"),
            port: vars.number("PORT", 8080)?,
            environment,
            #[cfg(feature = "redis")]
            redis: redis_config(vars)?,
            admission,
            tier_overrides: parse_tier_overrides(&vars.0)?,
            jwt: JwtConfig::from_env(environment.is_production()),
        })
    }

    /// The policy table: defaults with the configured overrides applied.
    pub fn policy_registry(&self) -> Result<PolicyRegistry, PolicyError> {
        self.tier_overrides
            .iter()
            .fold(PolicyRegistry::builder(), |builder, o| {
                builder.with_policy(o.tier, o.quota, o.window)
            })
            .build()
    }
}

#[cfg(feature = "redis")]
fn redis_config(vars: &Vars) -> Result<Option<RedisConfig>, ConfigError> {
    let Some(url) = vars.get("REDIS_URL") else {
        return Ok(None);
    };
    let defaults = RedisConfig::default();

    Ok(Some(RedisConfig {
        url: url.to_string(),
        connect_timeout: Duration::from_secs(vars.number(
            "REDIS_CONNECT_TIMEOUT_SECS",
            defaults.connect_timeout.as_secs(),
        )?),
        fallback_to_memory: vars.flag("REDIS_FALLBACK_TO_MEMORY", defaults.fallback_to_memory)?,
    }))
}

/// Parse tier overrides from environment variables.
/// Format: RATE_LIMIT_TIER_<TIER>=<QUOTA>,<WINDOW_SECS>
/// Example: RATE_LIMIT_TIER_USER_ACTION=20,60
fn parse_tier_overrides(vars: &HashMap<String, String>) -> Result<Vec<TierOverride>, ConfigError> {
    let mut overrides = Vec::new();

    for (key, value) in vars {
        let Some(name) = key.strip_prefix(TIER_OVERRIDE_PREFIX) else {
            continue;
        };
        let tier = name.parse::<Tier>()?;

        let (quota, window) = value
            .split_once(',')
            .ok_or_else(|| ConfigError::invalid(key, "expected <quota>,<window_secs>"))?;
        let quota = quota
            .trim()
            .parse()
            .map_err(|_| ConfigError::invalid(key, "quota is not a number"))?;
        let window_secs: u64 = window
            .trim()
            .parse()
            .map_err(|_| ConfigError::invalid(key, "window is not a number of seconds"))?;

        overrides.push(TierOverride {
            tier,
            quota,
            window: Duration::from_secs(window_secs),
        });
    }

    overrides.sort_by_key(|o| o.tier.as_str());
    Ok(overrides)
}
