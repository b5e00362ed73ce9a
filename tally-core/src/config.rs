//! Configuration types

use crate::constants::*;
use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

/// Sliding-window rate limit settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateLimitConfig {
    /// Maximum approved requests inside one window.
    pub max_requests: usize,
    /// Window length.
    pub window: Duration,
    /// Fraction of the budget at which staggering delays begin.
    pub warning_threshold: f64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_requests: DEFAULT_RATE_LIMIT_MAX_REQUESTS,
            window: Duration::from_millis(DEFAULT_RATE_LIMIT_WINDOW_MS),
            warning_threshold: DEFAULT_RATE_LIMIT_WARNING_THRESHOLD,
        }
    }
}

/// Response cache bounds. TTL and capacity apply independently.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheConfig {
    pub ttl: Duration,
    pub capacity: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(DEFAULT_CACHE_TTL_SECS),
            capacity: DEFAULT_CACHE_CAPACITY,
        }
    }
}

/// Settings for the upstream API gateway.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GatewayConfig {
    pub base_url: String,
    /// Upstream account scoping header value, when the tenant requires one.
    pub account_id: Option<String>,
    pub max_retries: u32,
    pub request_timeout: Duration,
    pub rate_limit: RateLimitConfig,
    pub cache: CacheConfig,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            account_id: None,
            max_retries: DEFAULT_MAX_RETRIES,
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            rate_limit: RateLimitConfig::default(),
            cache: CacheConfig::default(),
        }
    }
}

/// Local cost-rate overrides: a static name -> rate mapping plus a default.
/// Used only as rate-resolution fallbacks when a record carries no rate.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RateOverrides {
    /// Default cost rate applied when no per-name override matches.
    pub default_rate: Option<f64>,
    /// Cost rate per display name.
    #[serde(default)]
    pub rates: BTreeMap<String, f64>,
}

impl RateOverrides {
    /// Parse overrides from TOML text.
    pub fn from_toml_str(text: &str, origin: &str) -> Result<Self, ConfigError> {
        toml::from_str(text).map_err(|e| ConfigError::ParseFailed {
            path: origin.to_string(),
            reason: e.to_string(),
        })
    }

    /// Load overrides from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| ConfigError::FileUnreadable {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        Self::from_toml_str(&text, &path.display().to_string())
    }

    /// Load overrides, degrading to built-in defaults on failure.
    /// A load failure is never fatal: it becomes a warning string.
    pub fn load_or_default(path: impl AsRef<Path>) -> (Self, Vec<String>) {
        match Self::load(path) {
            Ok(overrides) => (overrides, Vec::new()),
            Err(e) => (
                Self::from_env(),
                vec![format!("Rate overrides unavailable, using defaults: {}", e)],
            ),
        }
    }

    /// Overrides built from the environment fallback alone.
    pub fn from_env() -> Self {
        let default_rate = std::env::var(ENV_DEFAULT_COST_RATE)
            .ok()
            .and_then(|v| v.parse::<f64>().ok());
        Self {
            default_rate,
            rates: BTreeMap::new(),
        }
    }

    /// Look up a per-name override.
    pub fn rate_for(&self, name: &str) -> Option<f64> {
        self.rates.get(name).copied()
    }
}

// =============================================================================
// TESTS
// =============================================================================
