//! Cache manager configuration

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{ConfigError, SwrError, SwrResult};

/// Default lock key prefix. A lock for cache key `users` lives at
/// `revalidate-users`.
pub const DEFAULT_LOCK_KEY_PREFIX: &str = "revalidate-";

/// Configuration for one cache manager instance.
///
/// Passed explicitly at construction so that several independently
/// configured managers can share a process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheConfig {
    /// How long after a write an entry stays fresh.
    pub revalidate_interval: Duration,
    /// Lifetime of a revalidation lock. Bounds how long a crashed or hung
    /// refresh can block other refreshes of the same key.
    pub max_revalidation_window: Duration,
    /// Prefix prepended to a cache key to form its lock key.
    pub lock_key_prefix: String,
    /// Upper bound on any single store call.
    pub store_timeout: Duration,
    /// Upper bound on a data source call during revalidation.
    /// `None` means the window minus three store timeouts, which leaves room
    /// for the write or evict and the release before the lease expires.
    pub refresh_timeout: Option<Duration>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            revalidate_interval: Duration::from_secs(2),
            max_revalidation_window: Duration::from_secs(60),
            lock_key_prefix: DEFAULT_LOCK_KEY_PREFIX.to_string(),
            store_timeout: Duration::from_secs(2),
            refresh_timeout: None,
        }
    }
}

impl CacheConfig {
    /// Create a new cache config with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the revalidation interval.
    pub fn with_revalidate_interval(mut self, interval: Duration) -> Self {
        self.revalidate_interval = interval;
        self
    }

    /// Set the maximum revalidation window (lock TTL).
    pub fn with_max_revalidation_window(mut self, window: Duration) -> Self {
        self.max_revalidation_window = window;
        self
    }

    /// Set the lock key prefix.
    pub fn with_lock_key_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.lock_key_prefix = prefix.into();
        self
    }

    /// Set the per-call store timeout.
    pub fn with_store_timeout(mut self, timeout: Duration) -> Self {
        self.store_timeout = timeout;
        self
    }

    /// Set the data source timeout used during revalidation.
    pub fn with_refresh_timeout(mut self, timeout: Duration) -> Self {
        self.refresh_timeout = Some(timeout);
        self
    }

    /// Effective data source timeout.
    pub fn effective_refresh_timeout(&self) -> Duration {
        self.refresh_timeout.unwrap_or_else(|| {
            self.max_revalidation_window
                .saturating_sub(self.store_timeout.saturating_mul(3))
        })
    }

    /// Longest a lease holder can take from acquiring to releasing: the
    /// source call, then one write or evict, then the release.
    pub fn revalidation_budget(&self) -> Option<Duration> {
        self.store_timeout
            .checked_mul(2)?
            .checked_add(self.effective_refresh_timeout())
    }

    /// Validate the configuration.
    ///
    /// Validates:
    /// - all durations are positive
    /// - the lock key prefix is not empty
    /// - a refresh finishes and releases strictly before its lease expires
    pub fn validate(&self) -> SwrResult<()> {
        let mut positive = vec![
            ("revalidate_interval", self.revalidate_interval),
            ("max_revalidation_window", self.max_revalidation_window),
            ("store_timeout", self.store_timeout),
        ];
        if let Some(timeout) = self.refresh_timeout {
            positive.push(("refresh_timeout", timeout));
        }
        for (field, value) in positive {
            if value.is_zero() {
                return Err(SwrError::Config(ConfigError::InvalidValue {
                    field: field.to_string(),
                    value: format!("{:?}", value),
                    reason: format!("{} must be positive", field),
                }));
            }
        }

        // An empty prefix would make the lock key collide with the entry key.
        if self.lock_key_prefix.is_empty() {
            return Err(SwrError::Config(ConfigError::InvalidValue {
                field: "lock_key_prefix".to_string(),
                value: String::new(),
                reason: "lock_key_prefix must not be empty".to_string(),
            }));
        }

        // A release that lands after expiry would delete the next holder's lease.
        let fits = !self.effective_refresh_timeout().is_zero()
            && self
                .revalidation_budget()
                .is_some_and(|budget| budget < self.max_revalidation_window);
        if !fits {
            return Err(SwrError::Config(ConfigError::IncompatibleOptions {
                option_a: format!(
                    "refresh_timeout={:?} + 2 * store_timeout={:?}",
                    self.effective_refresh_timeout(),
                    self.store_timeout
                ),
                option_b: format!(
                    "max_revalidation_window={:?}",
                    self.max_revalidation_window
                ),
            }));
        }

        Ok(())
    }

    /// Create from environment variables with fallback to defaults.
    ///
    /// Environment variables:
    /// - `SWR_REVALIDATE_INTERVAL_MS` (default: 2000)
    /// - `SWR_MAX_REVALIDATION_WINDOW_MS` (default: 60000)
    /// - `SWR_LOCK_KEY_PREFIX` (default: `revalidate-`)
    /// - `SWR_STORE_TIMEOUT_MS` (default: 2000)
    /// - `SWR_REFRESH_TIMEOUT_MS` (default: unset, window minus three store timeouts)
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            revalidate_interval: env_millis("SWR_REVALIDATE_INTERVAL_MS")
                .unwrap_or(defaults.revalidate_interval),
            max_revalidation_window: env_millis("SWR_MAX_REVALIDATION_WINDOW_MS")
                .unwrap_or(defaults.max_revalidation_window),
            lock_key_prefix: std::env::var("SWR_LOCK_KEY_PREFIX")
                .ok()
                .filter(|s| !s.is_empty())
                .unwrap_or(defaults.lock_key_prefix),
            store_timeout: env_millis("SWR_STORE_TIMEOUT_MS").unwrap_or(defaults.store_timeout),
            refresh_timeout: env_millis("SWR_REFRESH_TIMEOUT_MS").or(defaults.refresh_timeout),
        }
    }
}

fn env_millis(key: &str) -> Option<Duration> {
    std::env::var(key)
        .ok()
        .and_then(|s| s.trim().parse::<u64>().ok())
        .map(Duration::from_millis)
}

// =============================================================================
// TESTS
// =============================================================================
