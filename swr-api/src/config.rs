//! API Configuration Module
//!
//! Server, store and data source settings for the HTTP service, loaded from
//! environment variables with defaults suitable for local development. Cache
//! behavior itself is configured through [`CacheConfig`].

use std::net::SocketAddr;
use std::time::Duration;

use swr_core::CacheConfig;

use crate::error::{ApiError, ApiResult};

/// Cache key the user directory is stored under.
pub const USERS_CACHE_KEY: &str = "users";

// ============================================================================
// API CONFIGURATION
// ============================================================================

#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Interface to bind.
    pub bind_host: String,

    /// Port to bind, kept as text so a bad value is reported at startup.
    pub port: String,

    /// Redis URL for the shared store. `None` runs on the in-process store,
    /// which only coordinates within this one process.
    pub redis_url: Option<String>,

    /// Hard expiry of the cached user list.
    pub users_ttl: Duration,

    /// Simulated latency of the user directory.
    pub source_latency: Duration,

    /// Stale-while-revalidate cache settings.
    pub cache: CacheConfig,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            bind_host: "0.0.0.0".to_string(),
            port: "8080".to_string(),
            redis_url: None,
            users_ttl: Duration::from_secs(300),
            source_latency: Duration::from_secs(1),
            cache: CacheConfig::default(),
        }
    }
}

impl ApiConfig {
    /// Create ApiConfig from environment variables.
    ///
    /// Environment variables:
    /// - `SWR_API_BIND`: Interface to bind (default: 0.0.0.0)
    /// - `PORT` or `SWR_API_PORT`: Port to bind (default: 8080)
    /// - `SWR_REDIS_URL`: Redis URL, e.g. `redis://localhost:6379` (default: unset)
    /// - `SWR_USERS_TTL_SECS`: Hard expiry of the cached user list (default: 300)
    /// - `SWR_SOURCE_LATENCY_MS`: Simulated directory latency (default: 1000)
    ///
    /// Cache settings are read by [`CacheConfig::from_env`].
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let bind_host = std::env::var("SWR_API_BIND").unwrap_or(defaults.bind_host);

        let port = std::env::var("PORT")
            .ok()
            .or_else(|| std::env::var("SWR_API_PORT").ok())
            .unwrap_or(defaults.port);

        let redis_url = std::env::var("SWR_REDIS_URL")
            .ok()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());

        let users_ttl = std::env::var("SWR_USERS_TTL_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .map(Duration::from_secs)
            .unwrap_or(defaults.users_ttl);

        let source_latency = std::env::var("SWR_SOURCE_LATENCY_MS")
            .ok()
            .and_then(|s| s.parse().ok())
            .map(Duration::from_millis)
            .unwrap_or(defaults.source_latency);

        Self {
            bind_host,
            port,
            redis_url,
            users_ttl,
            source_latency,
            cache: CacheConfig::from_env(),
        }
    }

    /// Resolve the socket address to listen on.
    pub fn bind_addr(&self) -> ApiResult<SocketAddr> {
        let port = self
            .port
            .parse::<u16>()
            .map_err(|_| ApiError::invalid_input(format!("Invalid port value: {}", self.port)))?;

        let addr = format!("{}:{}", self.bind_host, port);
        addr.parse::<SocketAddr>()
            .map_err(|e| ApiError::invalid_input(format!("Invalid bind address {}: {}", addr, e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ApiConfig::default();
        assert_eq!(config.users_ttl, Duration::from_secs(300));
        assert_eq!(config.source_latency, Duration::from_secs(1));
        assert!(config.redis_url.is_none());
        assert!(config.cache.validate().is_ok());
    }

    #[test]
    fn test_bind_addr() {
        let config = ApiConfig {
            bind_host: "127.0.0.1".to_string(),
            port: "9000".to_string(),
            ..Default::default()
        };
        assert_eq!(
            config.bind_addr().unwrap(),
            "127.0.0.1:9000".parse::<SocketAddr>().unwrap()
        );
    }

    #[test]
    fn test_bad_port_rejected() {
        let config = ApiConfig {
            port: "eighty".to_string(),
            ..Default::default()
        };
        let err = config.bind_addr().unwrap_err();
        assert!(err.message.contains("eighty"));
    }
}
