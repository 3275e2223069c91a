//! SWR API Server Entry Point
//!
//! Bootstraps configuration, connects the shared store, clears the cached
//! user list and starts the Axum HTTP server.

use std::sync::Arc;

use swr_api::{
    create_router, init_tracing, ApiConfig, ApiError, ApiResult, AppState, TelemetryConfig,
    User, UserDirectory, USERS_CACHE_KEY,
};
use swr_storage::{CacheManager, DataSource, InMemoryStore, StoreClient};

#[tokio::main]
async fn main() -> ApiResult<()> {
    init_tracing(&TelemetryConfig::default())?;

    let config = ApiConfig::from_env();
    let store = connect_store(&config).await?;
    let cache = CacheManager::new(store, config.cache.clone())?;

    // Start from an empty entry so the first request goes to the directory.
    if let Err(e) = cache.delete(USERS_CACHE_KEY).await {
        tracing::warn!(key = USERS_CACHE_KEY, error = %e, "Failed to clear cached users at startup");
    }

    let users: Arc<dyn DataSource<Vec<User>>> =
        Arc::new(UserDirectory::new(config.source_latency));
    let app = create_router(AppState::new(cache, users, config.users_ttl));

    let addr = config.bind_addr()?;
    tracing::info!(%addr, "Starting SWR API server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| ApiError::internal_error(format!("Failed to bind {}: {}", addr, e)))?;

    let server = axum::serve(listener, app);
    tokio::select! {
        result = server => {
            result.map_err(|e| ApiError::internal_error(format!("Server error: {}", e)))?;
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Shutdown signal received");
        }
    }

    Ok(())
}

async fn connect_store(config: &ApiConfig) -> ApiResult<Arc<dyn StoreClient>> {
    match &config.redis_url {
        Some(url) => redis_store(url).await,
        None => {
            tracing::warn!(
                "SWR_REDIS_URL not set, using the in-process store; refreshes are only \
                 single-flight within this process"
            );
            Ok(Arc::new(InMemoryStore::new()))
        }
    }
}

#[cfg(feature = "redis")]
async fn redis_store(url: &str) -> ApiResult<Arc<dyn StoreClient>> {
    let store = swr_storage::RedisStore::connect(url)
        .await
        .map_err(swr_core::SwrError::from)?;
    tracing::info!("Connected to Redis");
    Ok(Arc::new(store))
}

#[cfg(not(feature = "redis"))]
async fn redis_store(_url: &str) -> ApiResult<Arc<dyn StoreClient>> {
    Err(ApiError::invalid_input(
        "SWR_REDIS_URL is set but this build has no Redis support",
    ))
}
