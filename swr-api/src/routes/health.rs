//! Health Check Endpoints
//!
//! - /health/ping - Simple liveness check
//! - /health/ready - Store connectivity check plus cache counters

use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::get, Json, Router};
use serde::{Deserialize, Serialize};
use swr_storage::{CacheStats, StoreClient};

use crate::state::{ApiCache, AppState};

// ============================================================================
// TYPES
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: HealthStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<HealthDetails>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Unhealthy,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthDetails {
    pub store: ComponentHealth,
    pub cache: CacheStats,
    pub version: String,
    pub uptime_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentHealth {
    pub status: HealthStatus,
    pub backend: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

// ============================================================================
// HANDLERS
// ============================================================================

/// GET /health/ping
pub async fn ping() -> impl IntoResponse {
    Json(HealthResponse {
        status: HealthStatus::Healthy,
        details: None,
    })
}

/// GET /health/ready
///
/// The service keeps answering `/users` with the store down, so an
/// unreachable store is reported here rather than failing requests.
pub async fn readiness(State(state): State<AppState>) -> impl IntoResponse {
    let store = check_store(&state.cache).await;
    let status = store.status;

    let response = HealthResponse {
        status,
        details: Some(HealthDetails {
            store,
            cache: state.cache.stats(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            uptime_seconds: state.start_time.elapsed().as_secs(),
        }),
    };

    let status_code = if status == HealthStatus::Healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status_code, Json(response))
}

async fn check_store(cache: &ApiCache) -> ComponentHealth {
    let start = std::time::Instant::now();
    let store = cache.store();
    let timeout = cache.config().store_timeout;
    let probe_key = format!("{}health-probe", cache.config().lock_key_prefix);

    let error = match tokio::time::timeout(timeout, store.get(&probe_key)).await {
        Ok(Ok(_)) => None,
        Ok(Err(e)) => Some(e.to_string()),
        Err(_) => Some(format!("Store probe timed out after {:?}", timeout)),
    };

    ComponentHealth {
        status: if error.is_none() {
            HealthStatus::Healthy
        } else {
            HealthStatus::Unhealthy
        },
        backend: store.backend_name().to_string(),
        latency_ms: error.is_none().then(|| start.elapsed().as_millis() as u64),
        error,
    }
}

// ============================================================================
// ROUTER
// ============================================================================

pub fn create_router() -> Router<AppState> {
    Router::new()
        .route("/ping", get(ping))
        .route("/ready", get(readiness))
}
