//! HTTP routes.

pub mod health;
pub mod users;

use axum::{routing::get, Router};
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// Build the service router.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/users", get(users::list_users))
        .nest("/health", health::create_router())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
