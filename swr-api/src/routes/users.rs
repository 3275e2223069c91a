//! `GET /users`: the user list, served through the cache.
//!
//! A hit is returned as-is, stale or not; a stale hit also schedules a
//! background refresh. A miss loads the list from the directory and writes
//! it back on a best-effort basis.

use axum::{extract::State, Json};
use swr_storage::DataSource;

use crate::config::USERS_CACHE_KEY;
use crate::error::ApiResult;
use crate::source::User;
use crate::state::AppState;

pub async fn list_users(State(state): State<AppState>) -> ApiResult<Json<Vec<User>>> {
    if let Some(users) = state
        .cache
        .get::<Vec<User>>(USERS_CACHE_KEY, state.users_ttl, Some(state.users.clone()))
        .await
    {
        tracing::debug!(count = users.len(), "Serving users from cache");
        return Ok(Json(users));
    }

    tracing::debug!("Loading users from directory");
    let users = state.users.fetch().await?;

    if let Err(e) = state
        .cache
        .set(USERS_CACHE_KEY, &users, state.users_ttl)
        .await
    {
        tracing::warn!(error = %e, "Failed to cache users");
    }

    Ok(Json(users))
}
