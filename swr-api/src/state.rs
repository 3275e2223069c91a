//! Shared application state for Axum routers.

use std::sync::Arc;
use std::time::Duration;

use swr_storage::{CacheManager, DataSource, StoreClient};

use crate::source::User;

/// Cache manager over whichever store the service was started with.
pub type ApiCache = CacheManager<dyn StoreClient>;

/// Application-wide state shared across all routes.
#[derive(Clone)]
pub struct AppState {
    pub cache: ApiCache,
    /// Source of truth for `GET /users`, also used to revalidate the entry.
    pub users: Arc<dyn DataSource<Vec<User>>>,
    pub users_ttl: Duration,
    pub start_time: std::time::Instant,
}

impl AppState {
    pub fn new(
        cache: ApiCache,
        users: Arc<dyn DataSource<Vec<User>>>,
        users_ttl: Duration,
    ) -> Self {
        Self {
            cache,
            users,
            users_ttl,
            start_time: std::time::Instant::now(),
        }
    }
}
