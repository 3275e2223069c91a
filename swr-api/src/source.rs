//! User directory: the slow data source the service caches.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{Timelike, Utc};
use serde::{Deserialize, Serialize};
use swr_core::SourceResult;
use swr_storage::DataSource;

/// A user as served by `GET /users`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub name: String,
    #[serde(rename = "createdAt")]
    pub created_at: i64,
}

/// Stand-in for a slow database query.
///
/// `created_at` is the current second of the minute, so a refreshed list is
/// visibly different from the one it replaces.
#[derive(Debug, Clone)]
pub struct UserDirectory {
    latency: Duration,
}

impl UserDirectory {
    pub fn new(latency: Duration) -> Self {
        Self { latency }
    }

    pub fn latency(&self) -> Duration {
        self.latency
    }
}

#[async_trait]
impl DataSource<Vec<User>> for UserDirectory {
    async fn fetch(&self) -> SourceResult<Vec<User>> {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        tracing::debug!(latency = ?self.latency, "Loaded users from directory");
        Ok(vec![User {
            name: "Leo".to_string(),
            created_at: i64::from(Utc::now().second()),
        }])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_wire_format() {
        let user = User {
            name: "Leo".to_string(),
            created_at: 42,
        };
        let json = serde_json::to_value(&user).unwrap();
        assert_eq!(json, serde_json::json!({"name": "Leo", "createdAt": 42}));
    }

    #[tokio::test(start_paused = true)]
    async fn test_directory_waits_for_latency() {
        let directory = UserDirectory::new(Duration::from_secs(1));
        let started = tokio::time::Instant::now();
        let users = directory.fetch().await.unwrap();
        assert!(started.elapsed() >= Duration::from_secs(1));
        assert_eq!(users.len(), 1);
        assert_eq!(users[0].name, "Leo");
        assert!((0..60).contains(&users[0].created_at));
    }
}
