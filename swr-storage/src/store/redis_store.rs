//! Redis-backed store.
//!
//! Maps the store contract onto three commands:
//!
//! | Operation              | Command                        |
//! |------------------------|--------------------------------|
//! | `get`                  | `GET key`                      |
//! | `set(.., Always)`      | `SET key value [PX ms]`        |
//! | `set(.., IfAbsent)`    | `SET key value [PX ms] NX`     |
//! | `delete`               | `DEL key`                      |
//!
//! `SET .. NX` is a single atomic command, which is what makes the
//! revalidation lock safe across processes. A nil reply means the key was
//! already present.

use std::time::Duration;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, RedisError};
use swr_core::{StoreError, StoreResult};

use super::{SetMode, StoreClient};

/// [`StoreClient`] over a multiplexed, auto-reconnecting Redis connection.
#[derive(Clone)]
pub struct RedisStore {
    conn: ConnectionManager,
}

impl std::fmt::Debug for RedisStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisStore").finish_non_exhaustive()
    }
}

impl RedisStore {
    /// Connect to `url` (e.g. `redis://localhost:6379`).
    pub async fn connect(url: &str) -> StoreResult<Self> {
        let client = redis::Client::open(url).map_err(map_redis_error)?;
        let conn = ConnectionManager::new(client)
            .await
            .map_err(map_redis_error)?;
        tracing::debug!("Redis connection manager ready");
        Ok(Self { conn })
    }

    /// Wrap an existing connection manager.
    pub fn from_connection(conn: ConnectionManager) -> Self {
        Self { conn }
    }
}

/// Largest expiry Redis accepts for `PX`.
const MAX_PX_MILLIS: u64 = i64::MAX as u64;

/// Build the `SET` command for a write.
fn set_command(key: &str, value: &[u8], ttl: Duration, mode: SetMode) -> redis::Cmd {
    let mut cmd = redis::cmd("SET");
    cmd.arg(key).arg(value);
    if !ttl.is_zero() {
        // Sub-millisecond TTLs round up rather than becoming "no expiry".
        let millis = u64::try_from(ttl.as_millis().max(1))
            .unwrap_or(MAX_PX_MILLIS)
            .min(MAX_PX_MILLIS);
        cmd.arg("PX").arg(millis);
    }
    if mode == SetMode::IfAbsent {
        cmd.arg("NX");
    }
    cmd
}

fn map_redis_error(e: RedisError) -> StoreError {
    if e.is_io_error() || e.is_connection_dropped() || e.is_connection_refusal() || e.is_timeout()
    {
        StoreError::Unavailable {
            reason: e.to_string(),
        }
    } else {
        StoreError::Backend {
            reason: e.to_string(),
        }
    }
}

#[async_trait]
impl StoreClient for RedisStore {
    async fn get(&self, key: &str) -> StoreResult<Option<Vec<u8>>> {
        let mut conn = self.conn.clone();
        let value: Option<Vec<u8>> = conn.get(key).await.map_err(map_redis_error)?;
        Ok(value)
    }

    async fn set(
        &self,
        key: &str,
        value: &[u8],
        ttl: Duration,
        mode: SetMode,
    ) -> StoreResult<bool> {
        let mut conn = self.conn.clone();
        let reply: Option<String> = set_command(key, value, ttl, mode)
            .query_async(&mut conn)
            .await
            .map_err(map_redis_error)?;
        Ok(reply.is_some())
    }

    async fn delete(&self, key: &str) -> StoreResult<()> {
        let mut conn = self.conn.clone();
        let _removed: i64 = conn.del(key).await.map_err(map_redis_error)?;
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "redis"
    }
}
