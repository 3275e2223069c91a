//! Process-local store implementation.
//!
//! Implements the full [`StoreClient`] contract in memory: per-key TTLs
//! evaluated against an injectable [`Clock`], atomic set-if-absent, and a
//! switch that makes every call fail as if the backend were unreachable.
//! Several cache managers can share one `Arc<InMemoryStore>` to stand in for
//! several processes sharing a real store.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use swr_core::{add_duration, Clock, StoreError, StoreResult, SystemClock, Timestamp};

use super::{SetMode, StoreClient};

#[derive(Debug, Clone)]
struct StoredValue {
    bytes: Vec<u8>,
    expires_at: Option<Timestamp>,
}

impl StoredValue {
    fn is_live(&self, now: Timestamp) -> bool {
        self.expires_at.map_or(true, |at| now < at)
    }
}

/// In-memory [`StoreClient`].
#[derive(Debug)]
pub struct InMemoryStore {
    entries: RwLock<HashMap<String, StoredValue>>,
    clock: Arc<dyn Clock>,
    reachable: AtomicBool,
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }
}

impl InMemoryStore {
    /// Create a new store on the system clock.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store whose TTLs are measured against `clock`.
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            clock,
            reachable: AtomicBool::new(true),
        }
    }

    /// Make every subsequent call succeed (`true`) or fail with
    /// [`StoreError::Unavailable`] (`false`).
    pub fn set_reachable(&self, reachable: bool) {
        self.reachable.store(reachable, Ordering::SeqCst);
    }

    /// Number of live keys.
    pub fn len(&self) -> usize {
        let now = self.clock.now();
        self.entries
            .read()
            .map(|entries| entries.values().filter(|v| v.is_live(now)).count())
            .unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Remaining lifetime of a key, `None` if absent or without expiry.
    pub fn ttl_remaining(&self, key: &str) -> Option<Duration> {
        let now = self.clock.now();
        let entries = self.entries.read().ok()?;
        let value = entries.get(key).filter(|v| v.is_live(now))?;
        value.expires_at.and_then(|at| (at - now).to_std().ok())
    }

    fn check_reachable(&self) -> StoreResult<()> {
        if self.reachable.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(StoreError::Unavailable {
                reason: "in-memory store marked unreachable".to_string(),
            })
        }
    }

    fn expiry_for(&self, now: Timestamp, ttl: Duration) -> Option<Timestamp> {
        if ttl.is_zero() {
            None
        } else {
            Some(add_duration(now, ttl))
        }
    }
}

#[async_trait]
impl StoreClient for InMemoryStore {
    async fn get(&self, key: &str) -> StoreResult<Option<Vec<u8>>> {
        self.check_reachable()?;
        let now = self.clock.now();
        let entries = self.entries.read().map_err(|_| StoreError::LockPoisoned)?;
        Ok(entries
            .get(key)
            .filter(|v| v.is_live(now))
            .map(|v| v.bytes.clone()))
    }

    async fn set(
        &self,
        key: &str,
        value: &[u8],
        ttl: Duration,
        mode: SetMode,
    ) -> StoreResult<bool> {
        self.check_reachable()?;
        let now = self.clock.now();
        // One write guard covers both the presence check and the insert.
        let mut entries = self.entries.write().map_err(|_| StoreError::LockPoisoned)?;
        entries.retain(|_, v| v.is_live(now));

        if mode == SetMode::IfAbsent && entries.contains_key(key) {
            return Ok(false);
        }

        entries.insert(
            key.to_string(),
            StoredValue {
                bytes: value.to_vec(),
                expires_at: self.expiry_for(now, ttl),
            },
        );
        Ok(true)
    }

    async fn delete(&self, key: &str) -> StoreResult<()> {
        self.check_reachable()?;
        self.entries
            .write()
            .map_err(|_| StoreError::LockPoisoned)?
            .remove(key);
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}
