//! SWR Test Utilities
//!
//! Shared test infrastructure for the SWR workspace:
//! - Proptest generators for payloads and keys
//! - Fault-injecting store wrapper
//! - Data source fixtures that count, fail, or block on a gate
//! - Polling helper for background work

pub use swr_core::{
    CacheConfig, Clock, CodecError, ManualClock, SourceError, SourceResult, StoreError,
    StoreResult, SwrError, SwrResult, SystemClock, Timestamp,
};
pub use swr_storage::{
    CacheManager, CacheStats, DataSource, InMemoryStore, RevalidationOutcome, SetMode,
    StoreClient,
};

use std::collections::HashSet;
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use proptest::prelude::*;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;

// ============================================================================
// FIXTURE TYPES
// ============================================================================

/// A small serializable record used as a cached payload in tests.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    pub id: u64,
    pub name: String,
    pub tags: Vec<String>,
}

impl Record {
    pub fn new(id: u64, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            tags: Vec::new(),
        }
    }
}

// ============================================================================
// GENERATORS
// ============================================================================

/// Generates arbitrary [`Record`] values.
pub fn arb_record() -> impl Strategy<Value = Record> {
    (
        any::<u64>(),
        ".{0,24}",
        prop::collection::vec("[a-z]{1,8}", 0..4),
    )
        .prop_map(|(id, name, tags)| Record { id, name, tags })
}

/// Generates cache keys made of the characters real callers use.
pub fn arb_cache_key() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9:_-]{0,31}"
}

// ============================================================================
// CLOCK + STORE FIXTURES
// ============================================================================

/// A manual clock and an in-memory store that measures TTLs against it.
pub fn manual_store() -> (Arc<InMemoryStore>, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::starting_now());
    let store = Arc::new(InMemoryStore::with_clock(clock.clone()));
    (store, clock)
}

/// A cache manager over `store`, measuring staleness against `clock`.
pub fn manager_on<S: StoreClient + ?Sized + 'static>(
    store: Arc<S>,
    clock: Arc<ManualClock>,
    config: CacheConfig,
) -> CacheManager<S> {
    CacheManager::with_clock(store, config, clock).expect("test config is valid")
}

/// Store wrapper that can be told to fail or slow down individual
/// operations, and counts lock acquisition attempts.
pub struct FlakyStore<S: StoreClient + ?Sized> {
    inner: Arc<S>,
    fail_gets: AtomicBool,
    fail_writes: AtomicBool,
    fail_acquires: AtomicBool,
    failing_deletes: Mutex<HashSet<String>>,
    latency: Mutex<Duration>,
    acquire_attempts: AtomicUsize,
    acquire_wins: AtomicUsize,
}

impl<S: StoreClient + ?Sized> FlakyStore<S> {
    pub fn new(inner: Arc<S>) -> Self {
        Self {
            inner,
            fail_gets: AtomicBool::new(false),
            fail_writes: AtomicBool::new(false),
            fail_acquires: AtomicBool::new(false),
            failing_deletes: Mutex::new(HashSet::new()),
            latency: Mutex::new(Duration::ZERO),
            acquire_attempts: AtomicUsize::new(0),
            acquire_wins: AtomicUsize::new(0),
        }
    }

    /// Fail `get` calls.
    pub fn fail_gets(&self, fail: bool) {
        self.fail_gets.store(fail, Ordering::SeqCst);
    }

    /// Fail unconditional `set` calls (entry writes).
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Fail set-if-absent calls (lock acquisition).
    pub fn fail_acquires(&self, fail: bool) {
        self.fail_acquires.store(fail, Ordering::SeqCst);
    }

    /// Fail `delete` calls for `key` only; other keys, such as its lock,
    /// still delete normally.
    pub fn fail_deletes_of(&self, key: impl Into<String>) {
        self.failing_deletes
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(key.into());
    }

    /// Let every `delete` through again.
    pub fn clear_delete_failures(&self) {
        self.failing_deletes
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clear();
    }

    /// Delay every call by `latency`.
    pub fn set_latency(&self, latency: Duration) {
        *self.latency.lock().unwrap_or_else(|e| e.into_inner()) = latency;
    }

    /// Number of set-if-absent calls seen.
    pub fn acquire_attempts(&self) -> usize {
        self.acquire_attempts.load(Ordering::SeqCst)
    }

    /// Number of set-if-absent calls that wrote.
    pub fn acquire_wins(&self) -> usize {
        self.acquire_wins.load(Ordering::SeqCst)
    }

    async fn delay(&self) {
        let latency = *self.latency.lock().unwrap_or_else(|e| e.into_inner());
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
    }

    fn injected(operation: &str) -> StoreError {
        StoreError::Unavailable {
            reason: format!("injected {} failure", operation),
        }
    }
}

#[async_trait]
impl<S: StoreClient + ?Sized> StoreClient for FlakyStore<S> {
    async fn get(&self, key: &str) -> StoreResult<Option<Vec<u8>>> {
        self.delay().await;
        if self.fail_gets.load(Ordering::SeqCst) {
            return Err(Self::injected("get"));
        }
        self.inner.get(key).await
    }

    async fn set(
        &self,
        key: &str,
        value: &[u8],
        ttl: Duration,
        mode: SetMode,
    ) -> StoreResult<bool> {
        self.delay().await;
        match mode {
            SetMode::Always => {
                if self.fail_writes.load(Ordering::SeqCst) {
                    return Err(Self::injected("write"));
                }
                self.inner.set(key, value, ttl, mode).await
            }
            SetMode::IfAbsent => {
                self.acquire_attempts.fetch_add(1, Ordering::SeqCst);
                if self.fail_acquires.load(Ordering::SeqCst) {
                    return Err(Self::injected("acquire"));
                }
                let won = self.inner.set(key, value, ttl, mode).await?;
                if won {
                    self.acquire_wins.fetch_add(1, Ordering::SeqCst);
                }
                Ok(won)
            }
        }
    }

    async fn delete(&self, key: &str) -> StoreResult<()> {
        self.delay().await;
        let failing = self
            .failing_deletes
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .contains(key);
        if failing {
            return Err(Self::injected("delete"));
        }
        self.inner.delete(key).await
    }

    fn backend_name(&self) -> &'static str {
        "flaky"
    }
}

// ============================================================================
// DATA SOURCE FIXTURES
// ============================================================================

/// Data source that returns a fixed result and counts calls.
pub struct CountingSource<T> {
    result: Mutex<SourceResult<T>>,
    calls: AtomicUsize,
}

impl<T: Clone + Send + Sync + 'static> CountingSource<T> {
    /// A source that always succeeds with `value`.
    pub fn ok(value: T) -> Arc<Self> {
        Arc::new(Self {
            result: Mutex::new(Ok(value)),
            calls: AtomicUsize::new(0),
        })
    }

    /// A source that always fails.
    pub fn failing(reason: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            result: Mutex::new(Err(SourceError::failed(reason))),
            calls: AtomicUsize::new(0),
        })
    }

    /// Change what subsequent calls return.
    pub fn respond_with(&self, result: SourceResult<T>) {
        *self.result.lock().unwrap_or_else(|e| e.into_inner()) = result;
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl<T: Clone + Send + Sync + 'static> DataSource<T> for CountingSource<T> {
    async fn fetch(&self) -> SourceResult<T> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.result.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

/// Data source that blocks every call until the gate is opened, so tests can
/// hold a refresh in flight while other work races it.
pub struct GatedSource<T> {
    value: T,
    gate: watch::Sender<bool>,
    calls: AtomicUsize,
}

impl<T: Clone + Send + Sync + 'static> GatedSource<T> {
    pub fn new(value: T) -> Arc<Self> {
        let (gate, _) = watch::channel(false);
        Arc::new(Self {
            value,
            gate,
            calls: AtomicUsize::new(0),
        })
    }

    /// Let every pending and future call through.
    pub fn open(&self) {
        self.gate.send_replace(true);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl<T: Clone + Send + Sync + 'static> DataSource<T> for GatedSource<T> {
    async fn fetch(&self) -> SourceResult<T> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let mut rx = self.gate.subscribe();
        let opened = rx.wait_for(|open| *open).await.is_ok();
        if !opened {
            return Err(SourceError::failed("gate dropped"));
        }
        Ok(self.value.clone())
    }
}

// ============================================================================
// POLLING
// ============================================================================

/// Poll `check` until it returns true or `timeout` passes. Returns whether
/// the condition was met.
pub async fn eventually<F, Fut>(timeout: Duration, mut check: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if check().await {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}
