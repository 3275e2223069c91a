//! Stale-while-revalidate cache manager.
//!
//! Reads never wait on a refresh. A read that finds a stale entry returns it
//! immediately and, if the caller supplied a data source, spawns a detached
//! task that refreshes the entry under a cross-process lease. Store and
//! decode failures on the read path degrade to a miss.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde::{de::DeserializeOwned, Serialize};
use swr_core::{
    add_duration, CacheConfig, Clock, Envelope, SourceError, StoreError, StoreResult, SwrResult,
    SystemClock,
};
use tracing::Instrument;
use uuid::Uuid;

use super::freshness::CacheRead;
use super::revalidation::{RevalidationCoordinator, RevalidationOutcome};
use super::source::DataSource;
use super::stats::{CacheStats, StatsRecorder};
use crate::store::{SetMode, StoreClient};

/// Stale-while-revalidate cache over a shared store.
///
/// Cheap to clone; clones share the store, configuration and counters.
///
/// # Example
///
/// ```ignore
/// let cache = CacheManager::new(store, CacheConfig::default())?;
///
/// let source: Arc<dyn DataSource<Vec<User>>> = Arc::new(|| async { load_users().await });
/// match cache.get::<Vec<User>>("users", Duration::from_secs(300), Some(source.clone())).await {
///     Some(users) => users,
///     None => {
///         let users = source.fetch().await?;
///         let _ = cache.set("users", &users, Duration::from_secs(300)).await;
///         users
///     }
/// }
/// ```
pub struct CacheManager<S: StoreClient + ?Sized + 'static> {
    store: Arc<S>,
    coordinator: Arc<RevalidationCoordinator<S>>,
    config: CacheConfig,
    clock: Arc<dyn Clock>,
    stats: Arc<StatsRecorder>,
    instance_id: Uuid,
}

impl<S: StoreClient + ?Sized + 'static> CacheManager<S> {
    /// Create a cache manager on the system clock.
    pub fn new(store: Arc<S>, config: CacheConfig) -> SwrResult<Self> {
        Self::with_clock(store, config, Arc::new(SystemClock))
    }

    /// Create a cache manager measuring staleness against `clock`.
    pub fn with_clock(store: Arc<S>, config: CacheConfig, clock: Arc<dyn Clock>) -> SwrResult<Self> {
        config.validate()?;
        let instance_id = Uuid::now_v7();
        let coordinator = RevalidationCoordinator::new(
            Arc::clone(&store),
            Arc::clone(&clock),
            config.lock_key_prefix.clone(),
            config.max_revalidation_window,
            config.store_timeout,
            instance_id,
        );

        tracing::debug!(
            instance_id = %instance_id,
            backend = store.backend_name(),
            revalidate_interval = ?config.revalidate_interval,
            max_revalidation_window = ?config.max_revalidation_window,
            "Cache manager created"
        );

        Ok(Self {
            store,
            coordinator: Arc::new(coordinator),
            config,
            clock,
            stats: Arc::new(StatsRecorder::default()),
            instance_id,
        })
    }

    /// Get the cache configuration.
    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Get a reference to the store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Get the revalidation coordinator.
    pub fn coordinator(&self) -> &RevalidationCoordinator<S> {
        &self.coordinator
    }

    /// Identifier written into the locks this instance holds.
    pub fn instance_id(&self) -> Uuid {
        self.instance_id
    }

    /// Snapshot of usage counters.
    pub fn stats(&self) -> CacheStats {
        self.stats.snapshot()
    }

    /// Read `key`.
    ///
    /// Returns `None` on a miss, including when the store fails or the entry
    /// cannot be decoded. Never calls `refresh` on a miss; filling a miss is
    /// the caller's job via [`CacheManager::set`].
    ///
    /// If the entry is stale and `refresh` is given, a background
    /// revalidation is spawned and this call returns without waiting for it.
    pub async fn get<T>(
        &self,
        key: &str,
        ttl: Duration,
        refresh: Option<Arc<dyn DataSource<T>>>,
    ) -> Option<T>
    where
        T: Serialize + DeserializeOwned + Send + Sync + 'static,
    {
        self.lookup(key, ttl, refresh)
            .await
            .map(CacheRead::into_value)
    }

    /// Like [`CacheManager::get`], but the value comes with its freshness
    /// metadata.
    pub async fn lookup<T>(
        &self,
        key: &str,
        ttl: Duration,
        refresh: Option<Arc<dyn DataSource<T>>>,
    ) -> Option<CacheRead<T>>
    where
        T: Serialize + DeserializeOwned + Send + Sync + 'static,
    {
        let bytes = match self.bounded("get", self.store.get(key)).await {
            Ok(Some(bytes)) => bytes,
            Ok(None) => {
                self.stats.record_miss();
                tracing::trace!(key, "Cache miss");
                return None;
            }
            Err(e) => {
                self.stats.record_store_error();
                self.stats.record_miss();
                tracing::warn!(key, error = %e, "Cache read failed, treating as miss");
                return None;
            }
        };

        let envelope = match Envelope::<T>::from_bytes(&bytes) {
            Ok(envelope) => envelope,
            Err(e) => {
                self.stats.record_decode_failure();
                self.stats.record_miss();
                tracing::warn!(key, error = %e, "Ignoring undecodable cache entry");
                return None;
            }
        };

        self.stats.record_hit();
        let now = self.clock.now();
        let stale = envelope.is_stale(now);
        let mut scheduled = false;
        if stale {
            self.stats.record_stale_hit();
            if let Some(source) = refresh {
                self.spawn_revalidation(key.to_string(), ttl, source);
                scheduled = true;
            }
        }

        let (value, revalidate_at) = envelope.into_parts();
        Some(CacheRead::new(value, revalidate_at, now, scheduled))
    }

    /// Write `value` under `key` with hard expiry `ttl`, fresh for the
    /// configured revalidation interval. Overwrites unconditionally.
    pub async fn set<T>(&self, key: &str, value: &T, ttl: Duration) -> SwrResult<()>
    where
        T: Serialize + ?Sized,
    {
        let revalidate_at = add_duration(self.clock.now(), self.config.revalidate_interval);
        let bytes = Envelope::new(value, revalidate_at).to_bytes()?;

        if let Err(e) = self
            .bounded("set", self.store.set(key, &bytes, ttl, SetMode::Always))
            .await
        {
            self.stats.record_store_error();
            return Err(e.into());
        }

        tracing::trace!(key, revalidate_at = %revalidate_at, "Cache entry written");
        Ok(())
    }

    /// Remove `key`. Leaves any revalidation lock alone, so a refresh already
    /// in flight may repopulate the entry afterwards.
    pub async fn delete(&self, key: &str) -> SwrResult<()> {
        if let Err(e) = self.bounded("delete", self.store.delete(key)).await {
            self.stats.record_store_error();
            return Err(e.into());
        }
        Ok(())
    }

    /// Run the single-flight revalidation protocol for `key` inline.
    ///
    /// 1. Take the lease; if someone else holds it, stop.
    /// 2. Call the source, bounded by the refresh timeout.
    /// 3. On success write the fresh value; on failure delete the entry.
    /// 4. Release the lease, whatever happened in step 3.
    pub async fn revalidate<T>(
        &self,
        key: &str,
        ttl: Duration,
        source: &dyn DataSource<T>,
    ) -> RevalidationOutcome
    where
        T: Serialize + Send + Sync + 'static,
    {
        let lease = match self.coordinator.try_acquire(key).await {
            Ok(Some(lease)) => lease,
            Ok(None) => {
                self.stats.record_revalidation_skipped();
                return RevalidationOutcome::Skipped;
            }
            Err(e) => {
                self.stats.record_store_error();
                tracing::warn!(key, error = %e, "Could not attempt revalidation lock");
                return RevalidationOutcome::LockUnavailable;
            }
        };

        self.stats.record_revalidation_started();
        tracing::info!(key, lock_key = lease.lock_key(), "Revalidating");

        let refresh_timeout = self.config.effective_refresh_timeout();
        let fetched = match tokio::time::timeout(refresh_timeout, source.fetch()).await {
            Ok(result) => result,
            Err(_) => Err(SourceError::Timeout {
                after: refresh_timeout,
            }),
        };

        let outcome = match fetched {
            Ok(value) => match self.set(key, &value, ttl).await {
                Ok(()) => {
                    self.stats.record_revalidation_refreshed();
                    RevalidationOutcome::Refreshed
                }
                Err(e) => {
                    self.stats.record_revalidation_write_failed();
                    tracing::warn!(key, error = %e, "Revalidated value could not be written");
                    RevalidationOutcome::WriteFailed
                }
            },
            Err(e) => {
                self.stats.record_revalidation_evicted();
                tracing::warn!(key, error = %e, "Revalidation source failed, evicting entry");
                if let Err(e) = self.delete(key).await {
                    tracing::warn!(key, error = %e, "Failed to evict entry after source failure");
                }
                RevalidationOutcome::Evicted
            }
        };

        if let Err(e) = self.coordinator.release(lease).await {
            self.stats.record_store_error();
            tracing::warn!(key, error = %e, "Failed to release revalidation lock, it will expire");
        }

        tracing::info!(key, outcome = %outcome, "Revalidation finished");
        outcome
    }

    /// Spawn a detached revalidation. Nothing is returned to the caller.
    fn spawn_revalidation<T>(&self, key: String, ttl: Duration, source: Arc<dyn DataSource<T>>)
    where
        T: Serialize + Send + Sync + 'static,
    {
        let this = self.clone();
        let span = tracing::info_span!("revalidate", key = %key, instance_id = %self.instance_id);
        tokio::spawn(
            async move {
                this.revalidate(&key, ttl, source.as_ref()).await;
            }
            .instrument(span),
        );
    }

    /// Bound a store call by the configured store timeout.
    async fn bounded<R>(
        &self,
        operation: &'static str,
        call: impl Future<Output = StoreResult<R>>,
    ) -> StoreResult<R> {
        match tokio::time::timeout(self.config.store_timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(StoreError::Timeout {
                operation,
                after: self.config.store_timeout,
            }),
        }
    }
}

impl<S: StoreClient + ?Sized + 'static> Clone for CacheManager<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            coordinator: Arc::clone(&self.coordinator),
            config: self.config.clone(),
            clock: Arc::clone(&self.clock),
            stats: Arc::clone(&self.stats),
            instance_id: self.instance_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryStore;
    use serde_json::{json, Value};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use swr_core::{ManualClock, SourceResult};

    const TTL: Duration = Duration::from_secs(300);

    fn setup() -> (CacheManager<InMemoryStore>, Arc<InMemoryStore>, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::starting_now());
        let store = Arc::new(InMemoryStore::with_clock(clock.clone()));
        let config = CacheConfig::new()
            .with_revalidate_interval(Duration::from_secs(2))
            .with_max_revalidation_window(Duration::from_secs(60));
        let cache = CacheManager::with_clock(store.clone(), config, clock.clone()).unwrap();
        (cache, store, clock)
    }

    fn counting(value: Value, calls: Arc<AtomicUsize>) -> Arc<dyn DataSource<Value>> {
        Arc::new(move || {
            let value = value.clone();
            let calls = calls.clone();
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                SourceResult::Ok(value)
            }
        })
    }

    #[tokio::test]
    async fn test_invalid_config_rejected() {
        let store = Arc::new(InMemoryStore::new());
        let config = CacheConfig::new().with_max_revalidation_window(Duration::ZERO);
        assert!(CacheManager::new(store, config).is_err());
    }

    #[tokio::test]
    async fn test_miss_on_absent_key() {
        let (cache, _, _) = setup();
        let value: Option<Value> = cache.get("missing", TTL, None).await;
        assert!(value.is_none());
        assert_eq!(cache.stats().misses, 1);
    }

    #[tokio::test]
    async fn test_set_then_get_is_fresh() {
        let (cache, _, _) = setup();
        cache.set("k", &json!({"n": 1}), TTL).await.unwrap();

        let calls = Arc::new(AtomicUsize::new(0));
        let read = cache
            .lookup("k", TTL, Some(counting(json!({"n": 2}), calls.clone())))
            .await
            .unwrap();
        assert_eq!(read.value(), &json!({"n": 1}));
        assert!(!read.is_stale());
        assert!(!read.revalidation_scheduled());

        tokio::task::yield_now().await;
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(cache.stats().revalidations_started, 0);
    }

    #[tokio::test]
    async fn test_set_uses_revalidate_interval() {
        let (cache, store, clock) = setup();
        cache.set("k", &1u32, TTL).await.unwrap();
        let bytes = store.get("k").await.unwrap().unwrap();
        let envelope = Envelope::<u32>::from_bytes(&bytes).unwrap();
        assert_eq!(
            envelope.revalidate_at(),
            clock.now() + chrono::Duration::seconds(2)
        );
        assert_eq!(store.ttl_remaining("k"), Some(TTL));
    }

    #[tokio::test]
    async fn test_undecodable_entry_is_a_miss() {
        let (cache, store, _) = setup();
        store
            .set("k", b"{not an envelope", TTL, SetMode::Always)
            .await
            .unwrap();
        let value: Option<Value> = cache.get("k", TTL, None).await;
        assert!(value.is_none());
        assert_eq!(cache.stats().decode_failures, 1);
    }

    #[tokio::test]
    async fn test_wrong_type_is_a_miss() {
        let (cache, _, _) = setup();
        cache.set("k", &"text", TTL).await.unwrap();
        let value: Option<Vec<u64>> = cache.get("k", TTL, None).await;
        assert!(value.is_none());
    }

    #[tokio::test]
    async fn test_stale_without_source_does_not_revalidate() {
        let (cache, _, clock) = setup();
        cache.set("k", &json!(1), TTL).await.unwrap();
        clock.advance(Duration::from_secs(3));

        let read = cache.lookup::<Value>("k", TTL, None).await.unwrap();
        assert!(read.is_stale());
        assert!(!read.revalidation_scheduled());
        assert_eq!(read.read_at(), clock.now());
        assert_eq!(read.staleness(), Duration::from_secs(1));
        assert_eq!(cache.stats().stale_hits, 1);
    }

    #[tokio::test]
    async fn test_revalidate_refreshes_and_releases() {
        let (cache, store, _) = setup();
        cache.set("k", &json!(1), TTL).await.unwrap();

        let calls = Arc::new(AtomicUsize::new(0));
        let source = counting(json!(2), calls.clone());
        let outcome = cache.revalidate("k", TTL, source.as_ref()).await;

        assert_eq!(outcome, RevalidationOutcome::Refreshed);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(cache.get::<Value>("k", TTL, None).await, Some(json!(2)));
        assert_eq!(store.get("revalidate-k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_revalidate_skips_when_lock_held() {
        let (cache, _, _) = setup();
        let lease = cache.coordinator().try_acquire("k").await.unwrap().unwrap();

        let calls = Arc::new(AtomicUsize::new(0));
        let source = counting(json!(2), calls.clone());
        let outcome = cache.revalidate("k", TTL, source.as_ref()).await;

        assert_eq!(outcome, RevalidationOutcome::Skipped);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(cache.stats().revalidations_skipped, 1);
        cache.coordinator().release(lease).await.unwrap();
    }

    #[tokio::test]
    async fn test_revalidate_source_failure_evicts() {
        let (cache, store, _) = setup();
        cache.set("k", &json!(1), TTL).await.unwrap();

        let source: Arc<dyn DataSource<Value>> =
            Arc::new(|| async { Err::<Value, _>(SourceError::failed("db down")) });
        let outcome = cache.revalidate("k", TTL, source.as_ref()).await;

        assert_eq!(outcome, RevalidationOutcome::Evicted);
        assert_eq!(cache.get::<Value>("k", TTL, None).await, None);
        assert_eq!(store.get("revalidate-k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_revalidate_source_timeout_evicts() {
        let clock = Arc::new(ManualClock::starting_now());
        let store = Arc::new(InMemoryStore::with_clock(clock.clone()));
        let config = CacheConfig::new()
            .with_max_revalidation_window(Duration::from_secs(5))
            .with_refresh_timeout(Duration::from_millis(20));
        let cache = CacheManager::with_clock(store.clone(), config, clock).unwrap();
        cache.set("k", &json!(1), TTL).await.unwrap();

        let source: Arc<dyn DataSource<Value>> = Arc::new(|| async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            SourceResult::Ok(json!(2))
        });
        let outcome = cache.revalidate("k", TTL, source.as_ref()).await;

        assert_eq!(outcome, RevalidationOutcome::Evicted);
        assert_eq!(store.get("k").await.unwrap(), None);
        assert_eq!(store.get("revalidate-k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_delete_leaves_lock_alone() {
        let (cache, store, _) = setup();
        cache.set("k", &json!(1), TTL).await.unwrap();
        let lease = cache.coordinator().try_acquire("k").await.unwrap().unwrap();

        cache.delete("k").await.unwrap();
        assert_eq!(store.get("k").await.unwrap(), None);
        assert!(store.get("revalidate-k").await.unwrap().is_some());
        cache.coordinator().release(lease).await.unwrap();
    }

    #[tokio::test]
    async fn test_unreachable_store() {
        let (cache, store, _) = setup();
        cache.set("k", &json!(1), TTL).await.unwrap();
        store.set_reachable(false);

        assert_eq!(cache.get::<Value>("k", TTL, None).await, None);
        assert!(cache.set("k", &json!(2), TTL).await.is_err());
        assert!(cache.delete("k").await.is_err());

        let calls = Arc::new(AtomicUsize::new(0));
        let source = counting(json!(2), calls.clone());
        assert_eq!(
            cache.revalidate("k", TTL, source.as_ref()).await,
            RevalidationOutcome::LockUnavailable
        );
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert!(cache.stats().store_errors >= 4);
    }

    #[tokio::test]
    async fn test_clones_share_stats() {
        let (cache, _, _) = setup();
        let other = cache.clone();
        let _: Option<Value> = other.get("missing", TTL, None).await;
        assert_eq!(cache.stats().misses, 1);
        assert_eq!(cache.instance_id(), other.instance_id());
    }
}
