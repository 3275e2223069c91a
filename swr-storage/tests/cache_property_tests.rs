//! Property-Based Tests for the Cache Manager
//!
//! **Property 1: Fresh reads are side-effect free**
//! A value written with `set` reads back unchanged for any key, and reading
//! it before its revalidation time never contacts the data source.
//!
//! **Property 2: Staleness boundary**
//! An entry is stale exactly when the elapsed time exceeds the revalidation
//! interval.
//!
//! **Property 3: Lock isolation**
//! The revalidation lock for a key lives under `prefix + key` and holding it
//! never changes the cached entry.

use std::sync::Arc;
use std::time::Duration;

use proptest::prelude::*;
use swr_test_utils::*;
use tokio::runtime::Runtime;

const TTL: Duration = Duration::from_secs(300);

fn test_runtime() -> Result<Runtime, TestCaseError> {
    Runtime::new().map_err(|e| TestCaseError::fail(format!("Failed to create runtime: {}", e)))
}

fn store_failure(e: impl std::fmt::Display) -> TestCaseError {
    TestCaseError::fail(format!("store call failed: {}", e))
}

/// Strategy for lock key prefixes, including the default.
fn prefix_strategy() -> impl Strategy<Value = String> {
    prop_oneof![
        3 => Just("revalidate-".to_string()),
        1 => "[a-z]{1,8}[:_-]",
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// **Property 1: Fresh reads are side-effect free**
    #[test]
    fn prop_fresh_read_returns_value_without_refresh(
        key in arb_cache_key(),
        record in arb_record(),
        interval_secs in 1u64..3600,
    ) {
        let rt = test_runtime()?;
        rt.block_on(async {
            let (store, clock) = manual_store();
            let config = CacheConfig::new()
                .with_revalidate_interval(Duration::from_secs(interval_secs));
            let cache = manager_on(store, clock, config);

            cache.set(&key, &record, TTL).await.map_err(store_failure)?;

            let source = CountingSource::ok(Record::new(0, "replacement"));
            let refresh: Arc<dyn DataSource<Record>> = source.clone();
            let read = cache.lookup(&key, TTL, Some(refresh)).await;

            prop_assert!(read.is_some(), "written value should be readable");
            let read = read.ok_or_else(|| TestCaseError::fail("missing".to_string()))?;
            prop_assert!(!read.is_stale());
            prop_assert!(!read.revalidation_scheduled());
            prop_assert_eq!(read.into_value(), record);
            prop_assert_eq!(source.calls(), 0);
            prop_assert_eq!(cache.stats().revalidations_started, 0);
            Ok(())
        })?;
    }

    /// **Property 2: Staleness boundary**
    #[test]
    fn prop_stale_exactly_after_interval(
        interval_ms in 1u64..10_000,
        elapsed_ms in 0u64..20_000,
    ) {
        let rt = test_runtime()?;
        rt.block_on(async {
            let (store, clock) = manual_store();
            let config = CacheConfig::new()
                .with_revalidate_interval(Duration::from_millis(interval_ms));
            let cache = manager_on(store, clock.clone(), config);

            cache.set("k", &elapsed_ms, TTL).await.map_err(store_failure)?;
            clock.advance(Duration::from_millis(elapsed_ms));

            let read = cache.lookup::<u64>("k", TTL, None).await;
            let read = read.ok_or_else(|| TestCaseError::fail("missing".to_string()))?;
            prop_assert_eq!(read.is_stale(), elapsed_ms > interval_ms);
            prop_assert_eq!(*read.value(), elapsed_ms);
            Ok(())
        })?;
    }

    /// **Property 3: Lock isolation**
    #[test]
    fn prop_lock_lives_beside_entry(
        key in arb_cache_key(),
        prefix in prefix_strategy(),
        record in arb_record(),
    ) {
        let rt = test_runtime()?;
        rt.block_on(async {
            let (store, clock) = manual_store();
            let config = CacheConfig::new().with_lock_key_prefix(prefix.clone());
            let cache = manager_on(store.clone(), clock, config);
            cache.set(&key, &record, TTL).await.map_err(store_failure)?;

            let lease = cache
                .coordinator()
                .try_acquire(&key)
                .await
                .map_err(store_failure)?
                .ok_or_else(|| TestCaseError::fail("lock should be free".to_string()))?;
            prop_assert_eq!(lease.lock_key(), format!("{}{}", prefix, key));
            prop_assert!(store.get(lease.lock_key()).await.map_err(store_failure)?.is_some());
            prop_assert_eq!(cache.get::<Record>(&key, TTL, None).await, Some(record.clone()));

            let lock_key = lease.lock_key().to_string();
            cache.coordinator().release(lease).await.map_err(store_failure)?;
            prop_assert!(store.get(&lock_key).await.map_err(store_failure)?.is_none());
            prop_assert_eq!(cache.get::<Record>(&key, TTL, None).await, Some(record));
            Ok(())
        })?;
    }
}
