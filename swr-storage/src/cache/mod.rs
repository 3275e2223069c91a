//! Stale-while-revalidate cache layer.
//!
//! Entries live in a shared store as envelopes carrying a `revalidate_at`
//! instant. Past that instant an entry is stale but still served; the read
//! that notices kicks off a background refresh, and a lease key in the same
//! store makes sure only one process runs that refresh at a time.
//!
//! # Two clocks
//!
//! - The store TTL is hard expiry: after it the entry is gone.
//! - `revalidate_at` is soft expiry: after it the entry is served and
//!   refreshed.
//!
//! # Example
//!
//! ```ignore
//! let store = Arc::new(InMemoryStore::new());
//! let cache = CacheManager::new(store, CacheConfig::default())?;
//!
//! cache.set("k", &json!({"n": 1}), Duration::from_secs(300)).await?;
//!
//! let source: Arc<dyn DataSource<Value>> = Arc::new(|| async { Ok(json!({"n": 2})) });
//! let value = cache.get("k", Duration::from_secs(300), Some(source)).await;
//! ```

pub mod freshness;
pub mod manager;
pub mod revalidation;
pub mod source;
pub mod stats;

pub use freshness::CacheRead;
pub use manager::CacheManager;
pub use revalidation::{RevalidationCoordinator, RevalidationLease, RevalidationOutcome};
pub use source::DataSource;
pub use stats::CacheStats;
