//! SWR Storage - Store Clients and the Cache Manager
//!
//! Defines the shared-store abstraction, its in-memory and Redis
//! implementations, and the stale-while-revalidate cache manager built on
//! top of them.

pub mod cache;
pub mod store;

pub use cache::{
    CacheManager, CacheRead, CacheStats, DataSource, RevalidationCoordinator, RevalidationLease,
    RevalidationOutcome,
};
pub use store::{InMemoryStore, SetMode, StoreClient};

#[cfg(feature = "redis")]
pub use store::RedisStore;
