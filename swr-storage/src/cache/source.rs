//! Data source trait.
//!
//! The expensive thing the cache sits in front of. Treated as opaque: it may
//! be slow (seconds) and it may fail.

use std::future::Future;

use async_trait::async_trait;
use swr_core::SourceResult;

/// Data source for refreshing a cached value.
///
/// Any `Fn() -> impl Future<Output = SourceResult<T>>` closure is a data
/// source, so call sites can pass an `async move` block directly.
#[async_trait]
pub trait DataSource<T>: Send + Sync {
    /// Produce a fresh value.
    async fn fetch(&self) -> SourceResult<T>;
}

#[async_trait]
impl<T, F, Fut> DataSource<T> for F
where
    T: Send + 'static,
    F: Fn() -> Fut + Send + Sync,
    Fut: Future<Output = SourceResult<T>> + Send + 'static,
{
    async fn fetch(&self) -> SourceResult<T> {
        (self)().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use swr_core::SourceError;

    #[tokio::test]
    async fn test_closure_is_a_data_source() {
        let source: Arc<dyn DataSource<u32>> = Arc::new(|| async { Ok::<u32, SourceError>(7) });
        assert_eq!(source.fetch().await, Ok(7));
    }

    #[tokio::test]
    async fn test_failing_closure() {
        let source: Arc<dyn DataSource<u32>> =
            Arc::new(|| async { Err::<u32, _>(SourceError::failed("db down")) });
        assert!(source.fetch().await.is_err());
    }
}
