//! Product catalog lookups.
//!
//! The cart only needs one thing from the catalog: resolving a product ID to
//! an immutable [`ProductReference`]. [`CachedCatalog`] keeps recent lookups
//! in memory via `moka` (5 minute TTL by default) so repeated adds of the
//! same product do not hit the backend.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use basket_core::{ProductId, ProductReference};
use moka::future::Cache;
use tracing::{debug, instrument};

use crate::backend::ApiError;

/// Resolves product IDs to product references.
#[async_trait]
pub trait Catalog: Send + Sync {
    /// Look up a product.
    ///
    /// Returns `ApiError::NotFound` for unknown products.
    async fn get_product(&self, product_id: &ProductId) -> Result<ProductReference, ApiError>;
}

/// A fixed, in-memory catalog.
#[derive(Debug, Clone, Default)]
pub struct StaticCatalog {
    products: HashMap<ProductId, ProductReference>,
}

impl StaticCatalog {
    /// Build a catalog from a list of products.
    #[must_use]
    pub fn new(products: impl IntoIterator<Item = ProductReference>) -> Self {
        Self {
            products: products
                .into_iter()
                .map(|product| (product.id.clone(), product))
                .collect(),
        }
    }
}

#[async_trait]
impl Catalog for StaticCatalog {
    async fn get_product(&self, product_id: &ProductId) -> Result<ProductReference, ApiError> {
        self.products
            .get(product_id)
            .cloned()
            .ok_or_else(|| ApiError::NotFound(product_id.to_string()))
    }
}

/// A catalog wrapper that caches successful lookups.
#[derive(Clone)]
pub struct CachedCatalog {
    inner: Arc<dyn Catalog>,
    cache: Cache<ProductId, ProductReference>,
}

impl CachedCatalog {
    /// Wrap `inner` with a cache of at most 1000 products.
    #[must_use]
    pub fn new(inner: Arc<dyn Catalog>, ttl: Duration) -> Self {
        let cache = Cache::builder()
            .max_capacity(1000)
            .time_to_live(ttl)
            .build();

        Self { inner, cache }
    }

    /// Drop a cached product so the next lookup refetches it.
    pub async fn invalidate(&self, product_id: &ProductId) {
        self.cache.invalidate(product_id).await;
    }
}

#[async_trait]
impl Catalog for CachedCatalog {
    #[instrument(skip(self), fields(product_id = %product_id))]
    async fn get_product(&self, product_id: &ProductId) -> Result<ProductReference, ApiError> {
        if let Some(product) = self.cache.get(product_id).await {
            debug!("Cache hit for product");
            return Ok(product);
        }

        let product = self.inner.get_product(product_id).await?;
        self.cache.insert(product_id.clone(), product.clone()).await;
        Ok(product)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use basket_core::{CurrencyCode, Price};

    use super::*;

    fn product(id: &str) -> ProductReference {
        ProductReference {
            id: ProductId::new(id),
            unit_price: Price::from_minor(500, CurrencyCode::USD),
            display_name: format!("Product {id}"),
            images: vec![],
        }
    }

    struct CountingCatalog {
        inner: StaticCatalog,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Catalog for CountingCatalog {
        async fn get_product(&self, product_id: &ProductId) -> Result<ProductReference, ApiError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.inner.get_product(product_id).await
        }
    }

    #[tokio::test]
    async fn test_static_catalog_lookup() {
        let catalog = StaticCatalog::new([product("P1")]);
        let found = catalog.get_product(&ProductId::new("P1")).await.unwrap();
        assert_eq!(found.display_name, "Product P1");

        let missing = catalog.get_product(&ProductId::new("P9")).await;
        assert!(matches!(missing, Err(ApiError::NotFound(id)) if id == "P9"));
    }

    #[tokio::test]
    async fn test_cached_catalog_hits_inner_once() {
        let counting = Arc::new(CountingCatalog {
            inner: StaticCatalog::new([product("P1")]),
            calls: AtomicUsize::new(0),
        });
        let cached = CachedCatalog::new(counting.clone(), Duration::from_secs(300));

        for _ in 0..3 {
            cached.get_product(&ProductId::new("P1")).await.unwrap();
        }
        assert_eq!(counting.calls.load(Ordering::SeqCst), 1);

        cached.invalidate(&ProductId::new("P1")).await;
        cached.get_product(&ProductId::new("P1")).await.unwrap();
        assert_eq!(counting.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_cached_catalog_does_not_cache_misses() {
        let counting = Arc::new(CountingCatalog {
            inner: StaticCatalog::default(),
            calls: AtomicUsize::new(0),
        });
        let cached = CachedCatalog::new(counting.clone(), Duration::from_secs(300));

        assert!(cached.get_product(&ProductId::new("P1")).await.is_err());
        assert!(cached.get_product(&ProductId::new("P1")).await.is_err());
        assert_eq!(counting.calls.load(Ordering::SeqCst), 2);
    }
}
