//! # Product Service
//!
//! Cache-aside orchestration of the four inbound catalog operations.
//!
//! - Reads check the cache first and repopulate it from the repository on a miss.
//! - Creates persist, cache the fresh snapshot and enqueue compression.
//! - Updates persist, invalidate the cached snapshot and re-enqueue
//!   compression when the source images changed.
//!
//! Cache failures never surface here; the cache provider degrades them to a
//! miss. Enqueue failures are logged and never fail the write that caused
//! them.

use crate::cache::CacheProvider;
use crate::error::{CatalogError, Result};
use crate::messaging::{ImageCompressionJob, ImageQueue};
use crate::models::{NewProduct, Product, ProductUpdate};
use crate::repository::ProductRepository;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Response for a successful create
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductCreated {
    pub product_id: i64,
}

/// Parse a caller-supplied product id
///
/// Surrounding whitespace is ignored; anything that is not a base-10 `i64`
/// is a `ValidationError`, never a `NotFound`.
pub fn parse_product_id(raw_id: &str) -> Result<i64> {
    let trimmed = raw_id.trim();
    trimmed
        .parse::<i64>()
        .map_err(|_| CatalogError::validation(format!("'{trimmed}' is not a valid product id")))
}

#[derive(Clone)]
pub struct ProductService {
    repository: Arc<dyn ProductRepository>,
    cache: CacheProvider,
    queue: ImageQueue,
}

impl std::fmt::Debug for ProductService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProductService")
            .field("repository", &"Arc<dyn ProductRepository>")
            .field("cache", &self.cache.provider_name())
            .field("queue", &self.queue.queue_name())
            .finish()
    }
}

impl ProductService {
    pub fn new(
        repository: Arc<dyn ProductRepository>,
        cache: CacheProvider,
        queue: ImageQueue,
    ) -> Self {
        Self {
            repository,
            cache,
            queue,
        }
    }

    /// Fetch one product, serving from cache when possible
    ///
    /// A miss reads the repository, fills the cache and reads the repository
    /// again. If the two reads differ the fresh entry is evicted, so a
    /// concurrent update or worker completion is never masked by the fill.
    pub async fn get_product(&self, raw_id: &str) -> Result<Product> {
        let id = parse_product_id(raw_id)?;
        let key = Product::cache_key(id);

        if let Some(product) = self.cache.get_json::<Product>(&key).await {
            debug!(product_id = id, key = %key, "Cache hit");
            return Ok(product);
        }

        debug!(product_id = id, key = %key, "Cache miss, reading repository");
        let product = self.repository.get_by_id(id).await?;
        self.cache.set_json(&key, &product).await;

        // A write plus invalidation may have landed between the read and the
        // fill; re-read so an outdated snapshot never outlives it.
        let current = self.repository.get_by_id(id).await?;
        if current != product {
            debug!(product_id = id, key = %key, "Product changed during cache fill, evicting");
            self.cache.delete(&key).await;
        }
        Ok(current)
    }

    /// All products ordered by id; never cached
    pub async fn list_products(&self) -> Result<Vec<Product>> {
        self.repository.get_all().await
    }

    /// Persist a new product and schedule compression of its images
    pub async fn create_product(&self, new_product: NewProduct) -> Result<ProductCreated> {
        new_product.validate()?;

        let product_id = self.repository.save(&new_product).await?;
        let product = Product::from_new(product_id, new_product);
        self.cache
            .set_json(&Product::cache_key(product_id), &product)
            .await;

        info!(
            product_id = product_id,
            images = product.source_images.len(),
            "✅ Product created"
        );

        self.enqueue_compression(&product).await;
        Ok(ProductCreated { product_id })
    }

    /// Replace a product's mutable fields
    ///
    /// Identity and owner are kept. The cached snapshot is invalidated rather
    /// than rewritten, so the next read observes the stored row.
    pub async fn update_product(&self, raw_id: &str, update: ProductUpdate) -> Result<Product> {
        let id = parse_product_id(raw_id)?;
        update.validate()?;

        let current = self.repository.get_by_id(id).await?;
        let updated = current.with_update(update);
        self.repository.update(&updated).await?;
        self.cache.delete(&Product::cache_key(id)).await;

        info!(product_id = id, "✅ Product updated");

        if updated.source_images != current.source_images {
            self.enqueue_compression(&updated).await;
        }
        Ok(updated)
    }

    async fn enqueue_compression(&self, product: &Product) {
        if product.source_images.is_empty() {
            debug!(product_id = product.id, "No source images, skipping compression");
            return;
        }

        let job = ImageCompressionJob::new(product.id, product.source_images.clone());
        if let Err(e) = self.queue.publish(&job).await {
            warn!(
                product_id = product.id,
                queue_name = self.queue.queue_name(),
                error = %e,
                "Failed to enqueue image compression; derived images will not be produced"
            );
        }
    }
}
