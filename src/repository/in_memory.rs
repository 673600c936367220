use super::ProductRepository;
use crate::error::{CatalogError, Result};
use crate::models::{NewProduct, Product};
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};

/// In-memory product repository for tests and development
///
/// Ids are assigned from 1 like a fresh `BIGSERIAL`. While
/// [`set_unavailable`](Self::set_unavailable) is on, every call fails with a
/// retryable persistence error.
#[derive(Debug)]
pub struct InMemoryProductRepository {
    products: RwLock<BTreeMap<i64, Product>>,
    next_id: AtomicI64,
    unavailable: AtomicBool,
}

impl Default for InMemoryProductRepository {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryProductRepository {
    pub fn new() -> Self {
        Self {
            products: RwLock::new(BTreeMap::new()),
            next_id: AtomicI64::new(1),
            unavailable: AtomicBool::new(false),
        }
    }

    /// Simulate the store becoming unreachable (or reachable again)
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    pub fn len(&self) -> usize {
        self.products.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.products.read().is_empty()
    }

    fn check_available(&self) -> Result<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(CatalogError::retryable_persistence(
                "in-memory store unavailable",
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl ProductRepository for InMemoryProductRepository {
    async fn get_by_id(&self, id: i64) -> Result<Product> {
        self.check_available()?;
        self.products
            .read()
            .get(&id)
            .cloned()
            .ok_or(CatalogError::NotFound(id))
    }

    async fn get_all(&self) -> Result<Vec<Product>> {
        self.check_available()?;
        Ok(self.products.read().values().cloned().collect())
    }

    async fn save(&self, new_product: &NewProduct) -> Result<i64> {
        self.check_available()?;
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        self.products
            .write()
            .insert(id, Product::from_new(id, new_product.clone()));
        Ok(id)
    }

    async fn update(&self, product: &Product) -> Result<()> {
        self.check_available()?;
        let mut products = self.products.write();
        let stored = products
            .get_mut(&product.id)
            .ok_or(CatalogError::NotFound(product.id))?;
        // owner is immutable after creation
        *stored = Product {
            owner_id: stored.owner_id,
            ..product.clone()
        };
        Ok(())
    }

    async fn update_derived_images(&self, id: i64, derived_images: &[String]) -> Result<()> {
        self.check_available()?;
        let mut products = self.products.write();
        let stored = products.get_mut(&id).ok_or(CatalogError::NotFound(id))?;
        stored.derived_images = derived_images.to_vec();
        Ok(())
    }
}
