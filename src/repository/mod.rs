//! # Product Repository
//!
//! Sole writer of durable product state. The request path and the
//! compression worker both go through [`ProductRepository`]; two
//! implementations exist:
//!
//! - [`PgProductRepository`] - PostgreSQL via sqlx, every statement bounded
//!   by the configured deadline
//! - [`InMemoryProductRepository`] - process-local store for tests and
//!   development, with a switch to simulate an outage

mod in_memory;
mod postgres;

pub use in_memory::InMemoryProductRepository;
pub use postgres::PgProductRepository;

use crate::error::Result;
use crate::models::{NewProduct, Product};
use async_trait::async_trait;

#[async_trait]
pub trait ProductRepository: Send + Sync + 'static {
    /// Fetch one product; `CatalogError::NotFound` when no row matches
    async fn get_by_id(&self, id: i64) -> Result<Product>;

    /// Fetch every product ordered by id; empty table yields an empty vec
    async fn get_all(&self) -> Result<Vec<Product>>;

    /// Insert a product and return the store-assigned id
    async fn save(&self, new_product: &NewProduct) -> Result<i64>;

    /// Replace every mutable column of the row matching `product.id`
    async fn update(&self, product: &Product) -> Result<()>;

    /// Replace only the derived image list of a product
    async fn update_derived_images(&self, id: i64, derived_images: &[String]) -> Result<()>;
}
