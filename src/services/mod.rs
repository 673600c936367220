//! Request-path services composed over the repository, cache and queue.

pub mod product_service;

pub use product_service::{parse_product_id, ProductCreated, ProductService};
