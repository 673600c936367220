#![allow(clippy::doc_markdown)] // Allow technical terms like PostgreSQL, RabbitMQ in docs
#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # Catalog Core
//!
//! Product catalog backend core: cache-aside reads, durable writes to
//! PostgreSQL and an at-least-once image compression pipeline over a
//! message queue.
//!
//! ## Architecture
//!
//! A product write goes to the repository first, then the cache is updated
//! or invalidated, then an [`messaging::ImageCompressionJob`] is published.
//! The compression worker drains the queue, fetches and resizes each source
//! image, stores the derived JPEGs, writes their references back to the
//! repository and invalidates the product's cache entry.
//!
//! The cache is fail-open: a Redis outage degrades reads to the repository
//! and never fails a request. Jobs are acknowledged only after the derived
//! images are durably written; failed jobs are retried and finally
//! dead-lettered.
//!
//! ## Module Organization
//!
//! - [`cache`] - Fail-open cache provider (Redis, in-memory, NoOp)
//! - [`repository`] - Product persistence (PostgreSQL, in-memory)
//! - [`messaging`] - Queue providers (RabbitMQ, in-memory) and the image queue
//! - [`imaging`] - Fetching, resizing and storing images
//! - [`worker`] - The compression worker loop
//! - [`services`] - Request-path product operations
//! - [`context`] - Construction and teardown of shared handles
//! - [`config`] - Configuration management
//! - [`error`] - Structured error handling
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use catalog_core::config::ConfigManager;
//! use catalog_core::context::CatalogContext;
//! use catalog_core::models::NewProduct;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let context = CatalogContext::from_config(ConfigManager::load()?).await?;
//! let products = context.product_service();
//!
//! let created = products
//!     .create_product(NewProduct {
//!         owner_id: 1,
//!         name: "Lamp".to_string(),
//!         description: "Desk lamp".to_string(),
//!         price: 19.99,
//!         source_images: vec!["https://img.example/lamp.jpg".to_string()],
//!     })
//!     .await?;
//! let lamp = products.get_product(&created.product_id.to_string()).await?;
//! println!("{} costs {}", lamp.name, lamp.price);
//!
//! context.shutdown().await;
//! # Ok(())
//! # }
//! ```
//!
//! ## Testing
//!
//! ```bash
//! cargo test                          # Unit and in-memory integration tests
//! cargo test --features test-services # Also PostgreSQL, Redis and RabbitMQ
//! ```

pub mod cache;
pub mod config;
pub mod context;
pub mod database;
pub mod error;
pub mod imaging;
pub mod logging;
pub mod messaging;
pub mod models;
pub mod repository;
pub mod resilience;
pub mod services;
pub mod worker;

pub use config::{CatalogConfig, ConfigManager};
pub use context::CatalogContext;
pub use error::{CatalogError, ErrorCategory, Result};
pub use models::{NewProduct, Product, ProductUpdate};
pub use services::{ProductCreated, ProductService};
pub use worker::{CompressionWorker, JobOutcome, WorkerStats};
