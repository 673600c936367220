//! # Database Operations
//!
//! PostgreSQL connection management for the product repository.
//!
//! - [`connection`] - pool construction from [`DatabaseConfig`](crate::config::DatabaseConfig),
//!   health checks, migrations and shutdown

pub mod connection;

pub use connection::DatabaseConnection;
