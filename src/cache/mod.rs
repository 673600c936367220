//! # Cache Facade
//!
//! Fail-open key/value cache in front of the product repository.
//!
//! [`CacheProvider`] is the only type callers touch. It dispatches to one of
//! the backends in [`providers`] and absorbs every backend failure: a read
//! that cannot reach the backend is a miss, a write or delete that cannot
//! reach it is a no-op. Callers cannot tell a miss from an outage.
//!
//! Backends:
//! - **Redis**: distributed, `ConnectionManager` based, behind a circuit breaker
//! - **Memory**: in-process `DashMap`, with a simulated outage switch for tests
//! - **NoOp**: always miss; also the fallback when Redis is unreachable at startup

pub mod errors;
pub mod provider;
pub mod providers;
pub mod traits;

pub use errors::{CacheError, CacheResult};
pub use provider::CacheProvider;
pub use providers::{MemoryCacheService, NoOpCacheService, RedisCacheService};
pub use traits::CacheService;
