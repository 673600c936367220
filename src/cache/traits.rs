//! Cache service trait definition

use super::errors::CacheResult;
use std::time::Duration;

/// Trait defining cache backend operations
///
/// Implemented by the concrete providers (Redis, Memory, NoOp). Backends
/// report failures honestly; fail-open behaviour lives in
/// [`CacheProvider`](super::CacheProvider).
pub trait CacheService: Send + Sync {
    /// Get a value from the cache by key
    ///
    /// Returns `Ok(Some(value))` on cache hit, `Ok(None)` on cache miss.
    fn get(
        &self,
        key: &str,
    ) -> impl std::future::Future<Output = CacheResult<Option<String>>> + Send;

    /// Set a value, optionally expiring after `ttl`; `None` keeps it until deleted
    fn set(
        &self,
        key: &str,
        value: &str,
        ttl: Option<Duration>,
    ) -> impl std::future::Future<Output = CacheResult<()>> + Send;

    /// Delete a specific key from the cache; deleting an absent key succeeds
    fn delete(&self, key: &str) -> impl std::future::Future<Output = CacheResult<()>> + Send;

    /// Check if the cache backend is healthy
    fn health_check(&self) -> impl std::future::Future<Output = CacheResult<bool>> + Send;

    /// Get the name of the cache provider
    fn provider_name(&self) -> &'static str;

    /// Whether the backend is shared between processes
    fn is_distributed(&self) -> bool;
}
