//! No-op cache provider
//!
//! Always returns None/success. Used when caching is disabled or
//! when Redis is unavailable at startup (graceful degradation).

use crate::cache::errors::CacheResult;
use crate::cache::traits::CacheService;
use std::time::Duration;

/// No-op cache service that never caches anything
#[derive(Debug, Clone, Default)]
pub struct NoOpCacheService;

impl NoOpCacheService {
    pub fn new() -> Self {
        Self
    }
}

impl CacheService for NoOpCacheService {
    async fn get(&self, _key: &str) -> CacheResult<Option<String>> {
        Ok(None)
    }

    async fn set(&self, _key: &str, _value: &str, _ttl: Option<Duration>) -> CacheResult<()> {
        Ok(())
    }

    async fn delete(&self, _key: &str) -> CacheResult<()> {
        Ok(())
    }

    async fn health_check(&self) -> CacheResult<bool> {
        Ok(true)
    }

    fn provider_name(&self) -> &'static str {
        "noop"
    }

    fn is_distributed(&self) -> bool {
        // no state to share
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_noop_get_after_set_is_still_a_miss() {
        let svc = NoOpCacheService::new();
        svc.set("product_1", "{}", None).await.unwrap();
        assert_eq!(svc.get("product_1").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_noop_delete_and_health() {
        let svc = NoOpCacheService::new();
        assert!(svc.delete("product_1").await.is_ok());
        assert!(svc.health_check().await.unwrap());
        assert_eq!(svc.provider_name(), "noop");
    }
}
