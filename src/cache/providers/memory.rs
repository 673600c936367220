//! In-process cache provider backed by `DashMap`
//!
//! Not distributed: each process holds its own entries. Used by tests and
//! single-instance development setups. [`MemoryCacheService::simulate_outage`]
//! makes every call fail so the fail-open path can be exercised without a
//! real backend.

use crate::cache::errors::{CacheError, CacheResult};
use crate::cache::traits::CacheService;
use dashmap::DashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::debug;

#[derive(Debug, Clone)]
struct Entry {
    value: String,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_expired(&self) -> bool {
        self.expires_at
            .map(|deadline| Instant::now() >= deadline)
            .unwrap_or(false)
    }
}

/// In-memory cache service; clones share the same entries and outage switch
#[derive(Debug, Clone, Default)]
pub struct MemoryCacheService {
    entries: Arc<DashMap<String, Entry>>,
    outage: Arc<AtomicBool>,
}

impl MemoryCacheService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent call fail (or succeed again)
    pub fn simulate_outage(&self, down: bool) {
        self.outage.store(down, Ordering::SeqCst);
    }

    /// Raw view of a key, bypassing the outage switch (test assertions)
    pub fn peek(&self, key: &str) -> Option<String> {
        self.entries
            .get(key)
            .filter(|entry| !entry.is_expired())
            .map(|entry| entry.value.clone())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn check_available(&self) -> CacheResult<()> {
        if self.outage.load(Ordering::SeqCst) {
            return Err(CacheError::ConnectionError(
                "simulated memory cache outage".to_string(),
            ));
        }
        Ok(())
    }
}

impl CacheService for MemoryCacheService {
    async fn get(&self, key: &str) -> CacheResult<Option<String>> {
        self.check_available()?;

        let expired = match self.entries.get(key) {
            Some(entry) if !entry.is_expired() => {
                debug!(key = key, "Cache HIT (memory)");
                return Ok(Some(entry.value.clone()));
            }
            Some(_) => true,
            None => false,
        };
        if expired {
            self.entries.remove(key);
        }

        debug!(key = key, "Cache MISS (memory)");
        Ok(None)
    }

    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> CacheResult<()> {
        self.check_available()?;
        self.entries.insert(
            key.to_string(),
            Entry {
                value: value.to_string(),
                expires_at: ttl.map(|ttl| Instant::now() + ttl),
            },
        );
        debug!(key = key, ttl_seconds = ?ttl.map(|t| t.as_secs()), "Cache SET (memory)");
        Ok(())
    }

    async fn delete(&self, key: &str) -> CacheResult<()> {
        self.check_available()?;
        self.entries.remove(key);
        debug!(key = key, "Cache DEL (memory)");
        Ok(())
    }

    async fn health_check(&self) -> CacheResult<bool> {
        Ok(!self.outage.load(Ordering::SeqCst))
    }

    fn provider_name(&self) -> &'static str {
        "memory"
    }

    fn is_distributed(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_set_get_delete() {
        let svc = MemoryCacheService::new();
        svc.set("product_1", "lamp", None).await.unwrap();
        assert_eq!(svc.get("product_1").await.unwrap().as_deref(), Some("lamp"));

        svc.delete("product_1").await.unwrap();
        assert_eq!(svc.get("product_1").await.unwrap(), None);
        // deleting again is fine
        assert!(svc.delete("product_1").await.is_ok());
    }

    #[tokio::test]
    async fn test_entries_without_ttl_persist() {
        let svc = MemoryCacheService::new();
        svc.set("product_2", "chair", None).await.unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(svc.get("product_2").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_ttl_expires_entry() {
        let svc = MemoryCacheService::new();
        svc.set("product_3", "mug", Some(Duration::from_millis(10)))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(svc.get("product_3").await.unwrap(), None);
        assert!(svc.is_empty());
    }

    #[tokio::test]
    async fn test_simulated_outage_errors_and_recovers() {
        let svc = MemoryCacheService::new();
        svc.set("product_4", "desk", None).await.unwrap();

        let shared = svc.clone();
        shared.simulate_outage(true);
        assert!(matches!(
            svc.get("product_4").await,
            Err(CacheError::ConnectionError(_))
        ));
        assert!(!svc.health_check().await.unwrap());

        shared.simulate_outage(false);
        assert_eq!(svc.get("product_4").await.unwrap().as_deref(), Some("desk"));
    }
}
