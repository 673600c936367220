//! Cache provider with integrated circuit breaker
//!
//! Uses enum dispatch (like `MessagingProvider`) over the concrete backends.
//! Every backend call is bounded by the configured operation timeout, and
//! every failure is logged and absorbed here.

use super::errors::{CacheError, CacheResult};
use super::providers::{MemoryCacheService, NoOpCacheService, RedisCacheService};
use super::traits::CacheService;
use crate::config::{CacheBackendKind, CacheConfig, CircuitBreakerConfig};
use crate::resilience::{CircuitBreaker, CircuitBreakerError, CircuitState};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

const DEFAULT_OPERATION_TIMEOUT: Duration = Duration::from_millis(250);

/// Internal cache backend enum for dispatch
#[derive(Debug, Clone)]
enum CacheBackend {
    /// Redis cache provider (boxed to reduce enum size)
    Redis(Box<RedisCacheService>),

    /// In-process cache
    Memory(MemoryCacheService),

    /// No-op cache provider (always miss, always succeed)
    NoOp(NoOpCacheService),
}

impl CacheBackend {
    fn is_distributed(&self) -> bool {
        match self {
            Self::Redis(s) => s.is_distributed(),
            Self::Memory(s) => s.is_distributed(),
            Self::NoOp(s) => s.is_distributed(),
        }
    }

    fn provider_name(&self) -> &'static str {
        match self {
            Self::Redis(s) => s.provider_name(),
            Self::Memory(s) => s.provider_name(),
            Self::NoOp(s) => s.provider_name(),
        }
    }

    fn is_enabled(&self) -> bool {
        !matches!(self, Self::NoOp(_))
    }

    async fn get(&self, key: &str) -> CacheResult<Option<String>> {
        match self {
            Self::Redis(s) => s.get(key).await,
            Self::Memory(s) => s.get(key).await,
            Self::NoOp(s) => s.get(key).await,
        }
    }

    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> CacheResult<()> {
        match self {
            Self::Redis(s) => s.set(key, value, ttl).await,
            Self::Memory(s) => s.set(key, value, ttl).await,
            Self::NoOp(s) => s.set(key, value, ttl).await,
        }
    }

    async fn delete(&self, key: &str) -> CacheResult<()> {
        match self {
            Self::Redis(s) => s.delete(key).await,
            Self::Memory(s) => s.delete(key).await,
            Self::NoOp(s) => s.delete(key).await,
        }
    }

    async fn health_check(&self) -> CacheResult<bool> {
        match self {
            Self::Redis(s) => s.health_check().await,
            Self::Memory(s) => s.health_check().await,
            Self::NoOp(s) => s.health_check().await,
        }
    }
}

/// Fail-open cache provider
///
/// ## Failure semantics
///
/// - `get()` returns `None` on miss, backend error, timeout or open circuit
/// - `set()` / `delete()` return nothing; failures are logged at `warn`
///
/// ## Circuit Breaker
///
/// Distributed backends (Redis) are wrapped in a circuit breaker so a dead
/// backend costs one fast rejection per call instead of one timeout.
#[derive(Clone)]
pub struct CacheProvider {
    backend: CacheBackend,
    circuit_breaker: Option<Arc<CircuitBreaker>>,
    default_ttl: Option<Duration>,
    operation_timeout: Duration,
}

impl std::fmt::Debug for CacheProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheProvider")
            .field("backend", &self.backend)
            .field(
                "circuit_breaker",
                &self.circuit_breaker.as_ref().map(|cb| cb.state()),
            )
            .field("default_ttl", &self.default_ttl)
            .field("operation_timeout", &self.operation_timeout)
            .finish()
    }
}

impl CacheProvider {
    /// Create a cache provider from configuration with graceful degradation
    ///
    /// If Redis is configured but fails to connect, logs a warning and
    /// returns a NoOp provider instead. Startup never fails because of the
    /// cache.
    pub async fn from_config_graceful(
        config: &CacheConfig,
        cb_config: Option<&CircuitBreakerConfig>,
    ) -> Self {
        let backend = Self::create_backend(config).await;

        let circuit_breaker = if backend.is_distributed() && backend.is_enabled() {
            cb_config.filter(|cb| cb.enabled).map(|cb_cfg| {
                info!(
                    failure_threshold = cb_cfg.failure_threshold,
                    timeout_seconds = cb_cfg.timeout_seconds,
                    "Cache circuit breaker initialized"
                );
                Arc::new(CircuitBreaker::new(
                    "cache".to_string(),
                    cb_cfg.to_resilience_config(),
                ))
            })
        } else {
            None
        };

        Self {
            backend,
            circuit_breaker,
            default_ttl: config.default_ttl(),
            operation_timeout: config.operation_timeout(),
        }
    }

    async fn create_backend(config: &CacheConfig) -> CacheBackend {
        match config.backend {
            CacheBackendKind::Redis => match RedisCacheService::from_config(&config.redis).await {
                Ok(service) => {
                    info!(backend = "redis", "✅ Distributed cache provider initialized");
                    CacheBackend::Redis(Box::new(service))
                }
                Err(e) => {
                    warn!(
                        error = %e,
                        "Failed to connect to Redis, falling back to NoOp cache (graceful degradation)"
                    );
                    CacheBackend::NoOp(NoOpCacheService::new())
                }
            },
            CacheBackendKind::Memory => {
                info!(backend = "memory", "In-memory cache provider initialized");
                CacheBackend::Memory(MemoryCacheService::new())
            }
            CacheBackendKind::Noop => {
                info!("Cache disabled by configuration");
                CacheBackend::NoOp(NoOpCacheService::new())
            }
        }
    }

    /// Create a NoOp provider (for explicit opt-out or testing)
    pub fn noop() -> Self {
        Self::with_backend(CacheBackend::NoOp(NoOpCacheService::new()))
    }

    /// Wrap an existing in-memory service; clones of `service` observe the same entries
    pub fn memory(service: MemoryCacheService) -> Self {
        Self::with_backend(CacheBackend::Memory(service))
    }

    /// Wrap an already-connected Redis service behind a circuit breaker
    pub fn redis(service: RedisCacheService, cb_config: &CircuitBreakerConfig) -> Self {
        let mut provider = Self::with_backend(CacheBackend::Redis(Box::new(service)));
        provider.circuit_breaker = Some(Arc::new(CircuitBreaker::new(
            "cache".to_string(),
            cb_config.to_resilience_config(),
        )));
        provider
    }

    fn with_backend(backend: CacheBackend) -> Self {
        Self {
            backend,
            circuit_breaker: None,
            default_ttl: None,
            operation_timeout: DEFAULT_OPERATION_TIMEOUT,
        }
    }

    /// Override the TTL applied by [`set_json`](Self::set_json)
    pub fn with_default_ttl(mut self, ttl: Option<Duration>) -> Self {
        self.default_ttl = ttl;
        self
    }

    pub fn with_operation_timeout(mut self, timeout: Duration) -> Self {
        self.operation_timeout = timeout;
        self
    }

    /// Check if caching is actually enabled (not NoOp)
    pub fn is_enabled(&self) -> bool {
        self.backend.is_enabled()
    }

    pub fn is_distributed(&self) -> bool {
        self.backend.is_distributed()
    }

    pub fn provider_name(&self) -> &'static str {
        self.backend.provider_name()
    }

    /// Get current circuit breaker state (for monitoring)
    pub fn circuit_state(&self) -> Option<CircuitState> {
        self.circuit_breaker.as_ref().map(|cb| cb.state())
    }

    pub fn default_ttl(&self) -> Option<Duration> {
        self.default_ttl
    }

    /// Run one backend call under the timeout and, when present, the breaker
    async fn guarded<T, F, Fut>(&self, operation: &'static str, key: &str, call: F) -> Option<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = CacheResult<T>>,
    {
        let timeout = self.operation_timeout;
        let bounded = || async move {
            tokio::time::timeout(timeout, call())
                .await
                .unwrap_or_else(|_| {
                    Err(CacheError::Timeout(format!(
                        "{operation} exceeded {}ms",
                        timeout.as_millis()
                    )))
                })
        };

        let result = match &self.circuit_breaker {
            Some(cb) => cb.call(bounded).await.map_err(|e| match e {
                CircuitBreakerError::CircuitOpen { component } => {
                    CacheError::ConnectionError(format!("circuit open for {component}"))
                }
                CircuitBreakerError::OperationFailed(inner) => inner,
            }),
            None => bounded().await,
        };

        match result {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(
                    key = key,
                    operation = operation,
                    provider = self.provider_name(),
                    error = %e,
                    "Cache operation failed, degrading"
                );
                None
            }
        }
    }

    /// Get a value; misses and failures both yield `None`
    pub async fn get(&self, key: &str) -> Option<String> {
        if !self.is_enabled() {
            return None;
        }
        self.guarded("get", key, || self.backend.get(key))
            .await
            .flatten()
    }

    /// Store a value, best effort
    pub async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) {
        if !self.is_enabled() {
            return;
        }
        self.guarded("set", key, || self.backend.set(key, value, ttl))
            .await;
    }

    /// Remove a key, best effort
    pub async fn delete(&self, key: &str) {
        if !self.is_enabled() {
            return;
        }
        self.guarded("delete", key, || self.backend.delete(key))
            .await;
    }

    /// Typed read; an undecodable snapshot is dropped and treated as a miss
    pub async fn get_json<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let raw = self.get(key).await?;
        match serde_json::from_str(&raw) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(key = key, error = %e, "Discarding corrupt cache snapshot");
                self.delete(key).await;
                None
            }
        }
    }

    /// Typed write using the provider's default TTL
    pub async fn set_json<T: Serialize>(&self, key: &str, value: &T) {
        match serde_json::to_string(value) {
            Ok(raw) => self.set(key, &raw, self.default_ttl).await,
            Err(e) => {
                warn!(
                    key = key,
                    error = %CacheError::SerializationError(e.to_string()),
                    "Skipping cache write"
                );
            }
        }
    }

    /// Backend health; open circuit or failure reads as unhealthy
    pub async fn health_check(&self) -> bool {
        let healthy = self
            .guarded("health_check", "-", || self.backend.health_check())
            .await
            .unwrap_or(false);
        debug!(provider = self.provider_name(), healthy = healthy, "Cache health check");
        healthy
    }
}
