//! # Catalog Context
//!
//! Owner of the process-wide handles: the PostgreSQL pool, the cache
//! provider and the messaging provider. Built once at startup, cloned into
//! the request path and the worker, and torn down with [`CatalogContext::shutdown`].

use crate::cache::CacheProvider;
use crate::config::{CatalogConfig, ConfigManager};
use crate::database::DatabaseConnection;
use crate::error::{CatalogError, Result};
use crate::imaging::{ArtifactStore, HttpImageFetcher, ImageFetcher, LocalArtifactStore};
use crate::messaging::{ImageQueue, MessagingProvider};
use crate::repository::{PgProductRepository, ProductRepository};
use crate::services::ProductService;
use crate::worker::CompressionWorker;
use std::sync::Arc;
use tracing::{info, warn};

/// Shared dependencies for the catalog service and the compression worker
#[derive(Clone)]
pub struct CatalogContext {
    /// Configuration manager with environment-aware loading
    pub config_manager: Arc<ConfigManager>,

    /// Present only when the repository is PostgreSQL-backed
    pub database: Option<DatabaseConnection>,

    pub repository: Arc<dyn ProductRepository>,

    /// Fail-open cache; NoOp when Redis was unreachable at startup
    pub cache: CacheProvider,

    pub messaging: Arc<MessagingProvider>,

    /// Image compression queue over `messaging`
    pub queue: ImageQueue,
}

impl std::fmt::Debug for CatalogContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CatalogContext")
            .field("environment", &self.config_manager.environment())
            .field(
                "database",
                &self
                    .database
                    .as_ref()
                    .map(|db| format!("PgPool(size={})", db.pool().size()))
                    .unwrap_or_else(|| "None".to_string()),
            )
            .field("repository", &"Arc<dyn ProductRepository>")
            .field("cache", &self.cache.provider_name())
            .field("messaging", &self.messaging.provider_name())
            .field("queue", &self.queue.queue_name())
            .finish()
    }
}

impl CatalogContext {
    /// Load configuration from the environment and build the context
    pub async fn new() -> Result<Self> {
        let config_manager = ConfigManager::load()?;
        Self::from_config(config_manager).await
    }

    /// Connect every configured backend
    ///
    /// PostgreSQL and the queue broker must be reachable; the cache degrades
    /// to NoOp when it is not.
    pub async fn from_config(config_manager: Arc<ConfigManager>) -> Result<Self> {
        info!(
            environment = config_manager.environment(),
            "🔧 Initializing CatalogContext from configuration"
        );
        let config = config_manager.config();

        let database = DatabaseConnection::connect(&config.database).await?;
        if config.database.run_migrations {
            database.run_migrations().await?;
        }
        let repository: Arc<dyn ProductRepository> = Arc::new(PgProductRepository::new(
            &database,
            config.database.statement_timeout(),
        ));

        let cache =
            CacheProvider::from_config_graceful(&config.cache, Some(&config.circuit_breaker)).await;

        let messaging = Arc::new(MessagingProvider::from_config(&config.queue).await?);

        let mut context =
            Self::assemble(config_manager.clone(), repository, cache, messaging).await?;
        context.database = Some(database);

        info!(
            cache = context.cache.provider_name(),
            messaging = context.messaging.provider_name(),
            queue_name = context.queue.queue_name(),
            "✅ CatalogContext initialized"
        );
        Ok(context)
    }

    /// Build a context over caller-supplied components
    ///
    /// Used by tests and embedders that bring their own repository or cache.
    pub async fn with_components(
        config_manager: Arc<ConfigManager>,
        repository: Arc<dyn ProductRepository>,
        cache: CacheProvider,
        messaging: Arc<MessagingProvider>,
    ) -> Result<Self> {
        Self::assemble(config_manager, repository, cache, messaging).await
    }

    /// Fully in-process context: in-memory repository, cache and queue
    pub async fn in_memory(config: CatalogConfig) -> Result<Self> {
        let config_manager = ConfigManager::from_config(config)?;
        let cache = CacheProvider::memory(crate::cache::MemoryCacheService::new())
            .with_default_ttl(config_manager.config().cache.default_ttl())
            .with_operation_timeout(config_manager.config().cache.operation_timeout());
        Self::assemble(
            config_manager,
            Arc::new(crate::repository::InMemoryProductRepository::new()),
            cache,
            Arc::new(MessagingProvider::in_memory()),
        )
        .await
    }

    async fn assemble(
        config_manager: Arc<ConfigManager>,
        repository: Arc<dyn ProductRepository>,
        cache: CacheProvider,
        messaging: Arc<MessagingProvider>,
    ) -> Result<Self> {
        let queue = ImageQueue::new(messaging.clone(), config_manager.config().queue.clone());
        queue.initialize().await?;

        Ok(Self {
            config_manager,
            database: None,
            repository,
            cache,
            messaging,
            queue,
        })
    }

    pub fn config(&self) -> &CatalogConfig {
        self.config_manager.config()
    }

    pub fn product_service(&self) -> ProductService {
        ProductService::new(self.repository.clone(), self.cache.clone(), self.queue.clone())
    }

    /// Worker fetching over HTTP and writing to `worker.artifact_dir`
    pub fn compression_worker(&self) -> Result<CompressionWorker> {
        let worker_config = &self.config().worker;
        let fetcher = HttpImageFetcher::new(worker_config)
            .map_err(|e| CatalogError::ConfigurationError(e.to_string()))?;
        let store = LocalArtifactStore::new(worker_config.artifact_dir.clone());
        info!(
            artifact_dir = %store.root().display(),
            target_width = worker_config.target_width,
            "Compression worker writes artifacts locally"
        );
        Ok(self.compression_worker_with(Arc::new(fetcher), Arc::new(store)))
    }

    /// Worker over caller-supplied fetcher and artifact store
    pub fn compression_worker_with(
        &self,
        fetcher: Arc<dyn ImageFetcher>,
        store: Arc<dyn ArtifactStore>,
    ) -> CompressionWorker {
        CompressionWorker::new(
            self.repository.clone(),
            self.cache.clone(),
            self.queue.clone(),
            fetcher,
            store,
            &self.config().worker,
        )
    }

    /// Close the broker connection and the database pool
    pub async fn shutdown(&self) {
        info!("🛑 Shutting down CatalogContext");
        if let Err(e) = self.messaging.close().await {
            warn!(error = %e, "Failed to close messaging provider cleanly");
        }
        if let Some(database) = &self.database {
            database.close().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{CacheBackendKind, MessagingBackendKind};
    use crate::models::NewProduct;

    fn in_memory_config() -> CatalogConfig {
        let mut config = CatalogConfig::default();
        config.cache.backend = CacheBackendKind::Memory;
        config.queue.backend = MessagingBackendKind::InMemory;
        config
    }

    #[tokio::test]
    async fn test_in_memory_context_wires_components() {
        let context = CatalogContext::in_memory(in_memory_config()).await.unwrap();
        assert!(context.database.is_none());
        assert_eq!(context.cache.provider_name(), "memory");
        assert_eq!(context.messaging.provider_name(), "in_memory");
        assert_eq!(context.queue.queue_name(), "image_processing");

        let service = context.product_service();
        let created = service
            .create_product(NewProduct {
                owner_id: 1,
                name: "Lamp".to_string(),
                description: String::new(),
                price: 19.99,
                source_images: vec!["http://img.example/lamp.jpg".to_string()],
            })
            .await
            .unwrap();
        assert_eq!(created.product_id, 1);
        assert_eq!(context.queue.stats().await.unwrap().message_count, 1);

        context.shutdown().await;
    }

    #[tokio::test]
    async fn test_compression_worker_builds_from_config() {
        let context = CatalogContext::in_memory(in_memory_config()).await.unwrap();
        assert!(context.compression_worker().is_ok());
    }
}
