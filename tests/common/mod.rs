//! Shared harness for in-memory catalog integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use catalog_core::cache::{CacheProvider, MemoryCacheService};
use catalog_core::config::{CacheBackendKind, CatalogConfig, ConfigManager, MessagingBackendKind};
use catalog_core::imaging::{ImageFetcher, ImagingError, LocalArtifactStore};
use catalog_core::messaging::{InMemoryMessagingService, MessagingProvider};
use catalog_core::repository::InMemoryProductRepository;
use catalog_core::{CatalogContext, CatalogError, CompressionWorker, NewProduct, WorkerStats};
use image::{DynamicImage, ImageOutputFormat, Rgb, RgbImage};
use std::future::Future;
use std::io::Cursor;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

/// Serves a generated PNG for every reference, except those containing
/// "missing" (fetch failure) or "corrupt" (undecodable bytes)
pub struct StubFetcher;

#[async_trait]
impl ImageFetcher for StubFetcher {
    async fn fetch(&self, reference: &str) -> Result<Vec<u8>, ImagingError> {
        if reference.contains("missing") {
            return Err(ImagingError::fetch(reference, "HTTP 404 Not Found"));
        }
        if reference.contains("corrupt") {
            return Ok(b"definitely not an image".to_vec());
        }
        Ok(png(64, 48))
    }
}

pub fn png(width: u32, height: u32) -> Vec<u8> {
    let image = RgbImage::from_pixel(width, height, Rgb([200, 80, 20]));
    let mut bytes = Cursor::new(Vec::new());
    DynamicImage::ImageRgb8(image)
        .write_to(&mut bytes, ImageOutputFormat::Png)
        .expect("encode test png");
    bytes.into_inner()
}

pub fn test_config() -> CatalogConfig {
    let mut config = CatalogConfig::default();
    config.cache.backend = CacheBackendKind::Memory;
    config.queue.backend = MessagingBackendKind::InMemory;
    config.queue.poll_interval_ms = 5;
    config.queue.retry_backoff_ms = 1;
    config.queue.max_attempts = 3;
    config.worker.target_width = 32;
    config
}

pub fn lamp() -> NewProduct {
    NewProduct {
        owner_id: 42,
        name: "Lamp".to_string(),
        description: "Adjustable desk lamp".to_string(),
        price: 19.99,
        source_images: vec![
            "https://img.example/lamp-front.jpg".to_string(),
            "https://img.example/lamp-side.jpg".to_string(),
        ],
    }
}

/// In-memory catalog with handles onto every backend for inspection
pub struct TestCatalog {
    pub context: CatalogContext,
    pub repository: Arc<InMemoryProductRepository>,
    pub cache: MemoryCacheService,
    pub artifacts: tempfile::TempDir,
}

impl TestCatalog {
    pub async fn new() -> Self {
        Self::with_config(test_config()).await
    }

    pub async fn with_config(config: CatalogConfig) -> Self {
        let repository = Arc::new(InMemoryProductRepository::new());
        let cache = MemoryCacheService::new();
        let context = CatalogContext::with_components(
            ConfigManager::from_config(config).expect("valid test config"),
            repository.clone(),
            CacheProvider::memory(cache.clone()),
            Arc::new(MessagingProvider::in_memory()),
        )
        .await
        .expect("in-memory context");

        Self {
            context,
            repository,
            cache,
            artifacts: tempfile::tempdir().expect("artifact dir"),
        }
    }

    pub fn broker(&self) -> &InMemoryMessagingService {
        self.context
            .messaging
            .as_in_memory()
            .expect("in-memory broker")
    }

    pub fn worker(&self) -> CompressionWorker {
        self.context.compression_worker_with(
            Arc::new(StubFetcher),
            Arc::new(LocalArtifactStore::new(self.artifacts.path())),
        )
    }

    /// Run a worker in the background until `done` resolves
    pub fn spawn_worker(&self) -> RunningWorker {
        let worker = self.worker();
        let (stop, stopped) = oneshot::channel::<()>();
        let handle = tokio::spawn(async move {
            worker
                .run(async {
                    let _ = stopped.await;
                })
                .await
        });
        RunningWorker { stop, handle }
    }
}

pub struct RunningWorker {
    stop: oneshot::Sender<()>,
    handle: JoinHandle<Result<WorkerStats, CatalogError>>,
}

impl RunningWorker {
    pub async fn stop(self) -> Result<WorkerStats, CatalogError> {
        let _ = self.stop.send(());
        tokio::time::timeout(Duration::from_secs(5), self.handle)
            .await
            .expect("worker stops within deadline")
            .expect("worker task did not panic")
    }
}

/// Poll `condition` every few milliseconds until it holds or the deadline passes
pub async fn eventually<F, Fut>(mut condition: F)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while !condition().await {
        assert!(
            tokio::time::Instant::now() < deadline,
            "condition not met within 5s"
        );
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}
