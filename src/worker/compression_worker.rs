use super::CompressionStage;
use crate::cache::CacheProvider;
use crate::config::WorkerConfig;
use crate::error::CatalogError;
use crate::imaging::{artifact_name, ArtifactStore, ImageCompressor, ImageFetcher, ImagingError};
use crate::messaging::{Delivery, ImageCompressionJob, ImageQueue, MessagingError, RetryOutcome};
use crate::models::{image_list, Product};
use crate::repository::ProductRepository;
use futures::stream::{self, StreamExt};
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// How one job was settled
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutcome {
    /// Derived images written, cache invalidated, message acked
    Completed {
        product_id: i64,
        derived: usize,
        failed: usize,
    },
    /// Product's source images changed after the job was queued; acked without writing
    Stale { product_id: i64 },
    /// Product no longer exists; acked and dropped
    ProductMissing { product_id: i64 },
    /// Retryable repository failure
    Retried(RetryOutcome),
    /// Non-retryable repository failure
    DeadLettered { product_id: i64 },
}

/// Per-run counters, returned when the worker stops
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WorkerStats {
    pub completed: u64,
    pub stale: u64,
    pub missing: u64,
    pub retried: u64,
    pub dead_lettered: u64,
}

impl WorkerStats {
    fn record(&mut self, outcome: &JobOutcome) {
        match outcome {
            JobOutcome::Completed { .. } => self.completed += 1,
            JobOutcome::Stale { .. } => self.stale += 1,
            JobOutcome::ProductMissing { .. } => self.missing += 1,
            JobOutcome::Retried(RetryOutcome::Requeued { .. }) => self.retried += 1,
            JobOutcome::Retried(RetryOutcome::DeadLettered) | JobOutcome::DeadLettered { .. } => {
                self.dead_lettered += 1
            }
            JobOutcome::Retried(RetryOutcome::Dropped) => {}
        }
    }

    pub fn processed(&self) -> u64 {
        self.completed + self.stale + self.missing + self.retried + self.dead_lettered
    }
}

/// Consumes [`ImageCompressionJob`]s and writes derived images back to the repository
pub struct CompressionWorker {
    repository: Arc<dyn ProductRepository>,
    cache: CacheProvider,
    queue: ImageQueue,
    fetcher: Arc<dyn ImageFetcher>,
    store: Arc<dyn ArtifactStore>,
    compressor: ImageCompressor,
    image_concurrency: usize,
}

impl std::fmt::Debug for CompressionWorker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompressionWorker")
            .field("queue", &self.queue.queue_name())
            .field("cache", &self.cache.provider_name())
            .field("compressor", &self.compressor)
            .field("image_concurrency", &self.image_concurrency)
            .finish()
    }
}

impl CompressionWorker {
    pub fn new(
        repository: Arc<dyn ProductRepository>,
        cache: CacheProvider,
        queue: ImageQueue,
        fetcher: Arc<dyn ImageFetcher>,
        store: Arc<dyn ArtifactStore>,
        config: &WorkerConfig,
    ) -> Self {
        Self {
            repository,
            cache,
            queue,
            fetcher,
            store,
            compressor: ImageCompressor::from_config(config),
            image_concurrency: config.image_concurrency.max(1),
        }
    }

    /// Consume jobs until `shutdown` resolves or the broker becomes unreachable
    ///
    /// A job already in progress when `shutdown` fires is finished and
    /// settled first. Broker connection failures end the loop with
    /// `CatalogError::TransportError`; any other queue error is logged and
    /// the affected message is left for redelivery.
    pub async fn run<F>(&self, shutdown: F) -> Result<WorkerStats, CatalogError>
    where
        F: Future<Output = ()> + Send,
    {
        tokio::pin!(shutdown);
        let mut deliveries = self.queue.consume();
        let mut stats = WorkerStats::default();

        info!(
            queue_name = self.queue.queue_name(),
            ack_policy = ?self.queue.ack_policy(),
            image_concurrency = self.image_concurrency,
            "🚀 Compression worker started"
        );

        loop {
            let next = tokio::select! {
                biased;
                _ = &mut shutdown => {
                    info!("🛑 Shutdown requested, stopping compression worker");
                    break;
                }
                next = deliveries.next() => next,
            };

            let delivery = match next {
                Some(Ok(delivery)) => delivery,
                Some(Err(e)) if e.is_connection_failure() => {
                    error!(error = %e, "Lost connection to the image queue");
                    return Err(e.into());
                }
                Some(Err(e)) => {
                    warn!(error = %e, "Failed to receive from the image queue");
                    continue;
                }
                None => break,
            };

            match self.handle_delivery(delivery).await {
                Ok(outcome) => stats.record(&outcome),
                Err(e) if e.is_connection_failure() => {
                    error!(error = %e, "Lost connection to the image queue while settling a job");
                    return Err(e.into());
                }
                Err(e) => {
                    warn!(error = %e, "Failed to settle job; it will be redelivered");
                }
            }
        }

        info!(
            completed = stats.completed,
            stale = stats.stale,
            missing = stats.missing,
            retried = stats.retried,
            dead_lettered = stats.dead_lettered,
            "Compression worker stopped"
        );
        Ok(stats)
    }

    /// Process one job and settle its message
    ///
    /// Order: re-read product, compress, write derived images, invalidate
    /// the cache, ack. The returned error is always a queue error; repository
    /// failures are turned into a retry or a dead-letter.
    pub async fn handle_delivery(&self, delivery: Delivery) -> Result<JobOutcome, MessagingError> {
        let job = delivery.job().clone();
        let product_id = job.product_id;

        debug!(
            product_id = product_id,
            attempt = job.attempt,
            images = job.source_images.len(),
            stage = %CompressionStage::Received,
            "Processing image compression job"
        );

        let product = match self.repository.get_by_id(product_id).await {
            Ok(product) => product,
            Err(e) => return self.settle_failure(delivery, product_id, e).await,
        };

        if !job.matches_sources(&product.source_images) {
            info!(
                product_id = product_id,
                "Source images changed since the job was queued, discarding"
            );
            delivery.ack().await?;
            return Ok(JobOutcome::Stale { product_id });
        }

        let derived = self.compress_images(&job).await;
        let failed = job.source_images.len() - derived.len();

        if let Err(e) = self
            .repository
            .update_derived_images(product_id, &derived)
            .await
        {
            return self.settle_failure(delivery, product_id, e).await;
        }

        self.cache.delete(&Product::cache_key(product_id)).await;
        delivery.ack().await?;

        info!(
            product_id = product_id,
            derived = derived.len(),
            failed = failed,
            stage = %CompressionStage::Persisted,
            "✅ Derived images persisted"
        );
        Ok(JobOutcome::Completed {
            product_id,
            derived: derived.len(),
            failed,
        })
    }

    async fn settle_failure(
        &self,
        delivery: Delivery,
        product_id: i64,
        error: CatalogError,
    ) -> Result<JobOutcome, MessagingError> {
        match error {
            CatalogError::NotFound(_) => {
                warn!(product_id = product_id, "Product no longer exists, dropping job");
                delivery.ack().await?;
                Ok(JobOutcome::ProductMissing { product_id })
            }
            e if e.is_retryable() => {
                let outcome = delivery.retry(&e.to_string()).await?;
                Ok(JobOutcome::Retried(outcome))
            }
            e => {
                delivery.dead_letter(&e.to_string()).await?;
                Ok(JobOutcome::DeadLettered { product_id })
            }
        }
    }

    /// Derive one artifact per source image, keeping source order
    ///
    /// Failed images are logged and left out; the result may be shorter
    /// than the input.
    pub async fn compress_images(&self, job: &ImageCompressionJob) -> Vec<String> {
        let product_id = job.product_id;
        let results: Vec<(usize, String, Result<String, ImagingError>)> =
            stream::iter(job.source_images.clone().into_iter().enumerate())
                .map(move |(index, reference)| async move {
                    let result = self.compress_one(product_id, index, &reference).await;
                    (index, reference, result)
                })
                .buffered(self.image_concurrency)
                .collect()
                .await;

        let mut derived = Vec::with_capacity(results.len());
        for (index, reference, result) in results {
            match result {
                Ok(artifact) => derived.push(artifact),
                Err(e) => warn!(
                    product_id = product_id,
                    index = index,
                    reference = %reference,
                    stage = %CompressionStage::Failed,
                    failed_at = %e.stage(),
                    error = %e,
                    "Skipping image"
                ),
            }
        }
        derived
    }

    async fn compress_one(
        &self,
        product_id: i64,
        index: usize,
        reference: &str,
    ) -> Result<String, ImagingError> {
        debug!(
            product_id = product_id,
            index = index,
            stage = %CompressionStage::Downloading,
            "Fetching source image"
        );
        let bytes = self.fetcher.fetch(reference).await?;

        let compressor = self.compressor;
        let encoded = tokio::task::spawn_blocking(move || compressor.compress(&bytes))
            .await
            .map_err(|e| ImagingError::Encode(format!("compression task failed: {e}")))??;

        let name = artifact_name(product_id, index, reference);
        let location = self.store.store(&name, &encoded).await?;
        // the location is persisted inside a delimited image list
        image_list::validate_reference(&location)
            .map_err(|e| ImagingError::storage(name, e.to_string()))?;
        Ok(location)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{CacheService, MemoryCacheService};
    use crate::config::{MessagingBackendKind, QueueConfig};
    use crate::imaging::LocalArtifactStore;
    use crate::messaging::{AckPolicy, MessagingProvider};
    use crate::models::NewProduct;
    use crate::repository::InMemoryProductRepository;
    use async_trait::async_trait;
    use futures::stream::BoxStream;
    use image::{DynamicImage, ImageOutputFormat, Rgb, RgbImage};
    use std::io::Cursor;
    use std::time::Duration;

    /// Serves a generated PNG for every reference not containing "broken"
    struct FakeFetcher;

    #[async_trait]
    impl ImageFetcher for FakeFetcher {
        async fn fetch(&self, reference: &str) -> Result<Vec<u8>, ImagingError> {
            if reference.contains("broken") {
                return Err(ImagingError::fetch(reference, "HTTP 404 Not Found"));
            }
            let image = RgbImage::from_pixel(40, 20, Rgb([10, 120, 200]));
            let mut bytes = Cursor::new(Vec::new());
            DynamicImage::ImageRgb8(image)
                .write_to(&mut bytes, ImageOutputFormat::Png)
                .unwrap();
            Ok(bytes.into_inner())
        }
    }

    struct Harness {
        worker: CompressionWorker,
        repository: Arc<InMemoryProductRepository>,
        cache: MemoryCacheService,
        queue: ImageQueue,
        _artifacts: tempfile::TempDir,
    }

    async fn harness() -> Harness {
        let repository = Arc::new(InMemoryProductRepository::new());
        let cache = MemoryCacheService::new();
        let queue = ImageQueue::new(
            Arc::new(MessagingProvider::in_memory()),
            QueueConfig {
                backend: MessagingBackendKind::InMemory,
                ack_policy: AckPolicy::AfterSuccess,
                poll_interval_ms: 5,
                max_attempts: 2,
                retry_backoff_ms: 1,
                ..QueueConfig::default()
            },
        );
        queue.initialize().await.unwrap();
        let artifacts = tempfile::tempdir().unwrap();

        let worker = CompressionWorker::new(
            repository.clone(),
            CacheProvider::memory(cache.clone()),
            queue.clone(),
            Arc::new(FakeFetcher),
            Arc::new(LocalArtifactStore::new(artifacts.path())),
            &WorkerConfig {
                target_width: 20,
                ..WorkerConfig::default()
            },
        );

        Harness {
            worker,
            repository,
            cache,
            queue,
            _artifacts: artifacts,
        }
    }

    async fn seed(repository: &InMemoryProductRepository, images: &[&str]) -> i64 {
        repository
            .save(&NewProduct {
                owner_id: 1,
                name: "Lamp".to_string(),
                description: String::new(),
                price: 19.99,
                source_images: images.iter().map(|s| s.to_string()).collect(),
            })
            .await
            .unwrap()
    }

    async fn next(stream: &mut BoxStream<'static, Result<Delivery, MessagingError>>) -> Delivery {
        tokio::time::timeout(Duration::from_secs(2), stream.next())
            .await
            .unwrap()
            .unwrap()
            .unwrap()
    }

    #[tokio::test]
    async fn test_partial_failure_keeps_order_and_skips_broken() {
        let h = harness().await;
        let images = ["http://a/1.png", "http://a/broken.png", "http://a/3.png"];
        let id = seed(&h.repository, &images).await;
        let job = ImageCompressionJob::new(id, images.iter().map(|s| s.to_string()).collect());
        h.queue.publish(&job).await.unwrap();

        let mut stream = h.queue.consume();
        let outcome = h.worker.handle_delivery(next(&mut stream).await).await.unwrap();
        assert_eq!(
            outcome,
            JobOutcome::Completed {
                product_id: id,
                derived: 2,
                failed: 1
            }
        );

        let product = h.repository.get_by_id(id).await.unwrap();
        assert_eq!(product.derived_images.len(), 2);
        assert!(product.derived_images[0].ends_with(&format!("compressed_{id}_0_1.jpg")));
        assert!(product.derived_images[1].ends_with(&format!("compressed_{id}_2_3.jpg")));
        assert_eq!(h.queue.stats().await.unwrap().message_count, 0);
    }

    #[tokio::test]
    async fn test_completion_invalidates_cached_snapshot() {
        let h = harness().await;
        let id = seed(&h.repository, &["http://a/1.png"]).await;
        h.cache
            .set(&Product::cache_key(id), r#"{"stale":true}"#, None)
            .await
            .unwrap();

        let job = ImageCompressionJob::new(id, vec!["http://a/1.png".to_string()]);
        h.queue.publish(&job).await.unwrap();
        let mut stream = h.queue.consume();
        h.worker.handle_delivery(next(&mut stream).await).await.unwrap();

        assert_eq!(h.cache.peek(&Product::cache_key(id)), None);
    }

    #[tokio::test]
    async fn test_stale_job_is_acked_without_writing() {
        let h = harness().await;
        let id = seed(&h.repository, &["http://a/new.png"]).await;
        let job = ImageCompressionJob::new(id, vec!["http://a/old.png".to_string()]);
        h.queue.publish(&job).await.unwrap();

        let mut stream = h.queue.consume();
        let outcome = h.worker.handle_delivery(next(&mut stream).await).await.unwrap();

        assert_eq!(outcome, JobOutcome::Stale { product_id: id });
        assert!(h.repository.get_by_id(id).await.unwrap().derived_images.is_empty());
        assert_eq!(h.queue.stats().await.unwrap().message_count, 0);
    }

    #[tokio::test]
    async fn test_missing_product_is_dropped() {
        let h = harness().await;
        let job = ImageCompressionJob::new(404, vec!["http://a/1.png".to_string()]);
        h.queue.publish(&job).await.unwrap();

        let mut stream = h.queue.consume();
        let outcome = h.worker.handle_delivery(next(&mut stream).await).await.unwrap();

        assert_eq!(outcome, JobOutcome::ProductMissing { product_id: 404 });
        let stats = h.queue.stats().await.unwrap();
        assert_eq!(stats.message_count, 0);
        assert_eq!(stats.dead_letter_count, Some(0));
    }

    #[tokio::test]
    async fn test_store_outage_retries_then_dead_letters() {
        let h = harness().await;
        let id = seed(&h.repository, &["http://a/1.png"]).await;
        h.queue
            .publish(&ImageCompressionJob::new(id, vec!["http://a/1.png".to_string()]))
            .await
            .unwrap();
        h.repository.set_unavailable(true);

        let mut stream = h.queue.consume();
        let first = h.worker.handle_delivery(next(&mut stream).await).await.unwrap();
        assert_eq!(
            first,
            JobOutcome::Retried(RetryOutcome::Requeued { attempt: 2 })
        );
        let second = h.worker.handle_delivery(next(&mut stream).await).await.unwrap();
        assert_eq!(second, JobOutcome::Retried(RetryOutcome::DeadLettered));

        assert_eq!(h.queue.stats().await.unwrap().dead_letter_count, Some(1));
    }

    #[tokio::test]
    async fn test_run_stops_on_shutdown() {
        let h = harness().await;
        let id = seed(&h.repository, &["http://a/1.png"]).await;
        h.queue
            .publish(&ImageCompressionJob::new(id, vec!["http://a/1.png".to_string()]))
            .await
            .unwrap();

        let repository = h.repository.clone();
        let shutdown = async move {
            while repository.get_by_id(id).await.unwrap().derived_images.is_empty() {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        };

        let stats = tokio::time::timeout(Duration::from_secs(5), h.worker.run(shutdown))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stats.completed, 1);
        assert_eq!(stats.processed(), 1);
    }

    #[tokio::test]
    async fn test_run_as_spawned_task() {
        let h = harness().await;
        let id = seed(&h.repository, &["http://a/1.png", "http://a/2.png"]).await;
        h.queue
            .publish(&ImageCompressionJob::new(
                id,
                vec!["http://a/1.png".to_string(), "http://a/2.png".to_string()],
            ))
            .await
            .unwrap();

        let Harness {
            worker,
            repository,
            _artifacts: artifacts,
            ..
        } = h;
        let (stop, stopped) = tokio::sync::oneshot::channel::<()>();
        let running = tokio::spawn(async move {
            worker
                .run(async {
                    let _ = stopped.await;
                })
                .await
        });

        tokio::time::timeout(Duration::from_secs(5), async {
            while repository.get_by_id(id).await.unwrap().derived_images.is_empty() {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();
        stop.send(()).unwrap();

        let stats = running.await.unwrap().unwrap();
        assert_eq!(stats.completed, 1);
        assert_eq!(repository.get_by_id(id).await.unwrap().derived_images.len(), 2);
        drop(artifacts);
    }

    #[tokio::test]
    async fn test_artifact_location_with_delimiter_is_skipped() {
        let h = harness().await;
        let id = seed(&h.repository, &["http://a/1.png"]).await;
        let root = tempfile::tempdir().unwrap();
        let worker = CompressionWorker::new(
            h.repository.clone(),
            CacheProvider::memory(h.cache.clone()),
            h.queue.clone(),
            Arc::new(FakeFetcher),
            Arc::new(LocalArtifactStore::new(root.path().join("art§ifacts"))),
            &WorkerConfig {
                target_width: 20,
                ..WorkerConfig::default()
            },
        );
        h.queue
            .publish(&ImageCompressionJob::new(id, vec!["http://a/1.png".to_string()]))
            .await
            .unwrap();

        let mut stream = h.queue.consume();
        let outcome = worker.handle_delivery(next(&mut stream).await).await.unwrap();

        assert_eq!(
            outcome,
            JobOutcome::Completed {
                product_id: id,
                derived: 0,
                failed: 1
            }
        );
        let stored = h.repository.get_by_id(id).await.unwrap();
        assert!(stored.derived_images.is_empty());
        assert_eq!(stored.source_images, vec!["http://a/1.png".to_string()]);
    }

    #[tokio::test]
    async fn test_run_fails_on_broker_outage() {
        let h = harness().await;
        h.queue
            .provider()
            .as_in_memory()
            .unwrap()
            .simulate_outage(true);

        let err = tokio::time::timeout(
            Duration::from_secs(5),
            h.worker.run(std::future::pending::<()>()),
        )
        .await
        .unwrap()
        .unwrap_err();
        assert!(matches!(err, CatalogError::TransportError(_)));
    }
}
