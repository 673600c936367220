//! # Image Queue
//!
//! The channel between product writes and the compression worker.
//!
//! [`ImageQueue::publish`] enqueues an [`ImageCompressionJob`];
//! [`ImageQueue::consume`] turns the queue into an endless stream of
//! [`Delivery`] values. Each delivery must be settled exactly once:
//!
//! - [`Delivery::ack`] after the derived images are durably written
//! - [`Delivery::retry`] after a retryable failure: the job is republished
//!   with `attempt + 1` after a backoff, or dead-lettered once
//!   `max_attempts` is reached
//! - [`Delivery::dead_letter`] for jobs that can never succeed
//!
//! Payloads that do not decode as a job are dead-lettered by the stream
//! itself and never reach the consumer.
//!
//! Under [`AckPolicy::OnDelivery`] the stream acks before yielding, which
//! makes every settle call a no-op and loses the job if the consumer dies.

use std::collections::VecDeque;
use std::sync::Arc;

use futures::stream::{self, BoxStream, StreamExt};
use tracing::{debug, info, warn};

use super::message::ImageCompressionJob;
use super::provider::MessagingProvider;
use super::traits::QueueMessage;
use super::types::{AckPolicy, MessageId, QueueStats, QueuedMessage, ReceiptHandle};
use super::MessagingError;
use crate::config::QueueConfig;

/// Jobs fetched per poll; one job is in flight at a time
const RECEIVE_BATCH: usize = 1;

/// Publishing and consuming handle for the image compression queue
#[derive(Debug, Clone)]
pub struct ImageQueue {
    provider: Arc<MessagingProvider>,
    config: Arc<QueueConfig>,
}

impl ImageQueue {
    pub fn new(provider: Arc<MessagingProvider>, config: QueueConfig) -> Self {
        Self {
            provider,
            config: Arc::new(config),
        }
    }

    pub fn queue_name(&self) -> &str {
        &self.config.queue_name
    }

    pub fn ack_policy(&self) -> AckPolicy {
        self.config.ack_policy
    }

    pub fn provider(&self) -> &Arc<MessagingProvider> {
        &self.provider
    }

    /// Declare the queue and its dead-letter destination
    pub async fn initialize(&self) -> Result<(), MessagingError> {
        self.provider.ensure_queue(self.queue_name()).await?;
        info!(
            queue_name = self.queue_name(),
            provider = self.provider.provider_name(),
            ack_policy = ?self.config.ack_policy,
            "✅ Image queue ready"
        );
        Ok(())
    }

    /// Enqueue a job, bounded by `publish_timeout_ms`
    pub async fn publish(&self, job: &ImageCompressionJob) -> Result<MessageId, MessagingError> {
        let timeout = self.config.publish_timeout();
        let message_id = tokio::time::timeout(
            timeout,
            self.provider.send_message(self.queue_name(), job),
        )
        .await
        .map_err(|_| MessagingError::timeout("publish", timeout.as_millis() as u64))??;

        debug!(
            queue_name = self.queue_name(),
            product_id = job.product_id,
            attempt = job.attempt,
            message_id = %message_id,
            "Published image compression job"
        );
        Ok(message_id)
    }

    pub async fn stats(&self) -> Result<QueueStats, MessagingError> {
        self.provider.queue_stats(self.queue_name()).await
    }

    /// Endless stream of deliveries, polling every `poll_interval_ms` while empty
    ///
    /// Receive failures are yielded as `Err` items; the stream keeps polling
    /// afterwards and the consumer decides whether the error is fatal.
    pub fn consume(&self) -> BoxStream<'static, Result<Delivery, MessagingError>> {
        struct ConsumeState {
            queue: ImageQueue,
            buffered: VecDeque<Delivery>,
            pause: bool,
        }

        let state = ConsumeState {
            queue: self.clone(),
            buffered: VecDeque::new(),
            pause: false,
        };

        stream::unfold(state, |mut state| async move {
            loop {
                if let Some(delivery) = state.buffered.pop_front() {
                    return Some((Ok(delivery), state));
                }
                if state.pause {
                    tokio::time::sleep(state.queue.config.poll_interval()).await;
                    state.pause = false;
                }
                match state.queue.next_batch().await {
                    Ok(batch) if batch.is_empty() => state.pause = true,
                    Ok(batch) => state.buffered = batch,
                    Err(e) => {
                        state.pause = true;
                        return Some((Err(e), state));
                    }
                }
            }
        })
        .boxed()
    }

    async fn next_batch(&self) -> Result<VecDeque<Delivery>, MessagingError> {
        let received = self
            .provider
            .receive_messages(
                self.queue_name(),
                RECEIVE_BATCH,
                self.config.visibility_timeout(),
            )
            .await?;

        let mut batch = VecDeque::with_capacity(received.len());
        for raw in received {
            if let Some(delivery) = self.decode(raw).await? {
                batch.push_back(delivery);
            }
        }
        Ok(batch)
    }

    /// Decode one raw message; poison payloads are dead-lettered and skipped
    async fn decode(&self, raw: QueuedMessage<Vec<u8>>) -> Result<Option<Delivery>, MessagingError> {
        let job = match ImageCompressionJob::from_bytes(&raw.message) {
            Ok(job) => job,
            Err(e) => {
                warn!(
                    queue_name = self.queue_name(),
                    receipt = %raw.receipt_handle,
                    error = %e,
                    "Dead-lettering undecodable message"
                );
                self.provider
                    .nack_message(self.queue_name(), &raw.receipt_handle, false)
                    .await?;
                return Ok(None);
            }
        };

        let settled = match self.config.ack_policy {
            AckPolicy::AfterSuccess => false,
            AckPolicy::OnDelivery => {
                self.provider
                    .ack_message(self.queue_name(), &raw.receipt_handle)
                    .await?;
                true
            }
        };

        debug!(
            queue_name = self.queue_name(),
            product_id = job.product_id,
            attempt = job.attempt,
            receive_count = raw.receive_count,
            "Received image compression job"
        );

        Ok(Some(Delivery {
            job,
            receipt_handle: raw.receipt_handle,
            receive_count: raw.receive_count,
            settled,
            queue: self.clone(),
        }))
    }
}

/// What [`Delivery::retry`] did with a failed job
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryOutcome {
    /// Republished as `attempt`
    Requeued { attempt: u32 },
    /// Attempts exhausted; moved to the dead-letter queue
    DeadLettered,
    /// Already acked on delivery; the job is lost
    Dropped,
}

/// One received job awaiting settlement
#[derive(Debug)]
pub struct Delivery {
    job: ImageCompressionJob,
    receipt_handle: ReceiptHandle,
    receive_count: u32,
    settled: bool,
    queue: ImageQueue,
}

impl Delivery {
    pub fn job(&self) -> &ImageCompressionJob {
        &self.job
    }

    /// Broker-side delivery count (crash redeliveries, not job attempts)
    pub fn receive_count(&self) -> u32 {
        self.receive_count
    }

    /// True when the message was already acked by the stream
    pub fn is_settled(&self) -> bool {
        self.settled
    }

    /// Remove the job from the queue
    pub async fn ack(self) -> Result<(), MessagingError> {
        if self.settled {
            return Ok(());
        }
        self.queue
            .provider
            .ack_message(self.queue.queue_name(), &self.receipt_handle)
            .await
    }

    /// Schedule another attempt, or dead-letter once attempts are exhausted
    ///
    /// The republish happens before the original is acked, so a failure in
    /// between leaves the original to be redelivered rather than lost.
    pub async fn retry(self, reason: &str) -> Result<RetryOutcome, MessagingError> {
        let queue = &self.queue;
        let attempt = self.job.attempt;

        if self.settled {
            warn!(
                product_id = self.job.product_id,
                attempt = attempt,
                reason = reason,
                "Job failed after on-delivery ack; dropping"
            );
            return Ok(RetryOutcome::Dropped);
        }

        if attempt >= queue.config.max_attempts {
            warn!(
                queue_name = queue.queue_name(),
                product_id = self.job.product_id,
                attempt = attempt,
                reason = reason,
                "Attempts exhausted, dead-lettering job"
            );
            queue
                .provider
                .nack_message(queue.queue_name(), &self.receipt_handle, false)
                .await?;
            return Ok(RetryOutcome::DeadLettered);
        }

        let backoff = queue.config.retry_backoff(attempt);
        let next = self.job.next_attempt();
        warn!(
            queue_name = queue.queue_name(),
            product_id = self.job.product_id,
            attempt = attempt,
            backoff_ms = backoff.as_millis() as u64,
            reason = reason,
            "Job failed, scheduling retry"
        );

        tokio::time::sleep(backoff).await;
        queue.publish(&next).await?;
        queue
            .provider
            .ack_message(queue.queue_name(), &self.receipt_handle)
            .await?;

        Ok(RetryOutcome::Requeued {
            attempt: next.attempt,
        })
    }

    /// Move the job straight to the dead-letter queue
    pub async fn dead_letter(self, reason: &str) -> Result<(), MessagingError> {
        if self.settled {
            return Ok(());
        }
        warn!(
            queue_name = self.queue.queue_name(),
            product_id = self.job.product_id,
            reason = reason,
            "Dead-lettering job"
        );
        self.queue
            .provider
            .nack_message(self.queue.queue_name(), &self.receipt_handle, false)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MessagingBackendKind;
    use std::time::Duration;

    fn config(ack_policy: AckPolicy) -> QueueConfig {
        QueueConfig {
            backend: MessagingBackendKind::InMemory,
            ack_policy,
            poll_interval_ms: 5,
            max_attempts: 2,
            retry_backoff_ms: 1,
            ..QueueConfig::default()
        }
    }

    async fn queue(ack_policy: AckPolicy) -> ImageQueue {
        let queue = ImageQueue::new(Arc::new(MessagingProvider::in_memory()), config(ack_policy));
        queue.initialize().await.unwrap();
        queue
    }

    fn job(product_id: i64) -> ImageCompressionJob {
        ImageCompressionJob::new(product_id, vec!["http://a/1.png".to_string()])
    }

    async fn next(stream: &mut BoxStream<'static, Result<Delivery, MessagingError>>) -> Delivery {
        tokio::time::timeout(Duration::from_secs(2), stream.next())
            .await
            .expect("delivery within timeout")
            .expect("stream is endless")
            .expect("delivery is ok")
    }

    #[tokio::test]
    async fn test_consume_yields_published_jobs_in_order() {
        let queue = queue(AckPolicy::AfterSuccess).await;
        queue.publish(&job(1)).await.unwrap();
        queue.publish(&job(2)).await.unwrap();

        let mut stream = queue.consume();
        let first = next(&mut stream).await;
        assert_eq!(first.job().product_id, 1);
        first.ack().await.unwrap();
        let second = next(&mut stream).await;
        assert_eq!(second.job().product_id, 2);
        second.ack().await.unwrap();

        assert_eq!(queue.stats().await.unwrap().message_count, 0);
    }

    #[tokio::test]
    async fn test_unacked_delivery_stays_in_queue() {
        let queue = queue(AckPolicy::AfterSuccess).await;
        queue.publish(&job(1)).await.unwrap();

        let mut stream = queue.consume();
        let delivery = next(&mut stream).await;
        assert!(!delivery.is_settled());
        drop(delivery);

        let stats = queue.stats().await.unwrap();
        assert_eq!(stats.message_count, 1);
        assert_eq!(stats.in_flight_count, Some(1));
    }

    #[tokio::test]
    async fn test_on_delivery_policy_acks_before_yield() {
        let queue = queue(AckPolicy::OnDelivery).await;
        queue.publish(&job(1)).await.unwrap();

        let mut stream = queue.consume();
        let delivery = next(&mut stream).await;
        assert!(delivery.is_settled());
        assert_eq!(queue.stats().await.unwrap().message_count, 0);
        assert_eq!(delivery.retry("boom").await.unwrap(), RetryOutcome::Dropped);
    }

    #[tokio::test]
    async fn test_retry_republishes_then_dead_letters() {
        let queue = queue(AckPolicy::AfterSuccess).await;
        queue.publish(&job(7)).await.unwrap();
        let mut stream = queue.consume();

        let first = next(&mut stream).await;
        assert_eq!(
            first.retry("store down").await.unwrap(),
            RetryOutcome::Requeued { attempt: 2 }
        );

        let second = next(&mut stream).await;
        assert_eq!(second.job().attempt, 2);
        assert_eq!(
            second.retry("store down").await.unwrap(),
            RetryOutcome::DeadLettered
        );

        let stats = queue.stats().await.unwrap();
        assert_eq!(stats.message_count, 0);
        assert_eq!(stats.dead_letter_count, Some(1));
    }

    #[tokio::test]
    async fn test_poison_message_is_dead_lettered_and_skipped() {
        let queue = queue(AckPolicy::AfterSuccess).await;
        queue
            .provider()
            .send_message(queue.queue_name(), &serde_json::json!("not a job"))
            .await
            .unwrap();
        queue.publish(&job(3)).await.unwrap();

        let mut stream = queue.consume();
        let delivery = next(&mut stream).await;
        assert_eq!(delivery.job().product_id, 3);

        let stats = queue.stats().await.unwrap();
        assert_eq!(stats.dead_letter_count, Some(1));
    }

    #[tokio::test]
    async fn test_broker_outage_surfaces_as_stream_error() {
        let queue = queue(AckPolicy::AfterSuccess).await;
        queue
            .provider()
            .as_in_memory()
            .unwrap()
            .simulate_outage(true);

        let mut stream = queue.consume();
        let item = tokio::time::timeout(Duration::from_secs(2), stream.next())
            .await
            .unwrap()
            .unwrap();
        assert!(item.unwrap_err().is_connection_failure());
        assert!(queue.publish(&job(1)).await.unwrap_err().is_connection_failure());
    }
}
