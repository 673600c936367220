//! # In-Memory Messaging Service
//!
//! Thread-safe in-memory queues for tests and development.
//!
//! - **Visibility timeout**: received messages stay invisible until acked,
//!   nacked, or the timeout lapses
//! - **Dead letters**: `nack(requeue = false)` parks the payload in a per-queue
//!   dead-letter list instead of dropping it
//! - **Simulated outage**: every call fails with a connection error while on

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use crate::messaging::traits::{MessagingService, QueueMessage};
use crate::messaging::types::{MessageId, QueueStats, QueuedMessage, ReceiptHandle};
use crate::messaging::MessagingError;

#[derive(Debug, Clone)]
struct InMemoryQueuedMessage {
    id: u64,
    payload: Vec<u8>,
    enqueued_at: DateTime<Utc>,
    /// When the message becomes visible again (None = visible now)
    visible_at: Option<DateTime<Utc>>,
    receive_count: u32,
}

#[derive(Debug)]
struct InMemoryQueue {
    messages: VecDeque<InMemoryQueuedMessage>,
    dead_letters: VecDeque<Vec<u8>>,
    next_id: u64,
}

impl InMemoryQueue {
    fn new() -> Self {
        Self {
            messages: VecDeque::new(),
            dead_letters: VecDeque::new(),
            next_id: 1,
        }
    }

    fn take(&mut self, receipt_handle: &ReceiptHandle) -> Result<InMemoryQueuedMessage, MessagingError> {
        let id = receipt_handle
            .as_u64()
            .ok_or_else(|| MessagingError::invalid_receipt_handle(receipt_handle.as_str()))?;
        let pos = self
            .messages
            .iter()
            .position(|m| m.id == id)
            .ok_or_else(|| MessagingError::message_not_found(id.to_string()))?;
        self.messages
            .remove(pos)
            .ok_or_else(|| MessagingError::message_not_found(id.to_string()))
    }
}

/// In-memory messaging service
///
/// ```rust
/// use catalog_core::messaging::{InMemoryMessagingService, MessagingService};
/// use std::time::Duration;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let service = InMemoryMessagingService::new();
/// service.ensure_queue("image_processing").await?;
/// service.send_message("image_processing", &serde_json::json!({"product_id": 1})).await?;
///
/// let received = service
///     .receive_messages("image_processing", 10, Duration::from_secs(30))
///     .await?;
/// assert_eq!(received.len(), 1);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Default)]
pub struct InMemoryMessagingService {
    queues: RwLock<HashMap<String, InMemoryQueue>>,
    outage: AtomicBool,
}

impl InMemoryMessagingService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every call fail with a connection error (or work again)
    pub fn simulate_outage(&self, down: bool) {
        self.outage.store(down, Ordering::SeqCst);
    }

    /// Messages in a queue, including in-flight ones
    pub async fn queue_length(&self, queue_name: &str) -> usize {
        let queues = self.queues.read().await;
        queues
            .get(queue_name)
            .map(|q| q.messages.len())
            .unwrap_or(0)
    }

    /// Payloads routed to the dead-letter list, oldest first
    pub async fn dead_letters(&self, queue_name: &str) -> Vec<Vec<u8>> {
        let queues = self.queues.read().await;
        queues
            .get(queue_name)
            .map(|q| q.dead_letters.iter().cloned().collect())
            .unwrap_or_default()
    }

    fn check_available(&self) -> Result<(), MessagingError> {
        if self.outage.load(Ordering::SeqCst) {
            return Err(MessagingError::connection("simulated broker outage"));
        }
        Ok(())
    }
}

#[async_trait]
impl MessagingService for InMemoryMessagingService {
    async fn ensure_queue(&self, queue_name: &str) -> Result<(), MessagingError> {
        self.check_available()?;
        let mut queues = self.queues.write().await;
        queues
            .entry(queue_name.to_string())
            .or_insert_with(InMemoryQueue::new);
        Ok(())
    }

    async fn send_message<T: QueueMessage>(
        &self,
        queue_name: &str,
        message: &T,
    ) -> Result<MessageId, MessagingError> {
        self.check_available()?;
        let payload = message.to_bytes()?;

        let mut queues = self.queues.write().await;
        let queue = queues
            .get_mut(queue_name)
            .ok_or_else(|| MessagingError::queue_not_found(queue_name))?;

        let id = queue.next_id;
        queue.next_id += 1;
        queue.messages.push_back(InMemoryQueuedMessage {
            id,
            payload,
            enqueued_at: Utc::now(),
            visible_at: None,
            receive_count: 0,
        });

        Ok(MessageId::from(id))
    }

    async fn receive_messages(
        &self,
        queue_name: &str,
        max_messages: usize,
        visibility_timeout: Duration,
    ) -> Result<Vec<QueuedMessage<Vec<u8>>>, MessagingError> {
        self.check_available()?;
        let mut queues = self.queues.write().await;
        let queue = queues
            .get_mut(queue_name)
            .ok_or_else(|| MessagingError::queue_not_found(queue_name))?;

        let now = Utc::now();
        let visible_until = now
            + chrono::Duration::from_std(visibility_timeout)
                .map_err(|e| MessagingError::configuration("visibility_timeout", e.to_string()))?;
        let mut received = Vec::new();

        for msg in queue.messages.iter_mut() {
            if received.len() >= max_messages {
                break;
            }

            let is_visible = msg.visible_at.map(|vt| vt <= now).unwrap_or(true);
            if is_visible {
                msg.visible_at = Some(visible_until);
                msg.receive_count += 1;
                received.push(QueuedMessage::new(
                    ReceiptHandle::from(msg.id),
                    msg.payload.clone(),
                    msg.receive_count,
                    msg.enqueued_at,
                ));
            }
        }

        Ok(received)
    }

    async fn ack_message(
        &self,
        queue_name: &str,
        receipt_handle: &ReceiptHandle,
    ) -> Result<(), MessagingError> {
        self.check_available()?;
        let mut queues = self.queues.write().await;
        let queue = queues
            .get_mut(queue_name)
            .ok_or_else(|| MessagingError::queue_not_found(queue_name))?;

        queue.take(receipt_handle)?;
        Ok(())
    }

    async fn nack_message(
        &self,
        queue_name: &str,
        receipt_handle: &ReceiptHandle,
        requeue: bool,
    ) -> Result<(), MessagingError> {
        self.check_available()?;
        let mut queues = self.queues.write().await;
        let queue = queues
            .get_mut(queue_name)
            .ok_or_else(|| MessagingError::queue_not_found(queue_name))?;

        if requeue {
            let id = receipt_handle
                .as_u64()
                .ok_or_else(|| MessagingError::invalid_receipt_handle(receipt_handle.as_str()))?;
            let msg = queue
                .messages
                .iter_mut()
                .find(|m| m.id == id)
                .ok_or_else(|| MessagingError::message_not_found(id.to_string()))?;
            msg.visible_at = None;
        } else {
            let msg = queue.take(receipt_handle)?;
            queue.dead_letters.push_back(msg.payload);
        }
        Ok(())
    }

    async fn queue_stats(&self, queue_name: &str) -> Result<QueueStats, MessagingError> {
        self.check_available()?;
        let queues = self.queues.read().await;
        let queue = queues
            .get(queue_name)
            .ok_or_else(|| MessagingError::queue_not_found(queue_name))?;

        let now = Utc::now();
        let in_flight = queue
            .messages
            .iter()
            .filter(|m| m.visible_at.map(|vt| vt > now).unwrap_or(false))
            .count() as u64;

        Ok(QueueStats::new(queue_name, queue.messages.len() as u64)
            .with_in_flight_count(in_flight)
            .with_dead_letter_count(queue.dead_letters.len() as u64))
    }

    async fn health_check(&self) -> Result<bool, MessagingError> {
        Ok(!self.outage.load(Ordering::SeqCst))
    }

    fn provider_name(&self) -> &'static str {
        "in_memory"
    }
}
