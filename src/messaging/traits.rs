//! # Messaging Service Traits
//!
//! Core trait definitions for provider-agnostic messaging.

use std::time::Duration;

use async_trait::async_trait;

use super::types::{MessageId, QueueStats, QueuedMessage, ReceiptHandle};
use super::MessagingError;

/// Core messaging service trait - provider-agnostic operations
///
/// Implementations provide the actual backend (RabbitMQ, InMemory). Every
/// provider must support:
///
/// - Idempotent queue creation, including a dead-letter destination
/// - Send, and receive with manual acknowledgement
/// - `nack(requeue = false)` routing the message to the dead-letter destination
///
/// Received payloads are handed back as raw bytes. Decoding belongs to the
/// caller so an undecodable message can still be acked or dead-lettered by
/// its receipt handle.
#[async_trait]
pub trait MessagingService: Send + Sync + 'static {
    /// Create a queue and its dead-letter destination if missing (idempotent)
    async fn ensure_queue(&self, queue_name: &str) -> Result<(), MessagingError>;

    /// Send a message to a queue
    ///
    /// Returns once the provider has accepted the message durably.
    async fn send_message<T: QueueMessage>(
        &self,
        queue_name: &str,
        message: &T,
    ) -> Result<MessageId, MessagingError>;

    /// Receive up to `max_messages` without acknowledging them
    ///
    /// Unacknowledged messages become visible again after `visibility_timeout`
    /// (in-memory) or when the consuming channel closes (RabbitMQ).
    async fn receive_messages(
        &self,
        queue_name: &str,
        max_messages: usize,
        visibility_timeout: Duration,
    ) -> Result<Vec<QueuedMessage<Vec<u8>>>, MessagingError>;

    /// Acknowledge successful processing (removes the message)
    async fn ack_message(
        &self,
        queue_name: &str,
        receipt_handle: &ReceiptHandle,
    ) -> Result<(), MessagingError>;

    /// Negative acknowledge
    ///
    /// * `requeue = true` - the message becomes deliverable again
    /// * `requeue = false` - the message moves to the dead-letter destination
    async fn nack_message(
        &self,
        queue_name: &str,
        receipt_handle: &ReceiptHandle,
        requeue: bool,
    ) -> Result<(), MessagingError>;

    async fn queue_stats(&self, queue_name: &str) -> Result<QueueStats, MessagingError>;

    /// Health check - verify the messaging backend is reachable
    async fn health_check(&self) -> Result<bool, MessagingError>;

    /// Provider name for logging
    fn provider_name(&self) -> &'static str;
}

/// Message serialization contract
pub trait QueueMessage: Send + Sync + Clone + 'static {
    fn to_bytes(&self) -> Result<Vec<u8>, MessagingError>;

    fn from_bytes(bytes: &[u8]) -> Result<Self, MessagingError>
    where
        Self: Sized;
}

/// JSON serialization for any serde-compatible type
impl<T> QueueMessage for T
where
    T: serde::Serialize + serde::de::DeserializeOwned + Send + Sync + Clone + 'static,
{
    fn to_bytes(&self) -> Result<Vec<u8>, MessagingError> {
        serde_json::to_vec(self).map_err(|e| MessagingError::message_serialization(e.to_string()))
    }

    fn from_bytes(bytes: &[u8]) -> Result<Self, MessagingError> {
        serde_json::from_slice(bytes)
            .map_err(|e| MessagingError::message_deserialization(e.to_string()))
    }
}
