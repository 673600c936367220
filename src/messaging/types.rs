//! # Messaging Service Types
//!
//! Core types for the provider-agnostic messaging abstraction.

use serde::{Deserialize, Serialize};

/// Identifier assigned to a published message
///
/// The format is provider-specific:
/// - RabbitMQ: per-session publish counter
/// - InMemory: per-queue sequence number
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MessageId(pub String);

impl MessageId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for MessageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for MessageId {
    fn from(id: u64) -> Self {
        Self(id.to_string())
    }
}

/// Handle for acknowledging a received message
///
/// - RabbitMQ: delivery tag on the consuming channel
/// - InMemory: message sequence number
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ReceiptHandle(pub String);

impl ReceiptHandle {
    pub fn new(handle: impl Into<String>) -> Self {
        Self(handle.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Parse the handle as a numeric tag
    pub fn as_u64(&self) -> Option<u64> {
        self.0.parse().ok()
    }
}

impl std::fmt::Display for ReceiptHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for ReceiptHandle {
    fn from(id: u64) -> Self {
        Self(id.to_string())
    }
}

/// A message received from a queue with metadata
#[derive(Debug, Clone)]
pub struct QueuedMessage<T> {
    /// Handle for acknowledging this message
    pub receipt_handle: ReceiptHandle,

    pub message: T,

    /// Number of times the broker has handed this message out
    ///
    /// RabbitMQ only reports a redelivered flag, so it yields 1 or 2.
    pub receive_count: u32,

    pub enqueued_at: chrono::DateTime<chrono::Utc>,
}

impl<T> QueuedMessage<T> {
    pub fn new(
        receipt_handle: ReceiptHandle,
        message: T,
        receive_count: u32,
        enqueued_at: chrono::DateTime<chrono::Utc>,
    ) -> Self {
        Self {
            receipt_handle,
            message,
            receive_count,
            enqueued_at,
        }
    }
}

/// Queue statistics for monitoring
#[derive(Debug, Clone, PartialEq)]
pub struct QueueStats {
    pub queue_name: String,

    /// Messages waiting in the queue (visible + invisible)
    pub message_count: u64,

    /// Messages handed out but not yet settled, when the provider tracks it
    pub in_flight_count: Option<u64>,

    /// Messages parked in the dead-letter queue, when the provider can count them
    pub dead_letter_count: Option<u64>,
}

impl QueueStats {
    pub fn new(queue_name: impl Into<String>, message_count: u64) -> Self {
        Self {
            queue_name: queue_name.into(),
            message_count,
            in_flight_count: None,
            dead_letter_count: None,
        }
    }

    pub fn with_in_flight_count(mut self, count: u64) -> Self {
        self.in_flight_count = Some(count);
        self
    }

    pub fn with_dead_letter_count(mut self, count: u64) -> Self {
        self.dead_letter_count = Some(count);
        self
    }
}

/// When a consumed job is acknowledged
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AckPolicy {
    /// Ack only after the derived images are durably written (at-least-once)
    #[default]
    AfterSuccess,
    /// Ack as soon as the job is received (at-most-once; a crash loses the job)
    OnDelivery,
}
