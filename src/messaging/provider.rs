//! # Messaging Provider Enum
//!
//! Enum dispatch over the messaging providers, avoiding trait objects
//! (`MessagingService` has generic methods and is not object safe).

use std::time::Duration;

use tracing::info;

use super::providers::{InMemoryMessagingService, RabbitMqMessagingService};
use super::traits::{MessagingService, QueueMessage};
use super::types::{MessageId, QueueStats, QueuedMessage, ReceiptHandle};
use super::MessagingError;
use crate::config::{MessagingBackendKind, QueueConfig};

#[derive(Debug)]
pub enum MessagingProvider {
    /// RabbitMQ provider (AMQP 0.9.1 via lapin)
    RabbitMq(Box<RabbitMqMessagingService>),

    /// In-memory provider for tests and development
    InMemory(InMemoryMessagingService),
}

impl MessagingProvider {
    /// Build the configured provider; a RabbitMQ connection failure is an error
    pub async fn from_config(config: &QueueConfig) -> Result<Self, MessagingError> {
        let provider = match config.backend {
            MessagingBackendKind::Rabbitmq => Self::RabbitMq(Box::new(
                RabbitMqMessagingService::from_config(&config.rabbitmq).await?,
            )),
            MessagingBackendKind::InMemory => Self::InMemory(InMemoryMessagingService::new()),
        };
        info!(provider = provider.provider_name(), "Messaging provider initialized");
        Ok(provider)
    }

    pub fn in_memory() -> Self {
        Self::InMemory(InMemoryMessagingService::new())
    }

    /// The in-memory service, for test inspection
    pub fn as_in_memory(&self) -> Option<&InMemoryMessagingService> {
        match self {
            Self::InMemory(s) => Some(s),
            Self::RabbitMq(_) => None,
        }
    }

    pub fn provider_name(&self) -> &'static str {
        match self {
            Self::RabbitMq(s) => s.provider_name(),
            Self::InMemory(s) => s.provider_name(),
        }
    }

    pub async fn ensure_queue(&self, queue_name: &str) -> Result<(), MessagingError> {
        match self {
            Self::RabbitMq(s) => s.ensure_queue(queue_name).await,
            Self::InMemory(s) => s.ensure_queue(queue_name).await,
        }
    }

    pub async fn send_message<T: QueueMessage>(
        &self,
        queue_name: &str,
        message: &T,
    ) -> Result<MessageId, MessagingError> {
        match self {
            Self::RabbitMq(s) => s.send_message(queue_name, message).await,
            Self::InMemory(s) => s.send_message(queue_name, message).await,
        }
    }

    pub async fn receive_messages(
        &self,
        queue_name: &str,
        max_messages: usize,
        visibility_timeout: Duration,
    ) -> Result<Vec<QueuedMessage<Vec<u8>>>, MessagingError> {
        match self {
            Self::RabbitMq(s) => {
                s.receive_messages(queue_name, max_messages, visibility_timeout)
                    .await
            }
            Self::InMemory(s) => {
                s.receive_messages(queue_name, max_messages, visibility_timeout)
                    .await
            }
        }
    }

    pub async fn ack_message(
        &self,
        queue_name: &str,
        receipt_handle: &ReceiptHandle,
    ) -> Result<(), MessagingError> {
        match self {
            Self::RabbitMq(s) => s.ack_message(queue_name, receipt_handle).await,
            Self::InMemory(s) => s.ack_message(queue_name, receipt_handle).await,
        }
    }

    pub async fn nack_message(
        &self,
        queue_name: &str,
        receipt_handle: &ReceiptHandle,
        requeue: bool,
    ) -> Result<(), MessagingError> {
        match self {
            Self::RabbitMq(s) => s.nack_message(queue_name, receipt_handle, requeue).await,
            Self::InMemory(s) => s.nack_message(queue_name, receipt_handle, requeue).await,
        }
    }

    pub async fn queue_stats(&self, queue_name: &str) -> Result<QueueStats, MessagingError> {
        match self {
            Self::RabbitMq(s) => s.queue_stats(queue_name).await,
            Self::InMemory(s) => s.queue_stats(queue_name).await,
        }
    }

    pub async fn health_check(&self) -> Result<bool, MessagingError> {
        match self {
            Self::RabbitMq(s) => s.health_check().await,
            Self::InMemory(s) => s.health_check().await,
        }
    }

    /// Release broker connections
    pub async fn close(&self) -> Result<(), MessagingError> {
        match self {
            Self::RabbitMq(s) => s.close().await,
            Self::InMemory(_) => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_in_memory_backend_from_config() {
        let config = QueueConfig {
            backend: MessagingBackendKind::InMemory,
            ..QueueConfig::default()
        };
        let provider = MessagingProvider::from_config(&config).await.unwrap();

        assert_eq!(provider.provider_name(), "in_memory");
        assert!(provider.as_in_memory().is_some());
        provider.ensure_queue(&config.queue_name).await.unwrap();
        assert!(provider.health_check().await.unwrap());
        assert!(provider.close().await.is_ok());
    }
}
