//! # Messaging
//!
//! Provider-agnostic queue access plus the image compression channel built
//! on top of it.
//!
//! - [`MessagingService`]: the operations every broker provider supports
//! - [`MessagingProvider`]: enum dispatch over RabbitMQ and in-memory providers
//! - [`ImageQueue`]: typed publish/consume of [`ImageCompressionJob`] with
//!   acknowledgement policy, redelivery and dead-lettering

pub mod errors;
pub mod message;
pub mod provider;
pub mod providers;
pub mod queue;
pub mod traits;
pub mod types;

pub use errors::MessagingError;
pub use message::ImageCompressionJob;
pub use provider::MessagingProvider;
pub use providers::{InMemoryMessagingService, RabbitMqMessagingService};
pub use queue::{Delivery, ImageQueue, RetryOutcome};
pub use traits::{MessagingService, QueueMessage};
pub use types::{AckPolicy, MessageId, QueueStats, QueuedMessage, ReceiptHandle};
