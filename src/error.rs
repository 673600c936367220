//! Error types for the catalog core.
//!
//! Every fallible operation on the request path and in the compression
//! pipeline returns [`CatalogError`]. Cache failures never appear here: they
//! are absorbed by the cache module and degrade to a miss.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum CatalogError {
    /// Malformed identifier or payload supplied by the caller
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// No product matches the identifier
    #[error("Product not found: {0}")]
    NotFound(i64),

    /// Store unreachable, timed out or constraint violated
    #[error("Persistence error: {message}")]
    PersistenceError { message: String, retryable: bool },

    /// Network failure talking to the queue or an image origin
    #[error("Transport error: {0}")]
    TransportError(String),

    /// Queue operation failed after the connection was established
    #[error("Messaging error: {0}")]
    MessagingError(String),

    #[error("Configuration error: {0}")]
    ConfigurationError(String),
}

/// Coarse classification for the routing layer (4xx / 404 / 5xx).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Client,
    NotFound,
    Server,
}

impl CatalogError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::ValidationError(message.into())
    }

    pub fn persistence(message: impl Into<String>) -> Self {
        Self::PersistenceError {
            message: message.into(),
            retryable: false,
        }
    }

    pub fn retryable_persistence(message: impl Into<String>) -> Self {
        Self::PersistenceError {
            message: message.into(),
            retryable: true,
        }
    }

    pub fn transport(message: impl Into<String>) -> Self {
        Self::TransportError(message.into())
    }

    /// Whether the caller may retry the same operation unchanged.
    ///
    /// Timeouts and dropped connections are retryable; constraint
    /// violations, validation failures and missing rows are not.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::PersistenceError { retryable, .. } => *retryable,
            Self::TransportError(_) => true,
            Self::MessagingError(_) => true,
            Self::ValidationError(_) | Self::NotFound(_) | Self::ConfigurationError(_) => false,
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::ValidationError(_) => ErrorCategory::Client,
            Self::NotFound(_) => ErrorCategory::NotFound,
            _ => ErrorCategory::Server,
        }
    }
}

impl From<sqlx::Error> for CatalogError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
                Self::retryable_persistence(err.to_string())
            }
            other => Self::persistence(other.to_string()),
        }
    }
}

impl From<serde_json::Error> for CatalogError {
    fn from(error: serde_json::Error) -> Self {
        Self::ValidationError(format!("JSON serialization error: {error}"))
    }
}

impl From<crate::messaging::MessagingError> for CatalogError {
    fn from(error: crate::messaging::MessagingError) -> Self {
        if error.is_connection_failure() {
            Self::TransportError(error.to_string())
        } else {
            Self::MessagingError(error.to_string())
        }
    }
}

impl From<crate::config::ConfigurationError> for CatalogError {
    fn from(error: crate::config::ConfigurationError) -> Self {
        Self::ConfigurationError(error.to_string())
    }
}

pub type Result<T> = std::result::Result<T, CatalogError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_and_validation_are_distinct() {
        let not_found = CatalogError::NotFound(42);
        let invalid = CatalogError::validation("abc is not an integer id");

        assert_eq!(not_found.category(), ErrorCategory::NotFound);
        assert_eq!(invalid.category(), ErrorCategory::Client);
        assert_ne!(not_found, invalid);
    }

    #[test]
    fn test_retryable_classification() {
        assert!(CatalogError::retryable_persistence("timed out").is_retryable());
        assert!(!CatalogError::persistence("unique violation").is_retryable());
        assert!(!CatalogError::NotFound(1).is_retryable());
        assert!(CatalogError::transport("connection reset").is_retryable());
    }

    #[test]
    fn test_pool_timeout_maps_to_retryable_persistence() {
        let err: CatalogError = sqlx::Error::PoolTimedOut.into();
        assert!(matches!(
            err,
            CatalogError::PersistenceError {
                retryable: true,
                ..
            }
        ));
        assert_eq!(err.category(), ErrorCategory::Server);
    }
}
