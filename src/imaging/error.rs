use crate::worker::CompressionStage;
use thiserror::Error;

/// Failure to turn one source reference into a derived image
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ImagingError {
    #[error("Unsupported image reference: {0}")]
    UnsupportedReference(String),

    #[error("Failed to fetch {reference}: {message}")]
    Fetch { reference: String, message: String },

    #[error("Fetching {reference} timed out after {timeout_ms}ms")]
    Timeout { reference: String, timeout_ms: u64 },

    #[error("Image at {reference} is {size} bytes, limit is {limit}")]
    TooLarge {
        reference: String,
        size: usize,
        limit: usize,
    },

    #[error("Failed to decode image: {0}")]
    Decode(String),

    #[error("Failed to encode image: {0}")]
    Encode(String),

    #[error("Failed to store artifact {name}: {message}")]
    Storage { name: String, message: String },
}

impl ImagingError {
    pub fn fetch(reference: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Fetch {
            reference: reference.into(),
            message: message.into(),
        }
    }

    pub fn storage(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Storage {
            name: name.into(),
            message: message.into(),
        }
    }

    /// Pipeline stage the failure happened in
    pub fn stage(&self) -> CompressionStage {
        match self {
            Self::UnsupportedReference(_)
            | Self::Fetch { .. }
            | Self::Timeout { .. }
            | Self::TooLarge { .. } => CompressionStage::Downloading,
            Self::Decode(_) => CompressionStage::Decoding,
            Self::Encode(_) | Self::Storage { .. } => CompressionStage::Encoding,
        }
    }
}
