use serde::{Deserialize, Serialize};
use std::fmt;

/// Where a job or a single image is in the compression pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompressionStage {
    Received,
    Downloading,
    Decoding,
    Resizing,
    Encoding,
    Persisted,
    Failed,
}

impl CompressionStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Received => "received",
            Self::Downloading => "downloading",
            Self::Decoding => "decoding",
            Self::Resizing => "resizing",
            Self::Encoding => "encoding",
            Self::Persisted => "persisted",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for CompressionStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_matches_serde_name() {
        for stage in [
            CompressionStage::Received,
            CompressionStage::Downloading,
            CompressionStage::Persisted,
        ] {
            assert_eq!(
                serde_json::to_string(&stage).unwrap(),
                format!("\"{}\"", stage)
            );
        }
    }
}
