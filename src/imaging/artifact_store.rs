use super::ImagingError;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::debug;

const MAX_STEM_LEN: usize = 64;

/// Destination for derived images
#[async_trait]
pub trait ArtifactStore: Send + Sync + 'static {
    /// Persist `bytes` under `name` and return the reference stored on the product
    async fn store(&self, name: &str, bytes: &[u8]) -> Result<String, ImagingError>;
}

/// Deterministic, path-safe artifact name for the `index`-th source of a product
///
/// `compressed_<product_id>_<index>_<stem>.jpg`, where the stem is the last
/// path segment of the reference without query, fragment or extension,
/// reduced to `[A-Za-z0-9_-]`.
pub fn artifact_name(product_id: i64, index: usize, reference: &str) -> String {
    let without_suffix = reference
        .split(['?', '#'])
        .next()
        .unwrap_or_default()
        .trim_end_matches('/');
    let segment = without_suffix
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default();
    let stem = match segment.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => stem,
        _ => segment,
    };

    let mut safe: String = stem
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .take(MAX_STEM_LEN)
        .collect();
    if safe.trim_matches('_').is_empty() {
        safe = "image".to_string();
    }

    format!("compressed_{product_id}_{index}_{safe}.jpg")
}

/// Stores artifacts as files under one directory
#[derive(Debug, Clone)]
pub struct LocalArtifactStore {
    root: PathBuf,
}

impl LocalArtifactStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

#[async_trait]
impl ArtifactStore for LocalArtifactStore {
    async fn store(&self, name: &str, bytes: &[u8]) -> Result<String, ImagingError> {
        if name.is_empty() || name.contains(['/', '\\']) || name.starts_with('.') {
            return Err(ImagingError::storage(name, "artifact name is not a plain file name"));
        }

        tokio::fs::create_dir_all(&self.root)
            .await
            .map_err(|e| ImagingError::storage(name, e.to_string()))?;

        // write-then-rename so readers never see a partial file
        let path = self.root.join(name);
        let partial = self.root.join(format!(".{name}.partial"));
        tokio::fs::write(&partial, bytes)
            .await
            .map_err(|e| ImagingError::storage(name, e.to_string()))?;
        tokio::fs::rename(&partial, &path)
            .await
            .map_err(|e| ImagingError::storage(name, e.to_string()))?;

        debug!(path = %path.display(), bytes = bytes.len(), "Stored derived image");
        Ok(path.to_string_lossy().into_owned())
    }
}
