//! # Imaging
//!
//! Building blocks of the compression pipeline: fetching a source image,
//! decode/resize/re-encode, and persisting the derived artifact.
//!
//! Every failure is an [`ImagingError`] scoped to a single image; the worker
//! logs it and moves on to the next reference.

pub mod artifact_store;
pub mod compressor;
pub mod error;
pub mod fetcher;

pub use artifact_store::{artifact_name, ArtifactStore, LocalArtifactStore};
pub use compressor::ImageCompressor;
pub use error::ImagingError;
pub use fetcher::{HttpImageFetcher, ImageFetcher};
