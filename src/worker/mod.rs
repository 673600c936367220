//! # Compression Worker
//!
//! Long-running consumer of the image queue. For each job it re-reads the
//! product, derives one compressed JPEG per source image, records the
//! derived references, invalidates the cached snapshot and only then
//! acknowledges the message.

mod compression_worker;
mod stage;

pub use compression_worker::{CompressionWorker, JobOutcome, WorkerStats};
pub use stage::CompressionStage;
