//! Image compression job payload.

use crate::models::image_list;
use serde::{Deserialize, Serialize};

fn first_attempt() -> u32 {
    1
}

/// Request to derive compressed images for one product
///
/// `source_hash` pins the job to the source list it was created from, so a
/// job that outlived an update of the product's images can be recognised
/// and discarded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageCompressionJob {
    pub product_id: i64,
    pub source_images: Vec<String>,
    pub source_hash: String,
    /// 1 on first publish; incremented on every republish after a failure
    #[serde(default = "first_attempt")]
    pub attempt: u32,
}

impl ImageCompressionJob {
    pub fn new(product_id: i64, source_images: Vec<String>) -> Self {
        let source_hash = image_list::content_hash(&source_images);
        Self {
            product_id,
            source_images,
            source_hash,
            attempt: first_attempt(),
        }
    }

    /// Copy of this job for the next delivery attempt
    pub fn next_attempt(&self) -> Self {
        Self {
            attempt: self.attempt + 1,
            ..self.clone()
        }
    }

    /// Whether `current` is still the list this job was created from
    pub fn matches_sources(&self, current: &[String]) -> bool {
        image_list::content_hash(current) == self.source_hash
    }
}
