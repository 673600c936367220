//! Delimited encoding of image reference lists.
//!
//! The `products` table stores each image list in a single text column. The
//! same delimiter is used for encoding on insert/update and decoding on
//! select; references containing it are rejected before they reach the store.

use crate::error::{CatalogError, Result};
use sha2::{Digest, Sha256};

/// Separator between references inside a stored image list
pub const IMAGE_LIST_DELIMITER: char = '§';

/// Encode a list for storage. An empty list is stored as SQL NULL.
pub fn encode(images: &[String]) -> Option<String> {
    if images.is_empty() {
        return None;
    }
    let mut buf = [0u8; 4];
    Some(images.join(IMAGE_LIST_DELIMITER.encode_utf8(&mut buf)))
}

/// Decode a stored column. NULL and the empty string both decode to `[]`.
pub fn decode(raw: Option<&str>) -> Vec<String> {
    match raw {
        None | Some("") => Vec::new(),
        Some(joined) => joined
            .split(IMAGE_LIST_DELIMITER)
            .map(str::to_string)
            .collect(),
    }
}

/// Reject references that would not survive an encode/decode round-trip
pub fn validate_reference(reference: &str) -> Result<()> {
    if reference.trim().is_empty() {
        return Err(CatalogError::validation(
            "image reference must not be empty",
        ));
    }
    if reference.contains(IMAGE_LIST_DELIMITER) {
        return Err(CatalogError::validation(format!(
            "image reference '{reference}' contains the reserved character '{IMAGE_LIST_DELIMITER}'"
        )));
    }
    Ok(())
}

pub fn validate_references(images: &[String]) -> Result<()> {
    images.iter().try_for_each(|r| validate_reference(r))
}

/// SHA-256 (hex) of the encoded list; identifies which source list a
/// compression job was produced from
pub fn content_hash(images: &[String]) -> String {
    let encoded = encode(images).unwrap_or_default();
    format!("{:x}", Sha256::digest(encoded.as_bytes()))
}
