use super::ImagingError;
use crate::config::WorkerConfig;
use crate::worker::CompressionStage;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{ColorType, DynamicImage};
use tracing::debug;

/// Decode, resize to a fixed width and re-encode as JPEG
///
/// Pure CPU work; callers on the async runtime should run
/// [`compress`](Self::compress) under `spawn_blocking`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageCompressor {
    target_width: u32,
    jpeg_quality: u8,
}

impl ImageCompressor {
    pub fn new(target_width: u32, jpeg_quality: u8) -> Self {
        Self {
            target_width: target_width.max(1),
            jpeg_quality: jpeg_quality.clamp(1, 100),
        }
    }

    pub fn from_config(config: &WorkerConfig) -> Self {
        Self::new(config.target_width, config.jpeg_quality)
    }

    pub fn target_width(&self) -> u32 {
        self.target_width
    }

    pub fn decode(&self, bytes: &[u8]) -> Result<DynamicImage, ImagingError> {
        let image =
            image::load_from_memory(bytes).map_err(|e| ImagingError::Decode(e.to_string()))?;
        if image.width() == 0 || image.height() == 0 {
            return Err(ImagingError::Decode("image has no pixels".to_string()));
        }
        Ok(image)
    }

    /// Output dimensions: target width, height scaled by the same factor (at least 1)
    pub fn target_dimensions(&self, width: u32, height: u32) -> (u32, u32) {
        let scaled = (u64::from(height) * u64::from(self.target_width) + u64::from(width) / 2)
            / u64::from(width.max(1));
        (self.target_width, scaled.clamp(1, u64::from(u32::MAX)) as u32)
    }

    pub fn resize(&self, image: &DynamicImage) -> DynamicImage {
        let (width, height) = self.target_dimensions(image.width(), image.height());
        image.resize_exact(width, height, FilterType::Lanczos3)
    }

    pub fn encode(&self, image: &DynamicImage) -> Result<Vec<u8>, ImagingError> {
        let rgb = image.to_rgb8();
        let mut buffer = Vec::new();
        JpegEncoder::new_with_quality(&mut buffer, self.jpeg_quality)
            .encode(rgb.as_raw(), rgb.width(), rgb.height(), ColorType::Rgb8)
            .map_err(|e| ImagingError::Encode(e.to_string()))?;
        Ok(buffer)
    }

    /// Run the three CPU stages on one downloaded image
    pub fn compress(&self, bytes: &[u8]) -> Result<Vec<u8>, ImagingError> {
        debug!(stage = %CompressionStage::Decoding, bytes = bytes.len(), "Decoding image");
        let decoded = self.decode(bytes)?;

        debug!(
            stage = %CompressionStage::Resizing,
            from_width = decoded.width(),
            to_width = self.target_width,
            "Resizing image"
        );
        let resized = self.resize(&decoded);

        debug!(stage = %CompressionStage::Encoding, quality = self.jpeg_quality, "Encoding JPEG");
        self.encode(&resized)
    }
}
