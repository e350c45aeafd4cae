use crate::error::TransformError;
use bytes::Bytes;
use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, GenericImageView};

/// File extension of every transformed item
pub const OUTPUT_EXTENSION: &str = "jpg";

/// Output encoder. The output encoding is fixed to baseline JPEG.
pub struct ImageCompressor;

impl ImageCompressor {
    /// Encode to JPEG at the given quality (clamped to 1-100)
    pub fn encode_jpeg(img: &DynamicImage, quality: u8) -> Result<Bytes, TransformError> {
        // JPEG has no alpha channel
        let rgb_img = img.to_rgb8();
        let (width, height) = img.dimensions();

        let estimated_size = (width as usize * height as usize) / 4;
        let mut buffer = Vec::with_capacity(estimated_size);

        let mut encoder = JpegEncoder::new_with_quality(&mut buffer, quality.clamp(1, 100));
        encoder
            .encode_image(&rgb_img)
            .map_err(|e| TransformError::Encode(e.to_string()))?;

        Ok(Bytes::from(buffer))
    }
}
