//! Image transformer - the size transform applied to every batch item
//!
//! The pipeline depends on the [`ImageTransform`] contract only:
//! `transform(raw image bytes, scale factor) -> raw image bytes | error`.
//! [`ImageTransformer`] decodes any supported format, resizes uniformly with a
//! Lanczos3 kernel and re-encodes as JPEG.

use crate::compression::ImageCompressor;
use crate::error::TransformError;
use bytes::Bytes;
use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView, ImageReader};
use std::io::Cursor;

/// Size transform applied to one image.
///
/// Implementations must be deterministic in success or failure for the same
/// input; byte-exact output is not required.
pub trait ImageTransform: Send + Sync {
    fn transform(&self, data: &[u8], scale_factor: f32) -> Result<Bytes, TransformError>;
}

/// Production transform: decode, resize by scale factor, encode JPEG
#[derive(Debug, Clone)]
pub struct ImageTransformer {
    quality: u8,
    max_output_pixels: u64,
}

impl ImageTransformer {
    pub fn new(quality: u8, max_output_pixels: u64) -> Self {
        Self {
            quality,
            max_output_pixels,
        }
    }

    /// Compute the scaled dimensions, rejecting targets above `max_pixels`
    pub fn target_dimensions(
        width: u32,
        height: u32,
        scale_factor: f32,
        max_pixels: u64,
    ) -> Result<(u32, u32), TransformError> {
        if !scale_factor.is_finite() || scale_factor <= 0.0 {
            return Err(TransformError::InvalidScale(scale_factor));
        }

        let scale = scale_factor as f64;
        let target_width = ((width as f64 * scale).round() as u64).max(1);
        let target_height = ((height as f64 * scale).round() as u64).max(1);

        let too_large = target_width > u32::MAX as u64
            || target_height > u32::MAX as u64
            || target_width.saturating_mul(target_height) > max_pixels;
        if too_large {
            return Err(TransformError::TooLarge {
                width: target_width,
                height: target_height,
                max_pixels,
            });
        }

        Ok((target_width as u32, target_height as u32))
    }

    fn decode(data: &[u8]) -> Result<DynamicImage, TransformError> {
        ImageReader::new(Cursor::new(data))
            .with_guessed_format()
            .map_err(|e| TransformError::Decode(e.to_string()))?
            .decode()
            .map_err(|e| TransformError::Decode(e.to_string()))
    }

    /// Read dimensions from the header without decoding pixels
    fn probe_dimensions(data: &[u8]) -> Result<(u32, u32), TransformError> {
        ImageReader::new(Cursor::new(data))
            .with_guessed_format()
            .map_err(|e| TransformError::Decode(e.to_string()))?
            .into_dimensions()
            .map_err(|e| TransformError::Decode(e.to_string()))
    }
}

impl ImageTransform for ImageTransformer {
    fn transform(&self, data: &[u8], scale_factor: f32) -> Result<Bytes, TransformError> {
        // Reject oversized targets before allocating the decoded image
        let (width, height) = Self::probe_dimensions(data)?;
        Self::target_dimensions(width, height, scale_factor, self.max_output_pixels)?;

        let img = Self::decode(data)?;
        let (width, height) = img.dimensions();
        let (target_width, target_height) =
            Self::target_dimensions(width, height, scale_factor, self.max_output_pixels)?;

        tracing::debug!(
            width,
            height,
            target_width,
            target_height,
            quality = self.quality,
            "Resizing image"
        );

        let rgb = DynamicImage::ImageRgb8(img.to_rgb8());
        let resized = rgb.resize_exact(target_width, target_height, FilterType::Lanczos3);

        ImageCompressor::encode_jpeg(&resized, self.quality)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageFormat, Rgba, RgbaImage};

    fn create_test_image(width: u32, height: u32, format: ImageFormat) -> Vec<u8> {
        let img = DynamicImage::ImageRgba8(RgbaImage::from_pixel(
            width,
            height,
            Rgba([255, 0, 0, 255]),
        ));
        let mut buffer = Vec::new();
        img.write_to(&mut Cursor::new(&mut buffer), format).unwrap();
        buffer
    }

    #[test]
    fn test_target_dimensions() {
        assert_eq!(
            ImageTransformer::target_dimensions(10, 20, 4.0, u64::MAX).unwrap(),
            (40, 80)
        );
        assert_eq!(
            ImageTransformer::target_dimensions(10, 20, 0.5, u64::MAX).unwrap(),
            (5, 10)
        );
        // Never collapses to zero
        assert_eq!(
            ImageTransformer::target_dimensions(1, 1, 0.1, u64::MAX).unwrap(),
            (1, 1)
        );
    }

    #[test]
    fn test_target_dimensions_rejects_bad_scale() {
        assert!(matches!(
            ImageTransformer::target_dimensions(10, 10, 0.0, u64::MAX),
            Err(TransformError::InvalidScale(_))
        ));
        assert!(matches!(
            ImageTransformer::target_dimensions(10, 10, f32::NAN, u64::MAX),
            Err(TransformError::InvalidScale(_))
        ));
    }

    #[test]
    fn test_target_dimensions_rejects_oversized_target() {
        let result = ImageTransformer::target_dimensions(1000, 1000, 4.0, 1_000_000);
        match result {
            Err(TransformError::TooLarge {
                width,
                height,
                max_pixels,
            }) => {
                assert_eq!((width, height), (4000, 4000));
                assert_eq!(max_pixels, 1_000_000);
            }
            other => panic!("Expected TooLarge, got {:?}", other),
        }
    }

    #[test]
    fn test_transform_png_upscales_to_jpeg() {
        let transformer = ImageTransformer::new(95, 100_000_000);
        let png = create_test_image(10, 6, ImageFormat::Png);

        let output = transformer.transform(&png, 4.0).unwrap();

        assert_eq!(image::guess_format(&output).unwrap(), ImageFormat::Jpeg);
        let decoded = image::load_from_memory(&output).unwrap();
        assert_eq!(decoded.dimensions(), (40, 24));
    }

    #[test]
    fn test_transform_bmp_input() {
        let transformer = ImageTransformer::new(90, 100_000_000);
        let bmp = create_test_image(3, 3, ImageFormat::Bmp);

        let output = transformer.transform(&bmp, 2.0).unwrap();

        let decoded = image::load_from_memory(&output).unwrap();
        assert_eq!(decoded.dimensions(), (6, 6));
    }

    #[test]
    fn test_transform_invalid_data_is_decode_error() {
        let transformer = ImageTransformer::new(95, 100_000_000);

        let result = transformer.transform(b"not an image", 4.0);

        assert!(matches!(result, Err(TransformError::Decode(_))));
    }

    #[test]
    fn test_transform_truncated_png_is_decode_error() {
        let transformer = ImageTransformer::new(95, 100_000_000);
        let mut png = create_test_image(32, 32, ImageFormat::Png);
        png.truncate(png.len() / 2);

        assert!(transformer.transform(&png, 2.0).is_err());
    }

    #[test]
    fn test_transform_respects_pixel_limit() {
        let transformer = ImageTransformer::new(95, 100);
        let png = create_test_image(10, 10, ImageFormat::Png);

        let result = transformer.transform(&png, 4.0);

        assert!(matches!(result, Err(TransformError::TooLarge { .. })));
    }

    #[test]
    fn test_transform_is_deterministic() {
        let transformer = ImageTransformer::new(95, 100_000_000);
        let png = create_test_image(5, 5, ImageFormat::Png);

        let first = transformer.transform(&png, 3.0).unwrap();
        let second = transformer.transform(&png, 3.0).unwrap();

        assert_eq!(first, second);
    }
}
