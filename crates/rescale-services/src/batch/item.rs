use rescale_core::ProcessingConfig;
use rescale_processing::{ImageTransform, ImageTransformer, ImageValidator, OUTPUT_EXTENSION};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use uuid::Uuid;

/// Outcome of one extracted file
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemStatus {
    /// Transformed and written to the output region
    Success { output: PathBuf },
    /// Not an image by extension; left alone
    Skipped,
    /// Image by extension, but reading, transforming or writing failed
    Failed { reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemResult {
    pub source_name: String,
    pub status: ItemStatus,
}

impl ItemResult {
    pub fn success(source_name: impl Into<String>, output: PathBuf) -> Self {
        Self {
            source_name: source_name.into(),
            status: ItemStatus::Success { output },
        }
    }

    pub fn skipped(source_name: impl Into<String>) -> Self {
        Self {
            source_name: source_name.into(),
            status: ItemStatus::Skipped,
        }
    }

    pub fn failed(source_name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            source_name: source_name.into(),
            status: ItemStatus::Failed {
                reason: reason.into(),
            },
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self.status, ItemStatus::Success { .. })
    }
}

/// Applies the size transform to a single extracted file.
///
/// Never returns an error: every outcome, including I/O trouble, is folded
/// into an [`ItemResult`] so one bad file cannot abort the batch.
pub struct ItemTransformer {
    transform: Arc<dyn ImageTransform>,
    validator: ImageValidator,
    scale_factor: f32,
}

impl ItemTransformer {
    pub fn new(
        transform: Arc<dyn ImageTransform>,
        validator: ImageValidator,
        scale_factor: f32,
    ) -> Self {
        Self {
            transform,
            validator,
            scale_factor,
        }
    }

    pub fn from_config(config: &ProcessingConfig) -> Self {
        Self::with_transform(
            config,
            Arc::new(ImageTransformer::new(
                config.output_quality,
                config.max_output_pixels,
            )),
        )
    }

    pub fn with_transform(config: &ProcessingConfig, transform: Arc<dyn ImageTransform>) -> Self {
        Self::new(
            transform,
            ImageValidator::new(&config.allowed_extensions),
            config.scale_factor,
        )
    }

    /// Transform the file at `source` and write the result into `output_dir`
    /// under a fresh `image_<uuid>.jpg` name.
    pub fn transform_item(&self, source: &Path, output_dir: &Path) -> ItemResult {
        let source_name = source
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        if let Err(e) = self.validator.validate_extension(&source_name) {
            tracing::debug!(file = %source_name, reason = %e, "Skipping non-image file");
            return ItemResult::skipped(source_name);
        }

        let data = match std::fs::read(source) {
            Ok(data) => data,
            Err(e) => {
                tracing::warn!(file = %source_name, error = %e, "Failed to read extracted file");
                return ItemResult::failed(source_name, format!("read failed: {}", e));
            }
        };

        let transformed = match self.transform.transform(&data, self.scale_factor) {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::warn!(file = %source_name, error = %e, "Image transform failed");
                return ItemResult::failed(source_name, e.to_string());
            }
        };

        let output_name = format!("image_{}.{}", Uuid::new_v4().simple(), OUTPUT_EXTENSION);
        let output = output_dir.join(&output_name);

        if let Err(e) = write_new_file(&output, &transformed) {
            // Leave no half-written output behind for assembly to pick up
            let _ = std::fs::remove_file(&output);
            tracing::warn!(file = %source_name, output = %output_name, error = %e, "Failed to write transformed image");
            return ItemResult::failed(source_name, format!("write failed: {}", e));
        }

        tracing::debug!(
            file = %source_name,
            output = %output_name,
            input_bytes = data.len(),
            output_bytes = transformed.len(),
            "Image transformed"
        );
        ItemResult::success(source_name, output)
    }
}

fn write_new_file(path: &Path, data: &[u8]) -> std::io::Result<()> {
    let mut file = OpenOptions::new().write(true).create_new(true).open(path)?;
    file.write_all(data)?;
    file.sync_all()
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
    use rescale_processing::TransformError;
    use std::io::Cursor;

    fn config() -> ProcessingConfig {
        ProcessingConfig::default()
    }

    fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(width, height, Rgb([0, 128, 255])));
        let mut buffer = Vec::new();
        img.write_to(&mut Cursor::new(&mut buffer), ImageFormat::Png)
            .unwrap();
        buffer
    }

    struct FailingTransform;

    impl ImageTransform for FailingTransform {
        fn transform(&self, _data: &[u8], _scale: f32) -> Result<Bytes, TransformError> {
            Err(TransformError::Decode("boom".to_string()))
        }
    }

    struct EchoTransform;

    impl ImageTransform for EchoTransform {
        fn transform(&self, data: &[u8], _scale: f32) -> Result<Bytes, TransformError> {
            Ok(Bytes::copy_from_slice(data))
        }
    }

    #[test]
    fn test_non_image_is_skipped_without_output() {
        let input = tempfile::tempdir().unwrap();
        let output = tempfile::tempdir().unwrap();
        let source = input.path().join("notes.txt");
        std::fs::write(&source, b"hello").unwrap();

        let result = ItemTransformer::from_config(&config()).transform_item(&source, output.path());

        assert_eq!(result, ItemResult::skipped("notes.txt"));
        assert_eq!(std::fs::read_dir(output.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_image_is_transformed_into_uuid_named_jpeg() {
        let input = tempfile::tempdir().unwrap();
        let output = tempfile::tempdir().unwrap();
        let source = input.path().join("Photo.PNG");
        std::fs::write(&source, png_bytes(4, 3)).unwrap();

        let result = ItemTransformer::from_config(&config()).transform_item(&source, output.path());

        let ItemStatus::Success { output: path } = &result.status else {
            panic!("Expected success, got {:?}", result);
        };
        let name = path.file_name().unwrap().to_str().unwrap();
        assert!(name.starts_with("image_"));
        assert!(name.ends_with(".jpg"));
        assert_eq!(name.len(), "image_".len() + 32 + ".jpg".len());

        let decoded = image::open(path).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (16, 12));
    }

    #[test]
    fn test_undecodable_image_fails() {
        let input = tempfile::tempdir().unwrap();
        let output = tempfile::tempdir().unwrap();
        let source = input.path().join("broken.jpg");
        std::fs::write(&source, b"not really a jpeg").unwrap();

        let result = ItemTransformer::from_config(&config()).transform_item(&source, output.path());

        assert!(matches!(result.status, ItemStatus::Failed { .. }));
        assert_eq!(result.source_name, "broken.jpg");
        assert_eq!(std::fs::read_dir(output.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_transform_error_is_reported_as_failure() {
        let input = tempfile::tempdir().unwrap();
        let output = tempfile::tempdir().unwrap();
        let source = input.path().join("a.png");
        std::fs::write(&source, png_bytes(2, 2)).unwrap();

        let items = ItemTransformer::with_transform(&config(), Arc::new(FailingTransform));
        let result = items.transform_item(&source, output.path());

        assert_eq!(
            result.status,
            ItemStatus::Failed {
                reason: "Failed to decode image: boom".to_string()
            }
        );
    }

    #[test]
    fn test_missing_source_is_failure() {
        let input = tempfile::tempdir().unwrap();
        let output = tempfile::tempdir().unwrap();

        let items = ItemTransformer::with_transform(&config(), Arc::new(EchoTransform));
        let result = items.transform_item(&input.path().join("gone.png"), output.path());

        assert!(matches!(result.status, ItemStatus::Failed { .. }));
    }

    #[test]
    fn test_write_failure_leaves_no_output() {
        let input = tempfile::tempdir().unwrap();
        let source = input.path().join("a.png");
        std::fs::write(&source, png_bytes(2, 2)).unwrap();
        let missing_output = input.path().join("no-such-dir");

        let items = ItemTransformer::with_transform(&config(), Arc::new(EchoTransform));
        let result = items.transform_item(&source, &missing_output);

        assert!(matches!(result.status, ItemStatus::Failed { .. }));
        assert!(!missing_output.exists());
    }
}
