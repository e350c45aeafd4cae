/// Failure of a single image transform.
///
/// Always recovered by the caller: the item is recorded as failed and the
/// batch continues.
#[derive(Debug, thiserror::Error)]
pub enum TransformError {
    #[error("Failed to decode image: {0}")]
    Decode(String),

    #[error("Failed to encode image: {0}")]
    Encode(String),

    #[error("Invalid scale factor: {0}")]
    InvalidScale(f32),

    #[error("Scaled image {width}x{height} exceeds the limit of {max_pixels} pixels")]
    TooLarge {
        width: u64,
        height: u64,
        max_pixels: u64,
    },
}
