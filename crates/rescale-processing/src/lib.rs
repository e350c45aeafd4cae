//! Image processing for the batch pipeline.
//!
//! The pipeline only relies on the [`ImageTransform`] contract; the
//! [`ImageTransformer`] is the production implementation (decode, resize by a
//! uniform scale factor, re-encode as JPEG).

pub mod compression;
pub mod error;
pub mod image;
pub mod validator;

pub use compression::{ImageCompressor, OUTPUT_EXTENSION};
pub use error::TransformError;
pub use self::image::{ImageTransform, ImageTransformer};
pub use validator::{ImageValidator, ValidationError};
