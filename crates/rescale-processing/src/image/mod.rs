//! Image transform module

pub mod transformer;

pub use transformer::{ImageTransform, ImageTransformer};
