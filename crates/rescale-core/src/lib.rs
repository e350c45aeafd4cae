//! Rescale Core Library
//!
//! This crate provides the configuration and error types shared across all
//! Rescale components.

pub mod config;
pub mod error;

// Re-export commonly used types
pub use config::{is_production_environment, BaseConfig, Config, ProcessingConfig};
pub use error::{AppError, ErrorMetadata, LogLevel};
