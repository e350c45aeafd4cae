//! Rescale API Library
//!
//! HTTP surface of the batch upscaling service: multipart intake, the
//! pipeline run and the streamed archive download.

mod api_doc;
mod handlers;
mod utils;

pub mod error;
pub mod setup;
pub mod state;

pub use error::{ErrorResponse, HttpAppError};
pub use handlers::upscale::{ITEMS_FAILED_HEADER, ITEMS_SKIPPED_HEADER, ITEMS_SUCCEEDED_HEADER};
