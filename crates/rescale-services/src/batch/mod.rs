//! Per-item transform and the batch loop driving it.

mod item;
mod orchestrator;

pub use item::{ItemResult, ItemStatus, ItemTransformer};
pub use orchestrator::{run_batch, BatchSummary};
