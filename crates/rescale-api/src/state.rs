//! Application state shared by all handlers.

use rescale_core::Config;
use rescale_services::BatchPipeline;
use std::sync::Arc;

pub struct AppState {
    pub config: Arc<Config>,
    pub pipeline: BatchPipeline,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        let pipeline = BatchPipeline::new(config.processing.clone());
        Self {
            config: Arc::new(config),
            pipeline,
        }
    }

    /// State with a caller-supplied pipeline (custom transform in tests)
    pub fn with_pipeline(config: Config, pipeline: BatchPipeline) -> Self {
        Self {
            config: Arc::new(config),
            pipeline,
        }
    }
}
