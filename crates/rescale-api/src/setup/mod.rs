//! Application setup and initialization

pub mod routes;
pub mod server;

use crate::state::AppState;
use anyhow::{Context, Result};
use rescale_core::Config;
use rescale_infra::LogFormat;
use rescale_services::sweep_stale_workspaces;
use std::sync::Arc;

/// Initialize the entire application
pub async fn initialize_app(config: Config) -> Result<(Arc<AppState>, axum::Router)> {
    // Fail fast on misconfiguration, before anything is started
    config.validate().context("Configuration validation failed")?;

    let log_format: LogFormat = config
        .base
        .log_format
        .parse()
        .map_err(|e| anyhow::anyhow!("LOG_FORMAT: {}", e))?;
    rescale_infra::init_telemetry(log_format, env!("CARGO_PKG_VERSION"))
        .map_err(|e| anyhow::anyhow!("Failed to initialize telemetry: {}", e))?;

    tracing::info!(environment = %config.environment(), "Configuration loaded and validated successfully");

    let workspace_root = &config.processing.workspace_root;
    let removed = sweep_stale_workspaces(workspace_root)
        .await
        .with_context(|| format!("Failed to sweep workspace root {}", workspace_root.display()))?;
    if removed > 0 {
        tracing::info!(removed, root = %workspace_root.display(), "Removed stale workspaces");
    }

    let state = Arc::new(AppState::new(config));
    let router = routes::setup_routes(&state.config, state.clone())?;

    Ok((state, router))
}
