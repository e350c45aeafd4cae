//! Test helpers: build the router against a scratch workspace root.
//!
//! Run with: `cargo test -p rescale-api`

#![allow(dead_code)]

pub mod fixtures;

use axum_test::multipart::{MultipartForm, Part};
use axum_test::{TestResponse, TestServer};
use rescale_api::setup::routes;
use rescale_api::state::AppState;
use rescale_core::Config;
use rescale_processing::ImageTransform;
use rescale_services::BatchPipeline;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

/// Test application: server plus the workspace root it writes into.
pub struct TestApp {
    pub server: TestServer,
    pub workspace_root: TempDir,
}

impl TestApp {
    pub fn client(&self) -> &TestServer {
        &self.server
    }

    /// Post `archive` as the `file` field of a multipart form
    pub async fn upload(&self, archive: Vec<u8>) -> TestResponse {
        self.upload_to("/upscale", archive).await
    }

    pub async fn upload_to(&self, path: &str, archive: Vec<u8>) -> TestResponse {
        let part = Part::bytes(bytes::Bytes::from(archive))
            .file_name("images.zip")
            .mime_type("application/zip");
        self.server
            .post(path)
            .multipart(MultipartForm::new().add_part("file", part))
            .await
    }

    /// Wait until no workspace is left under the root; returns what remains
    pub async fn remaining_workspaces(&self) -> usize {
        let mut remaining = count_entries(self.workspace_root.path());
        for _ in 0..50 {
            if remaining == 0 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
            remaining = count_entries(self.workspace_root.path());
        }
        remaining
    }
}

fn count_entries(path: &Path) -> usize {
    std::fs::read_dir(path).map(|d| d.count()).unwrap_or(0)
}

/// Setup test app with default settings and scale factor 2
pub fn setup_test_app() -> TestApp {
    setup_test_app_with(&[])
}

/// Setup test app with extra configuration variables
pub fn setup_test_app_with(vars: &[(&str, &str)]) -> TestApp {
    let (config, workspace_root) = test_config(vars);
    build_app(AppState::new(config), workspace_root)
}

/// Setup test app whose pipeline runs `transform` on every image
pub fn setup_test_app_with_transform(transform: Arc<dyn ImageTransform>) -> TestApp {
    let (config, workspace_root) = test_config(&[]);
    let pipeline = BatchPipeline::with_transform(config.processing.clone(), transform);
    build_app(AppState::with_pipeline(config, pipeline), workspace_root)
}

fn test_config(vars: &[(&str, &str)]) -> (Config, TempDir) {
    let workspace_root = tempfile::tempdir().expect("Failed to create workspace root");

    let mut lookup: HashMap<String, String> = HashMap::new();
    lookup.insert("SCALE_FACTOR".to_string(), "2".to_string());
    lookup.insert(
        "WORKSPACE_ROOT".to_string(),
        workspace_root.path().display().to_string(),
    );
    for (key, value) in vars {
        lookup.insert(key.to_string(), value.to_string());
    }

    let config = Config::from_lookup(|key| lookup.get(key).cloned()).expect("Invalid test config");
    config.validate().expect("Test config failed validation");

    (config, workspace_root)
}

fn build_app(state: AppState, workspace_root: TempDir) -> TestApp {
    let state = Arc::new(state);
    let app = routes::setup_routes(&state.config, state.clone()).expect("Failed to build routes");
    let server = TestServer::new(app.into_make_service()).expect("Failed to create test server");

    TestApp {
        server,
        workspace_root,
    }
}
