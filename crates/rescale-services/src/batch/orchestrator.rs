use super::item::{ItemResult, ItemStatus, ItemTransformer};
use crate::workspace::{Workspace, WorkspaceError};
use futures::stream::{self, StreamExt};
use std::path::PathBuf;
use std::sync::Arc;

/// Per-status counts of a finished batch
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BatchSummary {
    pub succeeded: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl BatchSummary {
    pub fn from_results(results: &[ItemResult]) -> Self {
        results
            .iter()
            .fold(BatchSummary::default(), |mut summary, item| {
                match item.status {
                    ItemStatus::Success { .. } => summary.succeeded += 1,
                    ItemStatus::Skipped => summary.skipped += 1,
                    ItemStatus::Failed { .. } => summary.failed += 1,
                }
                summary
            })
    }

    pub fn total(&self) -> usize {
        self.succeeded + self.skipped + self.failed
    }
}

async fn list_inputs(workspace: &Workspace) -> Result<Vec<PathBuf>, WorkspaceError> {
    let input_dir = workspace.input_dir();
    let read_err = |source| WorkspaceError::Read {
        path: input_dir.clone(),
        source,
    };

    let mut entries = tokio::fs::read_dir(&input_dir).await.map_err(read_err)?;
    let mut files = Vec::new();
    while let Some(entry) = entries.next_entry().await.map_err(read_err)? {
        if entry.file_type().await.map_err(read_err)?.is_file() {
            files.push(entry.path());
        }
    }
    files.sort();
    Ok(files)
}

/// Run the size transform over every file in the workspace input region.
///
/// Produces exactly one [`ItemResult`] per extracted file, ordered by source
/// name. Items run on the blocking pool, at most `concurrency` at a time; a
/// worker that panics is recorded as a failed item.
pub async fn run_batch(
    workspace: &Workspace,
    items: Arc<ItemTransformer>,
    concurrency: usize,
) -> Result<Vec<ItemResult>, WorkspaceError> {
    let inputs = list_inputs(workspace).await?;
    let output_dir = workspace.output_dir();

    tracing::debug!(
        job_id = %workspace.id(),
        files = inputs.len(),
        concurrency,
        "Processing batch"
    );

    let mut results: Vec<ItemResult> = stream::iter(inputs)
        .map(|source| {
            let items = items.clone();
            let output_dir = output_dir.clone();
            async move {
                let source_name = source
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default();

                match tokio::task::spawn_blocking(move || items.transform_item(&source, &output_dir))
                    .await
                {
                    Ok(result) => result,
                    Err(e) => {
                        tracing::error!(file = %source_name, error = %e, "Transform worker aborted");
                        ItemResult::failed(source_name, "transform worker aborted")
                    }
                }
            }
        })
        .buffer_unordered(concurrency.max(1))
        .collect()
        .await;

    results.sort_by(|a, b| a.source_name.cmp(&b.source_name));
    Ok(results)
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use rescale_core::ProcessingConfig;
    use rescale_processing::{ImageTransform, TransformError};

    /// Succeeds unless the payload starts with `bad`, panics on `panic`
    struct ScriptedTransform;

    impl ImageTransform for ScriptedTransform {
        fn transform(&self, data: &[u8], _scale: f32) -> Result<Bytes, TransformError> {
            if data.starts_with(b"panic") {
                panic!("scripted panic");
            }
            if data.starts_with(b"bad") {
                return Err(TransformError::Decode("scripted".to_string()));
            }
            Ok(Bytes::copy_from_slice(data))
        }
    }

    fn items() -> Arc<ItemTransformer> {
        Arc::new(ItemTransformer::with_transform(
            &ProcessingConfig::default(),
            Arc::new(ScriptedTransform),
        ))
    }

    async fn workspace_with(files: &[(&str, &[u8])]) -> (tempfile::TempDir, Workspace) {
        let root = tempfile::tempdir().unwrap();
        let workspace = Workspace::create(root.path()).await.unwrap();
        for (name, data) in files {
            std::fs::write(workspace.input_dir().join(name), data).unwrap();
        }
        (root, workspace)
    }

    #[tokio::test]
    async fn test_one_result_per_file_in_name_order() {
        let (_root, workspace) = workspace_with(&[
            ("c.png", b"ok"),
            ("a.txt", b"text"),
            ("b.jpg", b"bad data"),
        ])
        .await;

        let results = run_batch(&workspace, items(), 1).await.unwrap();

        let names: Vec<&str> = results.iter().map(|r| r.source_name.as_str()).collect();
        assert_eq!(names, vec!["a.txt", "b.jpg", "c.png"]);
        assert_eq!(results[0].status, ItemStatus::Skipped);
        assert!(matches!(results[1].status, ItemStatus::Failed { .. }));
        assert!(results[2].is_success());

        let summary = BatchSummary::from_results(&results);
        assert_eq!(
            summary,
            BatchSummary {
                succeeded: 1,
                skipped: 1,
                failed: 1
            }
        );
        assert_eq!(summary.total(), 3);
    }

    #[tokio::test]
    async fn test_outputs_match_successes() {
        let (_root, workspace) =
            workspace_with(&[("a.png", b"1"), ("b.png", b"2"), ("c.png", b"3"), ("d.png", b"4")])
                .await;

        let results = run_batch(&workspace, items(), 4).await.unwrap();

        assert_eq!(results.len(), 4);
        assert!(results.iter().all(ItemResult::is_success));
        let outputs = std::fs::read_dir(workspace.output_dir()).unwrap().count();
        assert_eq!(outputs, 4);
    }

    #[tokio::test]
    async fn test_panicking_item_is_isolated() {
        let (_root, workspace) = workspace_with(&[("a.png", b"panic"), ("b.png", b"fine")]).await;

        let results = run_batch(&workspace, items(), 2).await.unwrap();

        assert_eq!(
            results[0].status,
            ItemStatus::Failed {
                reason: "transform worker aborted".to_string()
            }
        );
        assert!(results[1].is_success());
    }

    #[tokio::test]
    async fn test_empty_input_region() {
        let (_root, workspace) = workspace_with(&[]).await;

        let results = run_batch(&workspace, items(), 1).await.unwrap();

        assert!(results.is_empty());
        assert_eq!(BatchSummary::from_results(&results), BatchSummary::default());
    }

    #[tokio::test]
    async fn test_missing_input_region_is_error() {
        let (_root, workspace) = workspace_with(&[]).await;
        std::fs::remove_dir(workspace.input_dir()).unwrap();

        let result = run_batch(&workspace, items(), 1).await;

        assert!(matches!(result, Err(WorkspaceError::Read { .. })));
    }
}
