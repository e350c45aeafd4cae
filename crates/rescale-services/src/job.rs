//! Job lifecycle: one inbound archive in, one assembled archive out.

use crate::archive::{
    assemble_archive, extract_archive, ArchiveFormat, AssembledArchive, AssemblyError,
    ExtractionError, ExtractionLimits,
};
use crate::batch::{run_batch, BatchSummary, ItemResult, ItemTransformer};
use crate::workspace::{Workspace, WorkspaceError};
use bytes::Bytes;
use rescale_core::{AppError, ProcessingConfig};
use rescale_processing::ImageTransform;
use std::io::Cursor;
use std::sync::Arc;
use std::time::Instant;
use uuid::Uuid;

/// Base name of the archive handed back to the caller
pub const DOWNLOAD_STEM: &str = "upscaled_images";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStatus {
    Created,
    Extracting,
    Processing,
    Assembling,
    Ready,
    Failed,
}

/// Fatal Job failures. Item-level failures never show up here.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error(transparent)]
    Workspace(#[from] WorkspaceError),

    #[error(transparent)]
    Extraction(#[from] ExtractionError),

    #[error(transparent)]
    Assembly(#[from] AssemblyError),

    #[error("pipeline task failed: {0}")]
    Task(String),
}

impl From<PipelineError> for AppError {
    fn from(err: PipelineError) -> Self {
        match err {
            PipelineError::Workspace(e) => AppError::Workspace(e.to_string()),
            PipelineError::Extraction(e) => AppError::Extraction(e.to_string()),
            PipelineError::Assembly(e) => AppError::Assembly(e.to_string()),
            PipelineError::Task(msg) => AppError::Internal(msg),
        }
    }
}

/// One request's unit of work, owning its workspace
#[derive(Debug)]
pub struct Job {
    workspace: Workspace,
    status: JobStatus,
    results: Vec<ItemResult>,
    started: Instant,
}

impl Job {
    fn new(workspace: Workspace) -> Self {
        Self {
            workspace,
            status: JobStatus::Created,
            results: Vec::new(),
            started: Instant::now(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.workspace.id()
    }

    pub fn status(&self) -> JobStatus {
        self.status
    }

    pub fn results(&self) -> &[ItemResult] {
        &self.results
    }

    pub fn workspace(&self) -> &Workspace {
        &self.workspace
    }

    pub fn elapsed_ms(&self) -> u128 {
        self.started.elapsed().as_millis()
    }

    fn transition(&mut self, status: JobStatus) {
        tracing::debug!(job_id = %self.id(), from = ?self.status, to = ?status, "Job state change");
        self.status = status;
    }

    async fn fail(mut self, err: &PipelineError) {
        self.transition(JobStatus::Failed);
        tracing::error!(
            job_id = %self.id(),
            error = %err,
            elapsed_ms = self.elapsed_ms() as u64,
            "Job failed"
        );
        self.release().await;
    }

    /// Start releasing the workspace in the background, for callers that
    /// cannot await. Runs at most once per Job.
    pub fn finalize(mut self) {
        self.workspace.destroy();
    }

    /// Release the workspace and wait until it is removed
    pub async fn release(mut self) {
        self.workspace.release().await;
    }
}

/// A Job whose archive is assembled and ready to be delivered
#[derive(Debug)]
pub struct CompletedJob {
    pub job: Job,
    pub archive: AssembledArchive,
    pub summary: BatchSummary,
}

impl CompletedJob {
    pub fn download_name(&self) -> String {
        format!("{}.{}", DOWNLOAD_STEM, self.archive.format.extension())
    }

    pub fn content_type(&self) -> &'static str {
        self.archive.format.content_type()
    }
}

/// Drives a Job through extraction, batch processing and assembly.
///
/// Configuration is captured at construction and passed down explicitly;
/// concurrent Jobs share nothing but this read-only value.
#[derive(Clone)]
pub struct BatchPipeline {
    config: ProcessingConfig,
    items: Arc<ItemTransformer>,
}

impl BatchPipeline {
    pub fn new(config: ProcessingConfig) -> Self {
        let items = Arc::new(ItemTransformer::from_config(&config));
        Self { config, items }
    }

    pub fn with_transform(config: ProcessingConfig, transform: Arc<dyn ImageTransform>) -> Self {
        let items = Arc::new(ItemTransformer::with_transform(&config, transform));
        Self { config, items }
    }

    /// Run a whole Job over `archive`.
    ///
    /// On success the workspace stays alive inside the returned
    /// [`CompletedJob`] until delivery finalizes it. On failure it has already
    /// been removed when this returns.
    pub async fn run(
        &self,
        archive: Bytes,
        format: ArchiveFormat,
    ) -> Result<CompletedJob, PipelineError> {
        let workspace = Workspace::create(&self.config.workspace_root).await?;
        let mut job = Job::new(workspace);

        tracing::info!(
            job_id = %job.id(),
            upload_bytes = archive.len(),
            output_format = format.extension(),
            "Job started"
        );

        match self.drive(&mut job, archive, format).await {
            Ok(assembled) => {
                job.transition(JobStatus::Ready);
                let summary = BatchSummary::from_results(&job.results);
                tracing::info!(
                    job_id = %job.id(),
                    items = summary.total(),
                    succeeded = summary.succeeded,
                    skipped = summary.skipped,
                    failed = summary.failed,
                    archive_bytes = assembled.size_bytes,
                    elapsed_ms = job.elapsed_ms() as u64,
                    "Job ready for delivery"
                );
                Ok(CompletedJob {
                    job,
                    archive: assembled,
                    summary,
                })
            }
            Err(e) => {
                job.fail(&e).await;
                Err(e)
            }
        }
    }

    async fn drive(
        &self,
        job: &mut Job,
        archive: Bytes,
        format: ArchiveFormat,
    ) -> Result<AssembledArchive, PipelineError> {
        job.transition(JobStatus::Extracting);
        let input_dir = job.workspace.input_dir();
        let limits = ExtractionLimits {
            max_entries: self.config.max_archive_entries,
            max_total_bytes: self.config.max_extracted_bytes,
        };
        let report = tokio::task::spawn_blocking(move || {
            extract_archive(Cursor::new(archive), &input_dir, &limits)
        })
        .await
        .map_err(|e| PipelineError::Task(format!("extraction task: {}", e)))??;

        tracing::debug!(
            job_id = %job.id(),
            written = report.written,
            discarded = report.discarded,
            renamed = report.renamed,
            extracted_bytes = report.total_bytes,
            "Archive extracted"
        );

        job.transition(JobStatus::Processing);
        job.results = run_batch(
            &job.workspace,
            self.items.clone(),
            self.config.item_concurrency,
        )
        .await?;

        job.transition(JobStatus::Assembling);
        let output_dir = job.workspace.output_dir();
        let destination = job
            .workspace
            .artifact_path(&format!("{}.{}", DOWNLOAD_STEM, format.extension()));
        let assembled = tokio::task::spawn_blocking(move || {
            assemble_archive(&output_dir, &destination, format)
        })
        .await
        .map_err(|e| PipelineError::Task(format!("assembly task: {}", e)))??;

        Ok(assembled)
    }
}
