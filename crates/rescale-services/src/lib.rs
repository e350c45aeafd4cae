//! Batch archive pipeline: workspace management, extraction, per-item
//! transform, assembly and delivery of the resulting archive.

pub mod archive;
pub mod batch;
pub mod delivery;
pub mod job;
pub mod workspace;

pub use archive::{ArchiveFormat, AssembledArchive, UnsupportedFormat};
pub use batch::{BatchSummary, ItemResult, ItemStatus, ItemTransformer};
pub use delivery::DeliveryStream;
pub use job::{BatchPipeline, CompletedJob, Job, JobStatus, PipelineError, DOWNLOAD_STEM};
pub use workspace::{sweep_stale_workspaces, Workspace, WorkspaceError};
