//! Per-Job scratch directories.
//!
//! Every Job owns exactly one [`Workspace`]: a directory named after a random
//! UUID under the configured root, holding an `input/` and an `output/`
//! region. The workspace is removed exactly once, either explicitly through
//! [`Workspace::release`] / [`Workspace::destroy`] or when the value is
//! dropped. Inside a runtime the removal runs on the blocking pool.

use std::io;
use std::path::{Path, PathBuf};
use tokio::task::JoinHandle;
use uuid::Uuid;

pub const INPUT_DIR: &str = "input";
pub const OUTPUT_DIR: &str = "output";

#[derive(Debug, thiserror::Error)]
pub enum WorkspaceError {
    #[error("Failed to create workspace directory {path}: {source}")]
    Create {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to read workspace directory {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Scoped scratch area of one Job
#[derive(Debug)]
pub struct Workspace {
    id: Uuid,
    root: PathBuf,
    destroyed: bool,
}

impl Workspace {
    /// Allocate a fresh, empty workspace under `parent`
    pub async fn create(parent: &Path) -> Result<Self, WorkspaceError> {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|source| WorkspaceError::Create {
                path: parent.to_path_buf(),
                source,
            })?;

        let id = Uuid::new_v4();
        let root = parent.join(id.to_string());

        // `create_dir` fails if the directory already exists, so two Jobs can
        // never end up sharing one
        tokio::fs::create_dir(&root)
            .await
            .map_err(|source| WorkspaceError::Create {
                path: root.clone(),
                source,
            })?;

        // From here on the guard owns the directory and cleans up on error
        let workspace = Workspace {
            id,
            root,
            destroyed: false,
        };

        for region in [workspace.input_dir(), workspace.output_dir()] {
            tokio::fs::create_dir(&region)
                .await
                .map_err(|source| WorkspaceError::Create {
                    path: region.clone(),
                    source,
                })?;
        }

        tracing::debug!(job_id = %id, path = %workspace.root.display(), "Workspace created");
        Ok(workspace)
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn path(&self) -> &Path {
        &self.root
    }

    pub fn input_dir(&self) -> PathBuf {
        self.root.join(INPUT_DIR)
    }

    pub fn output_dir(&self) -> PathBuf {
        self.root.join(OUTPUT_DIR)
    }

    /// Path for a Job artifact kept next to (not inside) the two regions
    pub fn artifact_path(&self, file_name: &str) -> PathBuf {
        self.root.join(file_name)
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed
    }

    /// Start removing the workspace tree without waiting for it.
    ///
    /// Only the first call does anything; later calls (and the drop that
    /// follows) return `None`. Inside a tokio runtime the removal is handed
    /// to the blocking pool and the returned handle completes once the tree
    /// is gone. Outside a runtime it runs inline. A directory that is already
    /// gone is not an error, and any other failure is logged and swallowed.
    pub fn destroy(&mut self) -> Option<JoinHandle<()>> {
        if self.destroyed {
            return None;
        }
        self.destroyed = true;

        let id = self.id;
        let root = self.root.clone();
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => Some(handle.spawn_blocking(move || remove_workspace_tree(id, &root))),
            Err(_) => {
                remove_workspace_tree(id, &root);
                None
            }
        }
    }

    /// Remove the workspace tree and wait until it is gone
    pub async fn release(&mut self) {
        if let Some(removal) = self.destroy() {
            if let Err(e) = removal.await {
                tracing::warn!(job_id = %self.id, error = %e, "Workspace removal task failed");
            }
        }
    }
}

impl Drop for Workspace {
    fn drop(&mut self) {
        self.destroy();
    }
}

fn remove_workspace_tree(id: Uuid, root: &Path) {
    match remove_dir_if_exists(root) {
        Ok(true) => {
            tracing::debug!(job_id = %id, path = %root.display(), "Workspace removed");
        }
        Ok(false) => {
            tracing::debug!(job_id = %id, path = %root.display(), "Workspace already removed");
        }
        Err(e) => {
            tracing::warn!(
                job_id = %id,
                path = %root.display(),
                error = %e,
                "Failed to remove workspace"
            );
        }
    }
}

/// Recursively remove `path`. Returns `Ok(false)` when it did not exist.
pub fn remove_dir_if_exists(path: &Path) -> io::Result<bool> {
    match std::fs::remove_dir_all(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e),
    }
}

/// Remove workspaces left behind under `parent` by a previous process.
///
/// Only directories named like a workspace (a UUID) are touched. Must run
/// before the server accepts requests.
pub async fn sweep_stale_workspaces(parent: &Path) -> Result<usize, WorkspaceError> {
    let mut entries = match tokio::fs::read_dir(parent).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(0),
        Err(source) => {
            return Err(WorkspaceError::Read {
                path: parent.to_path_buf(),
                source,
            })
        }
    };

    let mut removed = 0;
    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|source| WorkspaceError::Read {
            path: parent.to_path_buf(),
            source,
        })?
    {
        let name = entry.file_name();
        let is_workspace = name
            .to_str()
            .map(|n| Uuid::parse_str(n).is_ok())
            .unwrap_or(false);
        let is_dir = entry
            .file_type()
            .await
            .map(|t| t.is_dir())
            .unwrap_or(false);
        if !is_workspace || !is_dir {
            continue;
        }

        let path = entry.path();
        match tokio::task::spawn_blocking(move || remove_dir_if_exists(&path)).await {
            Ok(Ok(_)) => {
                removed += 1;
                tracing::info!(workspace = ?name, "Removed stale workspace");
            }
            Ok(Err(e)) => {
                tracing::warn!(workspace = ?name, error = %e, "Failed to remove stale workspace");
            }
            Err(e) => {
                tracing::warn!(workspace = ?name, error = %e, "Stale workspace removal task failed");
            }
        }
    }

    Ok(removed)
}

/// Poll until `path` disappears, for removals that run in the background
#[cfg(test)]
pub(crate) async fn wait_removed(path: &Path) -> bool {
    for _ in 0..100 {
        if !path.exists() {
            return true;
        }
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }
    !path.exists()
}
