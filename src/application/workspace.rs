//! Per-job workspace allocation and guaranteed cleanup.

use std::path::{Path, PathBuf};

use tracing::{debug, warn};
use uuid::Uuid;

use crate::domain::{DiagramFormat, JobStatus};

/// Allocates isolated `{id}.uml` / `{id}.{ext}` path pairs under a fixed
/// temp directory. Identifiers are independently random, so concurrent
/// allocations never collide and need no coordination.
#[derive(Debug, Clone)]
pub struct WorkspaceManager {
    temp_dir: PathBuf,
}

impl WorkspaceManager {
    /// Root the manager at the provided directory, creating it if necessary.
    ///
    /// The stored path is absolute. Relative configuration is resolved
    /// against the process working directory here, once, so the paths handed
    /// to a child process stay valid regardless of the child's own cwd.
    pub fn new(temp_dir: PathBuf) -> Result<Self, std::io::Error> {
        std::fs::create_dir_all(&temp_dir)?;
        let temp_dir = std::path::absolute(temp_dir)?;
        Ok(Self { temp_dir })
    }

    pub fn temp_dir(&self) -> &Path {
        &self.temp_dir
    }

    /// Allocate a fresh workspace for one render job.
    ///
    /// The returned guard removes both files on drop unless
    /// [`Workspace::persist`] hands them over to the artifact store.
    pub fn allocate(&self, format: DiagramFormat) -> Workspace {
        let id = Uuid::new_v4();
        let input_path = self.temp_dir.join(format!("{id}.uml"));
        let output_path = self.temp_dir.join(format!("{id}.{}", format.extension()));
        debug!(
            target = "plantd::workspace",
            job_id = %id,
            format = %format,
            status = %JobStatus::Created,
            "Workspace allocated"
        );
        Workspace {
            id,
            format,
            input_path,
            output_path,
            armed: true,
        }
    }
}

/// One job's pair of input/output paths, cleaned up on drop.
#[derive(Debug)]
pub struct Workspace {
    id: Uuid,
    format: DiagramFormat,
    input_path: PathBuf,
    output_path: PathBuf,
    armed: bool,
}

impl Workspace {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn format(&self) -> DiagramFormat {
        self.format
    }

    pub fn input_path(&self) -> &Path {
        &self.input_path
    }

    pub fn output_path(&self) -> &Path {
        &self.output_path
    }

    /// Disarm the cleanup guard and hand the paths over to the caller.
    ///
    /// Used when a two-phase artifact outlives the generate request; the
    /// artifact store becomes responsible for eventual removal.
    pub fn persist(mut self) -> (Uuid, PathBuf, PathBuf) {
        self.armed = false;
        (
            self.id,
            std::mem::take(&mut self.input_path),
            std::mem::take(&mut self.output_path),
        )
    }
}

impl Drop for Workspace {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        remove_quietly(&self.input_path);
        remove_quietly(&self.output_path);
        debug!(
            target = "plantd::workspace",
            job_id = %self.id,
            status = %JobStatus::Cleaned,
            "Workspace released"
        );
    }
}

/// Best-effort idempotent file removal. Failures are logged, never raised:
/// cleanup must not affect the response already being returned.
pub fn remove_quietly(path: &Path) {
    match std::fs::remove_file(path) {
        Ok(()) => {}
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
        Err(err) => {
            warn!(
                target = "plantd::workspace",
                path = %path.display(),
                error = %err,
                "Failed to remove workspace file"
            );
        }
    }
}

/// Async variant of [`remove_quietly`] for use inside request handlers.
pub async fn remove_quietly_async(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => {}
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
        Err(err) => {
            warn!(
                target = "plantd::workspace",
                path = %path.display(),
                error = %err,
                "Failed to remove workspace file"
            );
        }
    }
}
