//! External renderer invocation: command construction, environment assembly,
//! output capture.

use std::{
    io::{self, ErrorKind},
    path::PathBuf,
    process::Stdio,
    time::{Duration, Instant},
};

use thiserror::Error;
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::application::plugins::assemble_classpath;
use crate::application::workspace::Workspace;
use crate::domain::JobStatus;

#[derive(Debug, Error)]
pub enum InvokeError {
    /// Nonzero exit from the renderer. The stderr text is kept verbatim;
    /// it is the diagnostic the caller sees.
    #[error("{stderr}")]
    Renderer {
        exit_code: Option<i32>,
        stderr: String,
    },
    /// Zero exit but no artifact on disk. Signals a renderer/host mismatch
    /// rather than a markup error.
    #[error("renderer reported success but produced no output file")]
    OutputMissing,
    #[error("renderer exceeded the {0:?} time limit")]
    Timeout(Duration),
    #[error("renderer executable unavailable: {0}")]
    NotFound(io::Error),
    #[error("failed to run renderer: {0}")]
    Io(#[from] io::Error),
}

/// Invokes the renderer jar as a child process.
///
/// The host environment is inherited by each child; the assembled plugin
/// search path is injected only into that child's copy, so concurrent
/// invocations never observe each other's environment.
#[derive(Debug, Clone)]
pub struct RendererInvoker {
    java_path: PathBuf,
    jar_dir: PathBuf,
    jar_name: String,
    work_dir: PathBuf,
    timeout: Duration,
}

impl RendererInvoker {
    /// `jar_dir` and `work_dir` must be absolute: the child runs with its
    /// cwd set to `work_dir` and resolves every argv path against it.
    pub fn new(
        java_path: PathBuf,
        jar_dir: PathBuf,
        jar_name: String,
        work_dir: PathBuf,
        timeout: Duration,
    ) -> Self {
        Self {
            java_path,
            jar_dir,
            jar_name,
            work_dir,
            timeout,
        }
    }

    pub fn jar_path(&self) -> PathBuf {
        self.jar_dir.join(&self.jar_name)
    }

    /// Run the renderer for one workspace and wait for it to finish.
    ///
    /// The subprocess runs asynchronously; awaiting it blocks only this
    /// request's task, never the runtime.
    pub async fn invoke(&self, workspace: &Workspace) -> Result<(), InvokeError> {
        let started_at = Instant::now();
        let format = workspace.format();

        let mut command = Command::new(&self.java_path);
        command
            .arg("-jar")
            .arg(self.jar_path())
            .arg(format!("-t{}", format.extension()))
            .arg("-charset")
            .arg("UTF-8")
            .arg(workspace.input_path())
            .current_dir(&self.work_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        if let Some(classpath) = assemble_classpath(&self.jar_dir, &self.jar_name) {
            command.env("CLASSPATH", classpath);
        }

        debug!(
            target = "plantd::invoker",
            job_id = %workspace.id(),
            format = %format,
            status = %JobStatus::Invoked,
            "Renderer invoked"
        );

        let output = match tokio::time::timeout(self.timeout, command.output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(err)) => {
                warn!(
                    target = "plantd::invoker",
                    op = "invoker::invoke",
                    result = "error",
                    job_id = %workspace.id(),
                    elapsed_ms = started_at.elapsed().as_millis() as u64,
                    error_code = "spawn_renderer",
                    error = %err,
                    "Failed to spawn renderer"
                );
                return Err(if err.kind() == ErrorKind::NotFound {
                    InvokeError::NotFound(err)
                } else {
                    InvokeError::Io(err)
                });
            }
            // The child future is dropped here; kill_on_drop reaps it.
            Err(_) => {
                warn!(
                    target = "plantd::invoker",
                    op = "invoker::invoke",
                    result = "timeout",
                    job_id = %workspace.id(),
                    elapsed_ms = started_at.elapsed().as_millis() as u64,
                    timeout_ms = self.timeout.as_millis() as u64,
                    "Renderer killed after exceeding time limit"
                );
                return Err(InvokeError::Timeout(self.timeout));
            }
        };

        if !output.status.success() {
            let exit_code = output.status.code();
            let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
            warn!(
                target = "plantd::invoker",
                op = "invoker::invoke",
                result = "error",
                job_id = %workspace.id(),
                status = %JobStatus::RenderFailure,
                elapsed_ms = started_at.elapsed().as_millis() as u64,
                exit_code = exit_code.map(i64::from).unwrap_or(-1),
                stderr = %stderr,
                "Renderer invocation failed"
            );
            return Err(InvokeError::Renderer { exit_code, stderr });
        }

        match tokio::fs::try_exists(workspace.output_path()).await {
            Ok(true) => {}
            Ok(false) => {
                warn!(
                    target = "plantd::invoker",
                    op = "invoker::invoke",
                    result = "error",
                    job_id = %workspace.id(),
                    status = %JobStatus::OutputMissing,
                    elapsed_ms = started_at.elapsed().as_millis() as u64,
                    output_path = %workspace.output_path().display(),
                    "Renderer exited cleanly but produced no output file"
                );
                return Err(InvokeError::OutputMissing);
            }
            Err(err) => return Err(InvokeError::Io(err)),
        }

        info!(
            target = "plantd::invoker",
            op = "invoker::invoke",
            result = "ok",
            job_id = %workspace.id(),
            format = %format,
            status = %JobStatus::Succeeded,
            elapsed_ms = started_at.elapsed().as_millis() as u64,
            "Diagram rendered"
        );

        Ok(())
    }
}
