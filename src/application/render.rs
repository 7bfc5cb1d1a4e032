//! The render orchestration pipeline: validate → allocate → invoke →
//! negotiate the response → guaranteed cleanup.

use std::io::ErrorKind;
use std::sync::Arc;
use std::time::Instant;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use bytes::Bytes;
use metrics::{counter, histogram};
use time::OffsetDateTime;
use tokio::sync::Semaphore;
use tracing::{debug, info};
use uuid::Uuid;

use crate::application::artifacts::{Artifact, ArtifactStore};
use crate::application::error::RenderError;
use crate::application::invoker::RendererInvoker;
use crate::application::workspace::{WorkspaceManager, remove_quietly_async};
use crate::config::{RendererSettings, ResponseMode};
use crate::domain::{DiagramFormat, JobStatus};

/// What `/generate` hands back, shaped by the configured response mode.
#[derive(Debug)]
pub enum GenerateOutcome {
    /// Canonical two-phase contract: the artifact stays on disk until a
    /// retrieval operation consumes it.
    TwoPhase {
        file_id: Uuid,
        format: DiagramFormat,
    },
    /// Inline contract, textual artifact served as-is.
    InlineText {
        content: String,
        format: DiagramFormat,
    },
    /// Inline contract, binary artifact embedded as base64.
    InlineBinary {
        content: String,
        format: DiagramFormat,
    },
}

/// A retrieved artifact body plus the metadata needed to serve it.
#[derive(Debug)]
pub struct Retrieved {
    pub body: Bytes,
    pub format: DiagramFormat,
    pub file_name: String,
}

pub struct RenderService {
    workspaces: WorkspaceManager,
    invoker: RendererInvoker,
    artifacts: ArtifactStore,
    limiter: Arc<Semaphore>,
    response_mode: ResponseMode,
    default_format: DiagramFormat,
}

impl RenderService {
    pub fn from_settings(settings: &RendererSettings) -> Result<Self, std::io::Error> {
        let workspaces = WorkspaceManager::new(settings.temp_dir.clone())?;
        // The child runs with its cwd inside the temp dir, so every path in
        // its argv must be absolute. The manager already resolved the temp
        // dir; the jar dir gets the same treatment.
        let jar_dir = std::path::absolute(&settings.jar_dir)?;
        let invoker = RendererInvoker::new(
            settings.java_path.clone(),
            jar_dir,
            settings.jar_name.clone(),
            workspaces.temp_dir().to_path_buf(),
            settings.timeout,
        );
        Ok(Self {
            workspaces,
            invoker,
            artifacts: ArtifactStore::new(),
            limiter: Arc::new(Semaphore::new(settings.max_concurrency.get() as usize)),
            response_mode: settings.response_mode,
            default_format: settings.default_format,
        })
    }

    pub fn artifacts(&self) -> &ArtifactStore {
        &self.artifacts
    }

    /// Render one diagram. Validation happens before any filesystem or
    /// process work; the workspace guard releases the temp files on every
    /// path that does not explicitly persist them.
    pub async fn generate(
        &self,
        code: &str,
        format: Option<&str>,
    ) -> Result<GenerateOutcome, RenderError> {
        if code.is_empty() {
            return Err(RenderError::EmptyMarkup);
        }
        let format = self.resolve_format(format)?;

        let started_at = Instant::now();
        let _permit = self
            .limiter
            .acquire()
            .await
            .map_err(|err| RenderError::internal(err.to_string()))?;

        let workspace = self.workspaces.allocate(format);
        let job_id = workspace.id();

        tokio::fs::write(workspace.input_path(), code)
            .await
            .map_err(|err| RenderError::internal(format!("failed to write markup: {err}")))?;
        debug!(
            target = "plantd::render",
            job_id = %job_id,
            status = %JobStatus::InputWritten,
            markup_bytes = code.len(),
            "Markup written to workspace"
        );

        let invocation = self.invoker.invoke(&workspace).await;
        if let Err(err) = invocation {
            let render_error = RenderError::from(err);
            counter!("plantd_render_failure_total", "kind" => render_error.kind()).increment(1);
            return Err(render_error);
        }

        counter!("plantd_render_total").increment(1);
        histogram!("plantd_render_ms").record(started_at.elapsed().as_millis() as f64);

        let outcome = match self.response_mode {
            ResponseMode::TwoPhase => {
                let created_at = OffsetDateTime::now_utc();
                let (id, input_path, output_path) = workspace.persist();
                self.artifacts.insert(Artifact {
                    id,
                    format,
                    input_path,
                    output_path,
                    created_at,
                });
                GenerateOutcome::TwoPhase {
                    file_id: id,
                    format,
                }
            }
            ResponseMode::Inline if format.is_text() => {
                let content = tokio::fs::read_to_string(workspace.output_path())
                    .await
                    .map_err(|err| {
                        RenderError::internal(format!("failed to read artifact: {err}"))
                    })?;
                GenerateOutcome::InlineText { content, format }
            }
            ResponseMode::Inline => {
                let data = tokio::fs::read(workspace.output_path()).await.map_err(|err| {
                    RenderError::internal(format!("failed to read artifact: {err}"))
                })?;
                GenerateOutcome::InlineBinary {
                    content: BASE64.encode(data),
                    format,
                }
            }
        };

        info!(
            target = "plantd::render",
            op = "render::generate",
            result = "ok",
            job_id = %job_id,
            format = %format,
            elapsed_ms = started_at.elapsed().as_millis() as u64,
            "Diagram generated"
        );

        Ok(outcome)
    }

    /// Serve an artifact without consuming it. Repeatable.
    pub async fn preview(&self, id: Uuid, format: DiagramFormat) -> Result<Retrieved, RenderError> {
        let artifact = self.artifacts.get(id, format).ok_or(RenderError::NotFound)?;

        let body = match tokio::fs::read(&artifact.output_path).await {
            Ok(data) => Bytes::from(data),
            Err(err) if err.kind() == ErrorKind::NotFound => {
                // The file vanished underneath the registry; forget the entry
                // and drop the orphaned input.
                self.artifacts.take(id, format);
                remove_quietly_async(&artifact.input_path).await;
                return Err(RenderError::NotFound);
            }
            Err(err) => return Err(RenderError::internal(err.to_string())),
        };

        debug!(
            target = "plantd::render",
            op = "render::preview",
            job_id = %id,
            format = %format,
            status = %JobStatus::Delivered,
            "Artifact previewed"
        );

        Ok(Retrieved {
            body,
            format,
            file_name: artifact_file_name(id, format),
        })
    }

    /// Serve an artifact and consume it: both workspace files are removed,
    /// so a second download of the same pair reports NotFound.
    pub async fn download(&self, id: Uuid, format: DiagramFormat) -> Result<Retrieved, RenderError> {
        let artifact = self
            .artifacts
            .take(id, format)
            .ok_or(RenderError::NotFound)?;

        let read = tokio::fs::read(&artifact.output_path).await;
        let body = match read {
            Ok(data) => Bytes::from(data),
            Err(err) if err.kind() == ErrorKind::NotFound => {
                remove_quietly_async(&artifact.input_path).await;
                return Err(RenderError::NotFound);
            }
            Err(err) => return Err(RenderError::internal(err.to_string())),
        };

        remove_quietly_async(&artifact.output_path).await;
        remove_quietly_async(&artifact.input_path).await;
        info!(
            target = "plantd::render",
            op = "render::download",
            job_id = %id,
            format = %format,
            status = %JobStatus::Cleaned,
            "Artifact delivered and removed"
        );

        Ok(Retrieved {
            body,
            format,
            file_name: artifact_file_name(id, format),
        })
    }

    fn resolve_format(&self, format: Option<&str>) -> Result<DiagramFormat, RenderError> {
        match format {
            Some(value) if !value.is_empty() => Ok(value.parse()?),
            _ => Ok(self.default_format),
        }
    }
}

fn artifact_file_name(id: Uuid, format: DiagramFormat) -> String {
    format!("{id}.{}", format.extension())
}
