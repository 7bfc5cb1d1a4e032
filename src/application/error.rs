//! User-facing failure taxonomy for the render pipeline.

use thiserror::Error;

use crate::application::invoker::InvokeError;
use crate::domain::format::UnsupportedFormat;

/// Everything a render or retrieval operation can report to the caller.
///
/// The HTTP layer maps each variant to a status code and the uniform
/// `{success: false, error}` envelope.
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("no diagram markup provided")]
    EmptyMarkup,
    #[error(transparent)]
    UnsupportedFormat(#[from] UnsupportedFormat),
    /// Nonzero renderer exit. The message is the captured stderr, verbatim.
    #[error("{stderr}")]
    RenderFailed { stderr: String },
    #[error("rendering produced no output file")]
    OutputMissing,
    #[error("artifact not found")]
    NotFound,
    #[error("internal error: {0}")]
    Internal(String),
}

impl RenderError {
    pub fn internal(detail: impl Into<String>) -> Self {
        Self::Internal(detail.into())
    }

    /// Stable label for logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            RenderError::EmptyMarkup | RenderError::UnsupportedFormat(_) => "validation",
            RenderError::RenderFailed { .. } => "render_failure",
            RenderError::OutputMissing => "output_missing",
            RenderError::NotFound => "not_found",
            RenderError::Internal(_) => "internal",
        }
    }
}

impl From<InvokeError> for RenderError {
    fn from(error: InvokeError) -> Self {
        match error {
            InvokeError::Renderer { stderr, .. } => RenderError::RenderFailed { stderr },
            InvokeError::OutputMissing => RenderError::OutputMissing,
            // A killed render is reported like any other render failure.
            InvokeError::Timeout(limit) => RenderError::RenderFailed {
                stderr: format!("renderer exceeded the {}s time limit", limit.as_secs()),
            },
            InvokeError::NotFound(err) => {
                RenderError::internal(format!("renderer executable unavailable: {err}"))
            }
            InvokeError::Io(err) => RenderError::internal(err.to_string()),
        }
    }
}
