//! Render-job lifecycle states.

use std::fmt;

/// States a render job moves through between allocation and cleanup.
///
/// `Cleaned` is the only terminal state; every other state reaches it, either
/// through the workspace guard (failures, inline responses) or through the
/// destructive download of a two-phase artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStatus {
    Created,
    InputWritten,
    Invoked,
    Succeeded,
    RenderFailure,
    OutputMissing,
    Delivered,
    Cleaned,
}

impl JobStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            JobStatus::Created => "created",
            JobStatus::InputWritten => "input_written",
            JobStatus::Invoked => "invoked",
            JobStatus::Succeeded => "succeeded",
            JobStatus::RenderFailure => "render_failure",
            JobStatus::OutputMissing => "output_missing",
            JobStatus::Delivered => "delivered",
            JobStatus::Cleaned => "cleaned",
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
