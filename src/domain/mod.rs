pub mod format;
pub mod job;

pub use format::DiagramFormat;
pub use job::JobStatus;
