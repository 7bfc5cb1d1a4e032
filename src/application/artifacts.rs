//! Registry of rendered artifacts awaiting two-phase retrieval.

use std::path::PathBuf;

use dashmap::DashMap;
use time::OffsetDateTime;
use tracing::debug;
use uuid::Uuid;

use crate::domain::DiagramFormat;

/// A materialized renderer output, keyed by job id and format.
///
/// Logically owned by the store, physically owned by the filesystem: the
/// entry exists exactly while the file does.
#[derive(Debug, Clone)]
pub struct Artifact {
    pub id: Uuid,
    pub format: DiagramFormat,
    pub input_path: PathBuf,
    pub output_path: PathBuf,
    pub created_at: OffsetDateTime,
}

/// Tracks which `(id, format)` pairs currently have a file on disk.
///
/// Ids are independently random, so there is at most one artifact per pair
/// by construction; the map never sees a conflicting insert.
#[derive(Debug, Default)]
pub struct ArtifactStore {
    entries: DashMap<(Uuid, DiagramFormat), Artifact>,
}

impl ArtifactStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, artifact: Artifact) {
        debug!(
            target = "plantd::artifacts",
            job_id = %artifact.id,
            format = %artifact.format,
            "Artifact registered"
        );
        self.entries
            .insert((artifact.id, artifact.format), artifact);
    }

    /// Non-destructive lookup, used by `preview`.
    pub fn get(&self, id: Uuid, format: DiagramFormat) -> Option<Artifact> {
        self.entries
            .get(&(id, format))
            .map(|entry| entry.value().clone())
    }

    /// Destructive lookup, used by `download`. The caller becomes
    /// responsible for removing the files.
    pub fn take(&self, id: Uuid, format: DiagramFormat) -> Option<Artifact> {
        self.entries
            .remove(&(id, format))
            .map(|(_, artifact)| artifact)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
