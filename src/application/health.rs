//! Read-only health probe over the external runtime and renderer artifact.

use std::{path::PathBuf, process::Stdio, time::Duration};

use serde::Serialize;
use tokio::process::Command;
use tracing::debug;

const VERSION_PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// Structured health status. Absence of the runtime or the jar is reported
/// as field values; the probe itself never fails.
#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    pub status: &'static str,
    pub external_runtime_available: bool,
    pub external_runtime_version: Option<String>,
    pub renderer_artifact_present: bool,
}

#[derive(Debug, Clone)]
pub struct HealthProbe {
    java_path: PathBuf,
    jar_path: PathBuf,
}

impl HealthProbe {
    pub fn new(java_path: PathBuf, jar_path: PathBuf) -> Self {
        Self {
            java_path,
            jar_path,
        }
    }

    pub async fn check(&self) -> HealthReport {
        let external_runtime_version = self.runtime_version().await;
        let external_runtime_available = external_runtime_version.is_some();
        let renderer_artifact_present = tokio::fs::try_exists(&self.jar_path)
            .await
            .unwrap_or(false);

        let status = if external_runtime_available && renderer_artifact_present {
            "ok"
        } else {
            "degraded"
        };

        debug!(
            target = "plantd::health",
            op = "health::check",
            status,
            external_runtime_available,
            renderer_artifact_present,
            "Health probe completed"
        );

        HealthReport {
            status,
            external_runtime_available,
            external_runtime_version,
            renderer_artifact_present,
        }
    }

    /// `java -version` writes its banner to stderr; take the first line.
    async fn runtime_version(&self) -> Option<String> {
        let probe = Command::new(&self.java_path)
            .arg("-version")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output();

        let output = tokio::time::timeout(VERSION_PROBE_TIMEOUT, probe)
            .await
            .ok()?
            .ok()?;
        if !output.status.success() {
            return None;
        }

        let stderr = String::from_utf8_lossy(&output.stderr);
        let stdout = String::from_utf8_lossy(&output.stdout);
        let banner = stderr
            .lines()
            .chain(stdout.lines())
            .map(str::trim)
            .find(|line| !line.is_empty())?;
        Some(banner.to_string())
    }
}
