//! Plugin search-path assembly for the renderer subprocess.

use std::ffi::OsString;
use std::path::Path;

use tracing::warn;

/// Collect every `.jar` in the jar directory except the core renderer jar
/// and join them into a `CLASSPATH` value using the host's path-list
/// convention. Returns `None` when no plugins are present, in which case the
/// variable is omitted rather than set empty.
///
/// Read-only over the directory, so safe under arbitrary request concurrency.
pub fn assemble_classpath(jar_dir: &Path, renderer_jar_name: &str) -> Option<OsString> {
    let entries = match std::fs::read_dir(jar_dir) {
        Ok(entries) => entries,
        Err(err) => {
            warn!(
                target = "plantd::plugins",
                jar_dir = %jar_dir.display(),
                error = %err,
                "Failed to list plugin directory; renderer runs without plugins"
            );
            return None;
        }
    };

    let mut jars: Vec<_> = entries
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| {
            path.extension().and_then(|ext| ext.to_str()) == Some("jar")
                && path.file_name().and_then(|name| name.to_str()) != Some(renderer_jar_name)
        })
        .collect();

    if jars.is_empty() {
        return None;
    }

    // Directory iteration order is platform-dependent; keep the value stable.
    jars.sort();

    match std::env::join_paths(jars) {
        Ok(classpath) => Some(classpath),
        Err(err) => {
            warn!(
                target = "plantd::plugins",
                jar_dir = %jar_dir.display(),
                error = %err,
                "Plugin path contained an invalid component; renderer runs without plugins"
            );
            None
        }
    }
}
