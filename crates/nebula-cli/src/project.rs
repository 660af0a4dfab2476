//! Project snapshot files

use anyhow::Context;
use nebula_graph::{CanvasStore, ProjectSnapshot};
use std::path::Path;

/// Project name derived from the snapshot path
#[must_use]
pub fn project_name(path: &Path) -> String {
    path.file_stem()
        .map_or_else(|| "untitled".to_string(), |s| s.to_string_lossy().into_owned())
}

/// Load a store from `path`; a missing file starts a fresh canvas
///
/// # Errors
/// Fails when the file exists but cannot be read or parsed.
pub fn load(path: &Path) -> anyhow::Result<CanvasStore> {
    if !path.exists() {
        tracing::info!("No project at {}, starting fresh", path.display());
        return Ok(CanvasStore::new());
    }
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading project {}", path.display()))?;
    let snapshot: ProjectSnapshot = serde_json::from_str(&text)
        .with_context(|| format!("parsing project {}", path.display()))?;
    Ok(CanvasStore::restore(snapshot))
}

/// Write the store's current canvas to `path`
///
/// # Errors
/// Fails when the file cannot be written.
pub fn save(store: &CanvasStore, path: &Path) -> anyhow::Result<()> {
    let snapshot = store.export(project_name(path));
    let text = serde_json::to_string_pretty(&snapshot)?;
    std::fs::write(path, text).with_context(|| format!("writing project {}", path.display()))?;
    tracing::debug!("Saved {} nodes to {}", snapshot.nodes.len(), path.display());
    Ok(())
}
