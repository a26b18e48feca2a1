//! `hashes.json`: the persisted edition -> hash map.

use crate::error::ArtifactError;
use crate::extraction::rows::HashTable;
use serde::Serialize;
use std::path::Path;
use tracing::info;

/// Serialize `table` as a pretty-printed JSON object (4-space indent) and
/// overwrite `path` with it. Empty tables are refused.
pub fn write_artifact(path: &Path, table: &HashTable) -> Result<(), ArtifactError> {
    if table.is_empty() {
        return Err(ArtifactError::Empty(path.to_path_buf()));
    }

    let mut buf = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
    table.serialize(&mut ser).map_err(|source| ArtifactError::Json {
        path: path.to_path_buf(),
        source,
    })?;
    buf.push(b'\n');

    std::fs::write(path, &buf).map_err(|source| ArtifactError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    info!("wrote {} hashes to {}", table.len(), path.display());
    Ok(())
}

/// Load a previously written artifact.
pub fn read_artifact(path: &Path) -> Result<HashTable, ArtifactError> {
    let data = std::fs::read_to_string(path).map_err(|source| ArtifactError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&data).map_err(|source| ArtifactError::Json {
        path: path.to_path_buf(),
        source,
    })
}
