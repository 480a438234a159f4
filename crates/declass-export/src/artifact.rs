//! Atomic artifact writes
//!
//! The artifact is written to a temporary file next to its destination and
//! renamed over it, so readers see either the previous artifact or the new
//! one in full.

use crate::error::ExportError;
use crate::geojson::FeatureCollection;
use std::fs;
use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;
use tracing::info;

/// Serialized artifact bytes: pretty JSON with a trailing newline
///
/// # Errors
/// Returns [`ExportError::Serialization`] if serialization fails
pub fn to_json_bytes(collection: &FeatureCollection) -> Result<Vec<u8>, ExportError> {
    let mut bytes = serde_json::to_vec_pretty(collection)?;
    bytes.push(b'\n');
    Ok(bytes)
}

/// Replace the artifact at `path` with `collection`
///
/// Missing parent directories are created.
///
/// # Errors
/// Returns [`ExportError::Io`] if the temporary file cannot be written or
/// renamed into place
pub fn write_artifact(path: &Path, collection: &FeatureCollection) -> Result<(), ExportError> {
    let bytes = to_json_bytes(collection)?;
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(parent).map_err(|e| ExportError::io_error(parent, e))?;

    let mut tmp = NamedTempFile::new_in(parent).map_err(|e| ExportError::io_error(parent, e))?;
    tmp.write_all(&bytes)
        .and_then(|()| tmp.as_file().sync_all())
        .map_err(|e| ExportError::io_error(tmp.path(), e))?;
    tmp.persist(path)
        .map_err(|e| ExportError::io_error(path, e.error))?;

    info!(
        path = %path.display(),
        features = collection.len(),
        bytes = bytes.len(),
        "wrote availability artifact"
    );
    Ok(())
}
