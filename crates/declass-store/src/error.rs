//! Error types for the scene store
//!
//! Every variant is fatal for the synchronization run that hit it: a store
//! that cannot be trusted must not be reconciled against further.

use declass_scene::{Dataset, SceneId};
use std::path::PathBuf;

/// Scene store errors
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// IO error reading or writing store files
    #[error("io error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Record or journal entry could not be (de)serialized
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Journal damaged before its final entry
    #[error("corrupt journal {path} at line {line}: {reason}")]
    Corrupt {
        path: PathBuf,
        line: usize,
        reason: String,
    },

    /// Snapshot written by an unknown format version
    #[error("unsupported snapshot version {found} (expected {expected})")]
    UnsupportedVersion { found: u32, expected: u32 },

    /// Another handle holds the store directory in a conflicting mode
    #[error("store {path} is locked by another handle")]
    Locked { path: PathBuf },

    /// Write attempted through a read-only handle
    #[error("store {path} is open read-only")]
    ReadOnly { path: PathBuf },

    /// A scene id was offered under a different dataset than it is stored with
    #[error("scene {scene_id} is stored under {stored}, refusing to move it to {incoming}")]
    DatasetConflict {
        scene_id: SceneId,
        stored: Dataset,
        incoming: Dataset,
    },
}

impl StoreError {
    /// Create IO error for path
    pub fn io_error(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Create corruption error for a journal line (1-based)
    pub fn corrupt(path: impl Into<PathBuf>, line: usize, reason: impl Into<String>) -> Self {
        Self::Corrupt {
            path: path.into(),
            line,
            reason: reason.into(),
        }
    }
}

/// Result type alias for store operations
pub type StoreResult<T> = Result<T, StoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn corrupt_display() {
        let err = StoreError::corrupt("state/journal.jsonl", 3, "checksum mismatch");
        assert_eq!(
            err.to_string(),
            "corrupt journal state/journal.jsonl at line 3: checksum mismatch"
        );
    }

    #[test]
    fn conflict_display() {
        let err = StoreError::DatasetConflict {
            scene_id: SceneId::new("E1"),
            stored: Dataset::DeclassI,
            incoming: Dataset::DeclassII,
        };
        assert!(err.to_string().contains("stored under corona2"));
    }

    #[test]
    fn locked_display() {
        let err = StoreError::Locked {
            path: PathBuf::from("data/store"),
        };
        assert_eq!(err.to_string(), "store data/store is locked by another handle");
    }
}
