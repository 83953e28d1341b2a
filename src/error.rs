//! Unified error type for the search engine.

use thiserror::Error;

use crate::pipeline::ScanFailure;

/// Why a snapshot could not be loaded. The live store is never touched when
/// any of these occur.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LoadFailure {
    #[error("file not found")]
    NotFound,

    #[error("path is not a regular file")]
    NotAFile,

    #[error("file is empty (0 bytes)")]
    Empty,

    #[error("file is corrupt or not a snapshot: {0}")]
    Corrupt(String),

    #[error("unsupported snapshot version '{0}' (supported: 1.0, 1.1)")]
    UnsupportedVersion(String),

    #[error("snapshot too large to load into memory ({size} bytes, limit {limit})")]
    OutOfMemory { size: u64, limit: u64 },
}

/// All errors that can occur in search operations.
#[derive(Error, Debug)]
pub enum SearchError {
    /// I/O error (file read/write, directory access)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error (bincode)
    #[error("Serialization error: {0}")]
    Serialization(#[from] bincode::Error),

    /// Config file could not be parsed
    #[error("Invalid config file {path}: {source}")]
    Config {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    /// Directory does not exist
    #[error("Directory does not exist: {0}")]
    DirNotFound(String),

    /// Failed to save a snapshot to disk
    #[error("Failed to save index: {0}")]
    SaveFailed(String),

    /// Mutually exclusive flags or other argument validation error
    #[error("{0}")]
    InvalidArgs(String),

    /// A scan stopped for a reason other than missing folders
    #[error(transparent)]
    Scan(#[from] ScanFailure),

    /// Failed to load a snapshot from disk
    #[error("Failed to load index from {path}: {kind}")]
    IndexLoad { path: String, kind: LoadFailure },
}

impl SearchError {
    /// The load failure kind, when this error came from reading a snapshot.
    pub fn load_failure(&self) -> Option<&LoadFailure> {
        match self {
            SearchError::IndexLoad { kind, .. } => Some(kind),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_error_display() {
        let err = SearchError::Io(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            "file not found",
        ));
        assert!(err.to_string().contains("I/O error"));
        assert!(err.to_string().contains("file not found"));
    }

    #[test]
    fn test_dir_not_found_display() {
        let err = SearchError::DirNotFound("/nonexistent".to_string());
        assert!(err.to_string().contains("/nonexistent"));
    }

    #[test]
    fn test_index_load_display_names_path_and_kind() {
        let err = SearchError::IndexLoad {
            path: "/tmp/a.fxidx".to_string(),
            kind: LoadFailure::UnsupportedVersion("9.9".to_string()),
        };
        let msg = err.to_string();
        assert!(msg.contains("/tmp/a.fxidx"));
        assert!(msg.contains("9.9"));
        assert_eq!(
            err.load_failure(),
            Some(&LoadFailure::UnsupportedVersion("9.9".to_string()))
        );
    }

    #[test]
    fn test_load_failure_messages_are_distinct() {
        let kinds = [
            LoadFailure::NotFound,
            LoadFailure::NotAFile,
            LoadFailure::Empty,
            LoadFailure::Corrupt("bad magic".to_string()),
            LoadFailure::UnsupportedVersion("2.0".to_string()),
            LoadFailure::OutOfMemory { size: 10, limit: 5 },
        ];
        let messages: std::collections::HashSet<String> =
            kinds.iter().map(|k| k.to_string()).collect();
        assert_eq!(messages.len(), kinds.len());
    }

    #[test]
    fn test_scan_failure_message_is_not_prefixed() {
        let err: SearchError = ScanFailure::Aborted("worker died".to_string()).into();
        assert_eq!(err.to_string(), "Indexing failed: worker died");
        let err: SearchError = ScanFailure::NoFolders.into();
        assert_eq!(err.to_string(), "No folders to scan");
    }

    #[test]
    fn test_io_error_from_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "access denied");
        let search_err: SearchError = io_err.into();
        assert!(matches!(search_err, SearchError::Io(_)));
        assert!(search_err.load_failure().is_none());
    }
}
