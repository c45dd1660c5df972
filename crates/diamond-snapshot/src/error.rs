//! Error types for snapshots and their store

use crate::ledger::LedgerError;
use diamond_artifact::Selector;
use std::path::PathBuf;

/// Snapshot model and capture errors
#[derive(Debug, thiserror::Error)]
pub enum SnapshotError {
    /// A selector is served by more than one facet record
    #[error("selector {selector} is served by more than one facet: {}", facets.join(", "))]
    SelectorCollision {
        selector: Selector,
        facets: Vec<String>,
    },

    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

/// Snapshot store errors
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("io error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed snapshot data in {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// The stored hash chain does not verify
    #[error("snapshot history {path} fails integrity check at sequence {sequence}")]
    IntegrityViolation { path: PathBuf, sequence: u64 },

    #[error(transparent)]
    Snapshot(#[from] SnapshotError),
}

impl StoreError {
    /// Create IO error for path
    pub fn io_error(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Create JSON error for path
    pub fn json_error(path: impl Into<PathBuf>, source: serde_json::Error) -> Self {
        Self::Json {
            path: path.into(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collision_lists_facets() {
        let err = SnapshotError::SelectorCollision {
            selector: Selector::new([0xa9, 0x05, 0x9c, 0xbb]),
            facets: vec!["Alpha".into(), "Beta".into()],
        };
        assert_eq!(
            err.to_string(),
            "selector 0xa9059cbb is served by more than one facet: Alpha, Beta"
        );
    }
}
