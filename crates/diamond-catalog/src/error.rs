//! Error types for the artifact catalog
//!
//! Only directory-level failures are fatal. A single malformed artifact is
//! reported through [`SkipReason`] and left out of the catalog.

use std::path::PathBuf;

/// Errors while building the catalog
#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    /// IO error while scanning the artifact directory
    #[error("io error reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Artifact directory does not exist
    #[error("artifact directory not found: {0}")]
    MissingRoot(PathBuf),
}

impl CatalogError {
    /// Create IO error for path
    pub fn io_error(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Errors while loading a linked build-info record
#[derive(Debug, Clone, thiserror::Error)]
pub enum BuildInfoError {
    #[error("io error reading build info {path}: {message}")]
    Io { path: PathBuf, message: String },

    #[error("malformed build info {path}: {message}")]
    Malformed { path: PathBuf, message: String },
}

/// Why an artifact file was left out of the catalog
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// Not a contract artifact (no contract name / abi)
    NotAnArtifact,
    /// Interface, abstract contract or library without runtime code
    EmptyBytecode,
    /// Bytecode is not valid hex (unlinked library placeholders)
    UndecodableBytecode,
    /// The interface could not be parsed
    MalformedAbi(String),
    /// Two functions share a selector
    DuplicateSelector(String),
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotAnArtifact => f.write_str("not a contract artifact"),
            Self::EmptyBytecode => f.write_str("no deployed bytecode"),
            Self::UndecodableBytecode => f.write_str("bytecode is not valid hex"),
            Self::MalformedAbi(msg) => write!(f, "malformed abi: {msg}"),
            Self::DuplicateSelector(msg) => write!(f, "duplicate selector: {msg}"),
        }
    }
}

/// Result type alias for catalog operations
pub type CatalogResult<T> = Result<T, CatalogError>;
