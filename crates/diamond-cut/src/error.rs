//! Error types for cut orchestration
//!
//! Every variant is fatal for the run. Non-fatal conditions (drift,
//! unresolved live facets, unplanned changes) travel in the diff report.

use crate::state::StateError;
use diamond_artifact::Selector;
use diamond_catalog::CatalogError;
use diamond_diff::{DiffError, PlanError, ReconcileError};
use diamond_snapshot::{LedgerError, SnapshotError, StoreError};
use std::path::PathBuf;

/// Main cut error type
#[derive(Debug, thiserror::Error)]
pub enum CutError {
    #[error("catalog error: {0}")]
    Catalog(#[from] CatalogError),

    #[error("snapshot error: {0}")]
    Snapshot(#[from] SnapshotError),

    #[error("snapshot store error: {0}")]
    Store(#[from] StoreError),

    /// Planned facet absent from compiled artifacts
    #[error("plan error: {0}")]
    Plan(#[from] PlanError),

    #[error("diff error: {0}")]
    Diff(#[from] DiffError),

    /// Declared plan disagrees with the compiled difference
    #[error("reconciliation failed: {0}")]
    Reconcile(#[from] ReconcileError),

    /// Operator declined the production cut
    #[error("cut declined by operator")]
    Declined,

    #[error("confirmation prompt failed: {0}")]
    Prompt(#[source] std::io::Error),

    /// Freshly deployed facet lacks a declared addition (stale artifact)
    #[error("deployed facet {facet} does not export declared selector {selector} ({signature})")]
    MissingSelector {
        facet: String,
        selector: Selector,
        signature: String,
    },

    /// Deployment produced no code
    #[error("deployment of {facet} left no code at {address}")]
    EmptyDeployment { facet: String, address: String },

    /// The plan produced no instructions
    #[error("plan produces no cut instructions")]
    NothingToCut,

    /// Cut transaction mined but reverted
    #[error("cut transaction {tx_hash} reverted")]
    TransactionReverted { tx_hash: String },

    #[error("ledger error: {0}")]
    Ledger(#[from] LedgerError),

    #[error("state machine error: {0}")]
    State(#[from] StateError),

    #[error("io error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot encode audit record: {0}")]
    Encode(#[from] serde_json::Error),
}

impl CutError {
    /// Create IO error for path
    pub fn io_error(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Result type alias for cut operations
pub type CutResult<T> = Result<T, CutError>;
