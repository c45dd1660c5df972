//! Error types for planning, diffing and reconciliation

use crate::report::Mismatch;
use diamond_snapshot::SnapshotError;

/// Plan construction errors
#[derive(Debug, thiserror::Error)]
pub enum PlanError {
    /// A planned facet has no compiled artifact
    #[error("facet {facet} is not in the compiled artifacts")]
    UnknownFacet { facet: String },

    #[error("facet {0} is named more than once in the upgrade plan")]
    DuplicateFacet(String),

    #[error("malformed upgrade plan: {0}")]
    Parse(#[from] serde_json::Error),

    /// Two planned facets export the same selector
    #[error("planned state is inconsistent: {0}")]
    Snapshot(#[from] SnapshotError),
}

/// Diff computation errors
#[derive(Debug, thiserror::Error)]
pub enum DiffError {
    #[error("reference snapshot is inconsistent: {0}")]
    Reference(#[source] SnapshotError),

    #[error("planned snapshot is inconsistent: {0}")]
    Planned(#[source] SnapshotError),
}

/// Declared plan and compiled difference disagree
#[derive(Debug, thiserror::Error)]
pub enum ReconcileError {
    #[error("{} reconciliation mismatch(es):\n{}", .0.len(), render(.0))]
    Mismatches(Vec<Mismatch>),
}

fn render(mismatches: &[Mismatch]) -> String {
    mismatches
        .iter()
        .map(|m| format!("  - {m}"))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Working tree inspection errors
#[derive(Debug, Clone, thiserror::Error)]
#[error("cannot inspect working tree: {0}")]
pub struct WorkingTreeError(pub String);
