//! Cut lifecycle state machine
//!
//! ```text
//! Planned → Validated → [Confirmed] → DeployingFacets → CutSubmitted
//!         → CutConfirmed → SnapshotRecaptured
//! ```
//!
//! `Confirmed` is mandatory on production networks and skipped elsewhere.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Where a cut run currently is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CutState {
    Planned,
    Validated,
    Confirmed,
    DeployingFacets,
    CutSubmitted,
    CutConfirmed,
    SnapshotRecaptured,
}

impl fmt::Display for CutState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Planned => "PLANNED",
            Self::Validated => "VALIDATED",
            Self::Confirmed => "CONFIRMED",
            Self::DeployingFacets => "DEPLOYING-FACETS",
            Self::CutSubmitted => "CUT-SUBMITTED",
            Self::CutConfirmed => "CUT-CONFIRMED",
            Self::SnapshotRecaptured => "SNAPSHOT-RECAPTURED",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StateError {
    #[error("illegal cut state transition {from} -> {to}")]
    IllegalTransition { from: CutState, to: CutState },
}

/// States reachable from `from`
#[must_use]
pub fn allowed_transitions(from: CutState, production: bool) -> Vec<CutState> {
    use CutState::*;
    match from {
        Planned => vec![Validated],
        Validated if production => vec![Confirmed],
        Validated => vec![DeployingFacets],
        Confirmed => vec![DeployingFacets],
        DeployingFacets => vec![CutSubmitted],
        CutSubmitted => vec![CutConfirmed],
        CutConfirmed => vec![SnapshotRecaptured],
        SnapshotRecaptured => vec![],
    }
}

/// Validates a state transition.
///
/// # Errors
/// Returns [`StateError::IllegalTransition`] for any edge not in the lifecycle
pub fn validate_transition(from: CutState, to: CutState, production: bool) -> Result<(), StateError> {
    if allowed_transitions(from, production).contains(&to) {
        Ok(())
    } else {
        Err(StateError::IllegalTransition { from, to })
    }
}

/// Tracks the state of one run
#[derive(Debug, Clone)]
pub struct CutMachine {
    state: CutState,
    production: bool,
}

impl CutMachine {
    /// Fresh run in `Planned`
    #[must_use]
    pub fn new(production: bool) -> Self {
        Self {
            state: CutState::Planned,
            production,
        }
    }

    /// Current state
    #[inline]
    #[must_use]
    pub fn state(&self) -> CutState {
        self.state
    }

    /// Move to `to`
    ///
    /// # Errors
    /// Returns error if the edge is not allowed
    pub fn advance(&mut self, to: CutState) -> Result<(), StateError> {
        validate_transition(self.state, to, self.production)?;
        tracing::info!(from = %self.state, to = %to, "cut state");
        self.state = to;
        Ok(())
    }
}
