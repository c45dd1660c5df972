//! Diamond Diff
//!
//! Turns a declared upgrade into an audit-grade answer to "what exactly
//! changes, and does it match what was declared?".
//!
//! # Core Concepts
//!
//! - [`UpgradePlan`] / [`PlanBuilder`]: declared intent, materialized from
//!   the catalog into a [`PlannedSnapshot`]
//! - [`DiffEngine`]: per-facet, per-selector diff of planned against
//!   reference state, with selector moves, removals and drift
//! - [`ReconciliationValidator`]: declared plan against computed diff, plus
//!   the unplanned working-tree guard
//!
//! # Example
//!
//! ```rust,ignore
//! use diamond_diff::{DiffEngine, PlanBuilder, ReconciliationValidator, UpgradePlan};
//!
//! let plan = UpgradePlan::from_json(&std::fs::read_to_string("plan.json")?)?;
//! let planned = PlanBuilder::new(&catalog).build(&plan, &live)?;
//! let report = DiffEngine::new().compute(reference.as_ref(), &planned, &live)?;
//! ReconciliationValidator::new(&catalog).check(&plan, &report)?;
//! println!("{}", report.summary);
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

mod engine;
mod error;
mod plan;
mod reconcile;
mod report;
mod summary;

pub use engine::{facet_diff, DiffEngine};
pub use error::{DiffError, PlanError, ReconcileError, WorkingTreeError};
pub use plan::{PlanBuilder, PlanEntry, PlannedSnapshot, UpgradePlan};
pub use reconcile::{ReconciliationValidator, StaticWorkingTree, WorkingTree};
pub use report::{
    Correspondence, CorrespondenceTier, DiffReport, DriftEntry, FacetDiff, Mismatch,
    MismatchKind, Removal, RoutineChange, SelectorChange, SelectorMove, UnplannedChange,
};
pub use summary::render as render_summary;

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
