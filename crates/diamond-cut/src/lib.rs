//! Diamond Cut
//!
//! Applies a validated upgrade plan to a live diamond: deploys the planned
//! facets, submits one atomic `diamondCut` and records the resulting state
//! as the next trusted snapshot.
//!
//! # Architecture
//!
//! ```text
//! Planned → Validated → [Confirmed] → DeployingFacets → CutSubmitted
//!         → CutConfirmed → SnapshotRecaptured
//! ```
//!
//! The ledger, the confirmation prompt and the working tree are injected,
//! so a run can be driven headless against an in-memory ledger.
//!
//! # Example
//!
//! ```rust,ignore
//! use diamond_cut::{AlwaysConfirm, CutOptions, CutOrchestrator, EngineConfig, GitWorkingTree};
//!
//! let config = EngineConfig::load("diamond.toml".as_ref())?;
//! let tree = GitWorkingTree::new(".");
//! let outcome = CutOrchestrator::new(&catalog, &store, &ledger, &tree)
//!     .with_config(&config)
//!     .with_confirmation(&AlwaysConfirm)
//!     .run(&CutOptions::new(diamond, owner, plan))
//!     .await?;
//! println!("{}", outcome.report.summary);
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

pub mod audit;
pub mod config;
pub mod confirm;
pub mod error;
pub mod git;
pub mod instruction;
pub mod ledger;
pub mod orchestrator;
pub mod state;

pub use audit::{CutRecord, ReportWriter, LATEST_DIFF};
pub use config::{ConfigError, EngineConfig, LedgerConfig, NetworkConfig, PathsConfig, RPC_URL_ENV};
pub use confirm::{AlwaysConfirm, AlwaysDeny, Confirmation};
pub use error::{CutError, CutResult};
pub use git::GitWorkingTree;
pub use instruction::{facet_cuts, removal_cut, CutReceipt, FacetCut, FacetCutAction, InitCall};
pub use ledger::{Ledger, LedgerWriter};
pub use orchestrator::{CutOptions, CutOrchestrator, CutOutcome};
pub use state::{allowed_transitions, validate_transition, CutMachine, CutState, StateError};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
