//! Diamond Snapshots
//!
//! Typed records of which facet serves which selector, captured from the
//! live ledger and kept in an append-only, hash-chained history.
//!
//! # Overview
//!
//! - **DiamondSnapshot**: selector → facet assignment at one block, with the
//!   diamond uniqueness invariant
//! - **SnapshotCapturer**: reads the diamond through a [`LedgerReader`] and
//!   resolves facet identity against the artifact catalog
//! - **SnapshotStore**: one history stream per (chain, diamond)
//!
//! # Example
//!
//! ```rust,ignore
//! use diamond_snapshot::{SnapshotCapturer, SnapshotStore};
//!
//! let live = SnapshotCapturer::new(&ledger, &catalog, "localhost")
//!     .capture(diamond)
//!     .await?;
//! let store = SnapshotStore::new("deployments/snapshots");
//! let reference = store.read_latest(live.chain_id, &diamond).await?;
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

pub mod capture;
pub mod error;
pub mod ledger;
pub mod snapshot;
pub mod store;

pub use capture::SnapshotCapturer;
pub use error::{SnapshotError, StoreError};
pub use ledger::{BlockInfo, LedgerError, LedgerReader, LiveFacet};
pub use snapshot::{DiamondSnapshot, FacetRecord, SelectorCollision, SelectorEntry};
pub use store::{HistoryEntry, SnapshotStore};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
