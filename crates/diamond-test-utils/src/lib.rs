//! Testing utilities for the diamond workspace
//!
//! Shared fixtures: an in-memory ledger, catalog and snapshot builders, a
//! Hardhat-style artifact directory writer and a one-shot JSON-RPC endpoint.

#![allow(missing_docs)]

mod artifacts;
mod facets;
mod ledger;
mod rpc;

pub use artifacts::ArtifactDir;
pub use facets::{address, catalog, hash, selector, snapshot, FacetFixture, CHAIN_ID};
pub use ledger::InMemoryLedger;
pub use rpc::serve_json_once;
