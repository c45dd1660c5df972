//! Diamond RPC
//!
//! [`JsonRpcLedger`] implements both ledger traits over an Ethereum-style
//! JSON-RPC endpoint. Transactions are sent from an account the node keeps
//! unlocked (`--signer unlocked`); no key material passes through here.
//!
//! # Example
//!
//! ```rust,ignore
//! use diamond_rpc::JsonRpcLedger;
//!
//! let ledger = JsonRpcLedger::from_config(&config);
//! let facets = ledger.facets(diamond).await?;
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

pub mod abi;
mod client;

pub use abi::{decode_facets, encode_diamond_cut, DIAMOND_CUT, FACETS};
pub use client::JsonRpcLedger;

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
