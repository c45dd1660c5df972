//! Diamond Artifact Model
//!
//! Typed, content-addressed description of compiled diamond facets.
//!
//! # Core Concepts
//!
//! - [`ContentHash`]: 32-byte digest (blake3 for structure, keccak-256 for bytecode)
//! - [`Selector`]: 4-byte function routing key
//! - [`Address`]: ledger account address
//! - [`AbiSurface`]: canonical signatures and events of an interface
//! - [`FacetImplementation`]: everything known about one compiled facet
//! - [`ast`]: sanitized structural fingerprints of function bodies
//!
//! # Example
//!
//! ```rust,ignore
//! use diamond_artifact::{AbiSurface, Selector};
//!
//! let surface = AbiSurface::parse(&artifact["abi"])?;
//! for function in &surface.functions {
//!     println!("{} {}", function.selector, function.signature);
//! }
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

mod abi;
mod address;
mod facet;
mod hash;
mod selector;

pub mod ast;

pub use abi::{AbiEntry, AbiError, AbiFunction, AbiParam, AbiSurface, StateMutability};
pub use address::Address;
pub use facet::{FacetError, FacetImplementation, InternalRoutineInfo, SelectorInfo, Visibility};
pub use hash::{canonical_json, decode_hex, strip_0x, ContentHash, HashError};
pub use selector::{selector_key, Selector, SelectorRef};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
