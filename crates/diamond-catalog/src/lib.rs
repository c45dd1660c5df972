//! Diamond Artifact Catalog
//!
//! The trusted boundary between compiled build outputs on disk and the
//! engine's typed facet model.
//!
//! # Architecture
//!
//! ```text
//! artifacts/**.json → CatalogBuilder → ArtifactCatalog (by name / bytecode hash / selector key)
//!                          ↑___________↓
//!                     BuildInfoCache (path + mtime)
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use diamond_catalog::{BuildInfoCache, CatalogBuilder};
//!
//! let cache = BuildInfoCache::default();
//! let build = CatalogBuilder::new("artifacts", &cache).build().await?;
//! let alpha = build.catalog.get("AlphaFacet").expect("compiled");
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

pub mod builder;
pub mod cache;
pub mod catalog;
pub mod error;

pub use builder::{CatalogBuild, CatalogBuilder, SkippedArtifact};
pub use cache::{BuildInfo, BuildInfoCache, BuildSource, CacheStats};
pub use catalog::{ArtifactCatalog, CatalogEntry, IdentityMatch};
pub use error::{BuildInfoError, CatalogError, CatalogResult, SkipReason};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
