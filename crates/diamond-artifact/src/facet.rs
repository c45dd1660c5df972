//! Facet implementation model
//!
//! A [`FacetImplementation`] is everything the engine knows about one
//! compiled module: which selectors it serves, how each function body and
//! each internal routine fingerprints, and which events it declares.
//! Recomputed from build artifacts on every run; never persisted on its own.

use crate::abi::StateMutability;
use crate::hash::ContentHash;
use crate::selector::{selector_key, Selector};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Function visibility as declared in source
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    External,
    Public,
    Internal,
    Private,
}

impl Visibility {
    /// Parse the solc AST spelling
    #[must_use]
    pub fn from_solc(s: &str) -> Option<Self> {
        match s {
            "external" => Some(Self::External),
            "public" => Some(Self::Public),
            "internal" => Some(Self::Internal),
            "private" => Some(Self::Private),
            _ => None,
        }
    }

    /// Callable from outside the contract
    #[inline]
    #[must_use]
    pub fn is_exported(self) -> bool {
        matches!(self, Self::External | Self::Public)
    }
}

impl fmt::Display for Visibility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::External => "external",
            Self::Public => "public",
            Self::Internal => "internal",
            Self::Private => "private",
        })
    }
}

/// One externally callable function of a facet
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectorInfo {
    pub selector: Selector,
    /// Canonical signature, `f(uint256)`
    pub signature: String,
    pub mutability: StateMutability,
    /// Sanitized AST hash of the function body
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub implementation_hash: Option<ContentHash>,
    /// Hash of the exact source text span
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_hash: Option<ContentHash>,
    /// Display name, `f`
    pub name: String,
}

/// One internal or private routine of a facet
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InternalRoutineInfo {
    pub name: String,
    pub visibility: Visibility,
    pub implementation_hash: ContentHash,
    pub source_hash: ContentHash,
}

/// Everything known about one compiled facet
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FacetImplementation {
    pub name: String,
    /// Source file identifier, `contracts/facets/AlphaFacet.sol`
    pub source_name: String,
    /// keccak-256 of the deployed bytecode
    pub bytecode_hash: ContentHash,
    pub abi_hash: ContentHash,
    selectors: Vec<SelectorInfo>,
    pub internal_routines: Vec<InternalRoutineInfo>,
    pub events: BTreeSet<String>,
}

impl FacetImplementation {
    /// Assemble a facet, enforcing selector uniqueness within it.
    ///
    /// # Errors
    /// Returns error if two functions share a selector
    pub fn new(
        name: impl Into<String>,
        source_name: impl Into<String>,
        bytecode_hash: ContentHash,
        abi_hash: ContentHash,
        selectors: Vec<SelectorInfo>,
    ) -> Result<Self, FacetError> {
        let name = name.into();
        let mut seen = BTreeSet::new();
        for info in &selectors {
            if !seen.insert(info.selector) {
                return Err(FacetError::DuplicateSelector {
                    facet: name,
                    selector: info.selector,
                    signature: info.signature.clone(),
                });
            }
        }
        Ok(Self {
            name,
            source_name: source_name.into(),
            bytecode_hash,
            abi_hash,
            selectors,
            internal_routines: Vec::new(),
            events: BTreeSet::new(),
        })
    }

    /// Attach internal routines
    #[must_use]
    pub fn with_internal_routines(mut self, mut routines: Vec<InternalRoutineInfo>) -> Self {
        routines.sort();
        self.internal_routines = routines;
        self
    }

    /// Attach event signatures
    #[must_use]
    pub fn with_events<I, S>(mut self, events: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.events = events.into_iter().map(Into::into).collect();
        self
    }

    /// Functions in declaration order
    #[inline]
    #[must_use]
    pub fn selectors(&self) -> &[SelectorInfo] {
        &self.selectors
    }

    /// Function info by selector
    #[must_use]
    pub fn selector_info(&self, selector: Selector) -> Option<&SelectorInfo> {
        self.selectors.iter().find(|s| s.selector == selector)
    }

    /// Whether this facet serves `selector`
    #[inline]
    #[must_use]
    pub fn serves(&self, selector: Selector) -> bool {
        self.selector_info(selector).is_some()
    }

    /// Selector-set key for fallback identity matching
    #[must_use]
    pub fn selector_key(&self) -> String {
        selector_key(self.selectors.iter().map(|s| &s.selector))
    }
}

/// Facet model errors
#[derive(Debug, thiserror::Error)]
pub enum FacetError {
    #[error("facet {facet} declares selector {selector} ({signature}) twice")]
    DuplicateSelector {
        facet: String,
        selector: Selector,
        signature: String,
    },
}
