//! Point-in-time diamond state
//!
//! A [`DiamondSnapshot`] records which facet served which selector at one
//! block. Across a whole snapshot a selector belongs to at most one facet
//! record; [`DiamondSnapshot::validate`] surfaces any violation instead of
//! deduplicating it.

use crate::error::SnapshotError;
use diamond_artifact::{
    Address, ContentHash, FacetImplementation, InternalRoutineInfo, Selector, SelectorInfo,
    StateMutability,
};
use diamond_catalog::IdentityMatch;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// One selector served by a facet record
///
/// Live facets that could not be resolved carry the bare selector only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectorEntry {
    pub selector: Selector,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mutability: Option<StateMutability>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub implementation_hash: Option<ContentHash>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_hash: Option<ContentHash>,
}

impl SelectorEntry {
    /// Selector with no metadata
    #[must_use]
    pub fn unlabeled(selector: Selector) -> Self {
        Self {
            selector,
            signature: None,
            name: None,
            mutability: None,
            implementation_hash: None,
            source_hash: None,
        }
    }

    /// Signature if known, otherwise the hex id
    #[must_use]
    pub fn label(&self) -> String {
        self.signature
            .clone()
            .unwrap_or_else(|| self.selector.to_string())
    }
}

impl From<&SelectorInfo> for SelectorEntry {
    fn from(info: &SelectorInfo) -> Self {
        Self {
            selector: info.selector,
            signature: Some(info.signature.clone()),
            name: Some(info.name.clone()),
            mutability: Some(info.mutability),
            implementation_hash: info.implementation_hash,
            source_hash: info.source_hash,
        }
    }
}

/// One facet as recorded in a snapshot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FacetRecord {
    /// Facet name, absent when identity could not be resolved
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Deployed address, absent in planned snapshots
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<Address>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bytecode_hash: Option<ContentHash>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub abi_hash: Option<ContentHash>,
    /// How the name was resolved for live facets
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolved_by: Option<IdentityMatch>,
    pub selectors: Vec<SelectorEntry>,
    #[serde(default)]
    pub internal_routines: Vec<InternalRoutineInfo>,
    #[serde(default)]
    pub events: Vec<String>,
}

impl FacetRecord {
    /// Record carrying the full compiled surface of a facet
    #[must_use]
    pub fn from_implementation(facet: &FacetImplementation, address: Option<Address>) -> Self {
        Self {
            name: Some(facet.name.clone()),
            address,
            source_name: Some(facet.source_name.clone()),
            bytecode_hash: Some(facet.bytecode_hash),
            abi_hash: Some(facet.abi_hash),
            resolved_by: None,
            selectors: facet.selectors().iter().map(SelectorEntry::from).collect(),
            internal_routines: facet.internal_routines.clone(),
            events: facet.events.iter().cloned().collect(),
        }
    }

    /// Record for a live facet that matched nothing in the catalog
    #[must_use]
    pub fn address_only(
        address: Address,
        bytecode_hash: Option<ContentHash>,
        selectors: &[Selector],
    ) -> Self {
        Self {
            name: None,
            address: Some(address),
            source_name: None,
            bytecode_hash,
            abi_hash: None,
            resolved_by: None,
            selectors: selectors.iter().copied().map(SelectorEntry::unlabeled).collect(),
            internal_routines: Vec::new(),
            events: Vec::new(),
        }
    }

    /// Name, else address, for messages
    #[must_use]
    pub fn label(&self) -> String {
        match (&self.name, &self.address) {
            (Some(name), _) => name.clone(),
            (None, Some(address)) => address.to_string(),
            (None, None) => "<unnamed>".to_string(),
        }
    }

    /// Selector ids served by this record
    #[must_use]
    pub fn selector_set(&self) -> BTreeSet<Selector> {
        self.selectors.iter().map(|e| e.selector).collect()
    }

    /// Entry for `selector`
    #[must_use]
    pub fn entry(&self, selector: Selector) -> Option<&SelectorEntry> {
        self.selectors.iter().find(|e| e.selector == selector)
    }

    /// Whether this record serves `selector`
    #[inline]
    #[must_use]
    pub fn serves(&self, selector: Selector) -> bool {
        self.entry(selector).is_some()
    }
}

/// Recorded selector → facet assignment at one block
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiamondSnapshot {
    pub diamond: Address,
    pub chain_id: u64,
    pub network: String,
    pub block_number: u64,
    pub timestamp: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub git_commit: Option<String>,
    pub facets: Vec<FacetRecord>,
}

/// A selector claimed by more than one facet record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectorCollision {
    pub selector: Selector,
    pub facets: Vec<String>,
}

impl DiamondSnapshot {
    /// Check the diamond uniqueness invariant.
    ///
    /// # Errors
    /// Returns the first selector served by two or more records
    pub fn validate(&self) -> Result<(), SnapshotError> {
        match self.collisions().into_iter().next() {
            Some(collision) => Err(SnapshotError::SelectorCollision {
                selector: collision.selector,
                facets: collision.facets,
            }),
            None => Ok(()),
        }
    }

    /// Every selector served by more than one record, in selector order
    #[must_use]
    pub fn collisions(&self) -> Vec<SelectorCollision> {
        let mut claims: BTreeMap<Selector, Vec<String>> = BTreeMap::new();
        for facet in &self.facets {
            for entry in &facet.selectors {
                claims.entry(entry.selector).or_default().push(facet.label());
            }
        }
        claims
            .into_iter()
            .filter(|(_, facets)| facets.len() > 1)
            .map(|(selector, facets)| SelectorCollision { selector, facets })
            .collect()
    }

    /// Selector → index of the owning record. On collision the first
    /// record wins; call [`Self::validate`] first where that matters.
    #[must_use]
    pub fn owners(&self) -> BTreeMap<Selector, usize> {
        let mut owners = BTreeMap::new();
        for (idx, facet) in self.facets.iter().enumerate() {
            for entry in &facet.selectors {
                owners.entry(entry.selector).or_insert(idx);
            }
        }
        owners
    }

    /// Record serving `selector`
    #[must_use]
    pub fn owner_of(&self, selector: Selector) -> Option<&FacetRecord> {
        self.facets.iter().find(|f| f.serves(selector))
    }

    /// Record by facet name
    #[must_use]
    pub fn facet_by_name(&self, name: &str) -> Option<&FacetRecord> {
        self.facets.iter().find(|f| f.name.as_deref() == Some(name))
    }

    /// Record by deployed address
    #[must_use]
    pub fn facet_by_address(&self, address: &Address) -> Option<&FacetRecord> {
        self.facets.iter().find(|f| f.address.as_ref() == Some(address))
    }

    /// Total selectors across all records
    #[must_use]
    pub fn selector_count(&self) -> usize {
        self.facets.iter().map(|f| f.selectors.len()).sum()
    }

    /// Equal in everything except block number and timestamp
    #[must_use]
    pub fn same_state(&self, other: &Self) -> bool {
        self.diamond == other.diamond
            && self.chain_id == other.chain_id
            && self.network == other.network
            && self.git_commit == other.git_commit
            && self.facets == other.facets
    }
}
