//! Artifact catalog index
//!
//! Compiled facets addressable by name, by deployed-bytecode hash and by
//! selector-set key.

use diamond_artifact::{ContentHash, FacetImplementation};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;

/// One compiled facet plus what is needed to deploy it
#[derive(Debug, Clone)]
pub struct CatalogEntry {
    pub implementation: FacetImplementation,
    /// Creation (constructor) bytecode
    pub creation_code: Vec<u8>,
    /// Artifact file this entry came from
    pub artifact_path: PathBuf,
    /// Whether function and routine fingerprints were available
    pub has_ast: bool,
}

impl CatalogEntry {
    /// Facet name
    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.implementation.name
    }
}

/// How a live facet was matched to a catalog entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum IdentityMatch {
    /// Deployed bytecode hashes are equal
    BytecodeHash,
    /// Served selector sets are equal
    SelectorSet,
}

/// Index over compiled facets
#[derive(Debug, Clone, Default)]
pub struct ArtifactCatalog {
    by_name: BTreeMap<String, CatalogEntry>,
    by_bytecode: HashMap<ContentHash, String>,
    by_selector_key: HashMap<String, String>,
}

impl ArtifactCatalog {
    /// Create empty catalog
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a catalog from entries. Later entries with a name already
    /// present are ignored.
    #[must_use]
    pub fn from_entries<I>(entries: I) -> Self
    where
        I: IntoIterator<Item = CatalogEntry>,
    {
        let mut catalog = Self::new();
        for entry in entries {
            catalog.insert(entry);
        }
        catalog
    }

    /// Insert an entry. Returns `false` if a facet with the same name is
    /// already present; the existing entry is kept.
    pub fn insert(&mut self, entry: CatalogEntry) -> bool {
        let name = entry.name().to_string();
        if self.by_name.contains_key(&name) {
            tracing::warn!(
                facet = %name,
                path = %entry.artifact_path.display(),
                "duplicate contract name in artifacts, keeping first"
            );
            return false;
        }
        self.by_bytecode
            .entry(entry.implementation.bytecode_hash)
            .or_insert_with(|| name.clone());
        self.by_selector_key
            .entry(entry.implementation.selector_key())
            .or_insert_with(|| name.clone());
        self.by_name.insert(name, entry);
        true
    }

    /// Entry by facet name
    #[inline]
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&CatalogEntry> {
        self.by_name.get(name)
    }

    /// Entry by deployed-bytecode hash
    #[must_use]
    pub fn by_bytecode_hash(&self, hash: &ContentHash) -> Option<&CatalogEntry> {
        self.by_bytecode.get(hash).and_then(|n| self.by_name.get(n))
    }

    /// Entry by selector-set key
    #[must_use]
    pub fn by_selector_key(&self, key: &str) -> Option<&CatalogEntry> {
        self.by_selector_key.get(key).and_then(|n| self.by_name.get(n))
    }

    /// Resolve a deployed facet: exact bytecode first, then selector set.
    #[must_use]
    pub fn resolve(
        &self,
        bytecode_hash: Option<&ContentHash>,
        selector_key: &str,
    ) -> Option<(&CatalogEntry, IdentityMatch)> {
        if let Some(entry) = bytecode_hash.and_then(|h| self.by_bytecode_hash(h)) {
            return Some((entry, IdentityMatch::BytecodeHash));
        }
        if selector_key.is_empty() {
            return None;
        }
        self.by_selector_key(selector_key)
            .map(|entry| (entry, IdentityMatch::SelectorSet))
    }

    /// Entries in name order
    pub fn iter(&self) -> impl Iterator<Item = &CatalogEntry> {
        self.by_name.values()
    }

    /// Facet names in order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.by_name.keys().map(String::as_str)
    }

    /// Number of facets
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    /// Check if catalog is empty
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use diamond_artifact::{SelectorInfo, Selector, StateMutability};

    fn entry(name: &str, code: &[u8], signatures: &[&str]) -> CatalogEntry {
        let selectors = signatures
            .iter()
            .map(|sig| SelectorInfo {
                selector: Selector::from_signature(sig),
                signature: (*sig).to_string(),
                mutability: StateMutability::Nonpayable,
                implementation_hash: None,
                source_hash: None,
                name: sig.split('(').next().unwrap_or_default().to_string(),
            })
            .collect();
        CatalogEntry {
            implementation: FacetImplementation::new(
                name,
                format!("contracts/{name}.sol"),
                ContentHash::keccak256(code),
                ContentHash::ZERO,
                selectors,
            )
            .unwrap(),
            creation_code: code.to_vec(),
            artifact_path: PathBuf::from(format!("{name}.json")),
            has_ast: false,
        }
    }

    #[test]
    fn resolves_by_bytecode_before_selector_set() {
        let alpha = entry("Alpha", b"alpha", &["f(uint256)"]);
        let beta = entry("Beta", b"beta", &["f(uint256)"]);
        let key = alpha.implementation.selector_key();
        let catalog = ArtifactCatalog::from_entries([alpha, beta]);

        let hash = ContentHash::keccak256(b"beta");
        let (found, how) = catalog.resolve(Some(&hash), &key).unwrap();
        assert_eq!(found.name(), "Beta");
        assert_eq!(how, IdentityMatch::BytecodeHash);
    }

    #[test]
    fn falls_back_to_selector_set() {
        let alpha = entry("Alpha", b"alpha", &["f(uint256)", "g()"]);
        let key = alpha.implementation.selector_key();
        let catalog = ArtifactCatalog::from_entries([alpha]);

        let unknown = ContentHash::keccak256(b"alpha-with-immutables");
        let (found, how) = catalog.resolve(Some(&unknown), &key).unwrap();
        assert_eq!(found.name(), "Alpha");
        assert_eq!(how, IdentityMatch::SelectorSet);
        assert!(catalog.resolve(Some(&unknown), "0x00000000").is_none());
    }

    #[test]
    fn keeps_first_duplicate_name() {
        let mut catalog = ArtifactCatalog::new();
        assert!(catalog.insert(entry("Alpha", b"one", &["f()"])));
        assert!(!catalog.insert(entry("Alpha", b"two", &["g()"])));
        assert_eq!(catalog.len(), 1);
        assert_eq!(catalog.get("Alpha").unwrap().creation_code, b"one");
    }
}
