//! Upgrade plans and the planned snapshot
//!
//! Declaring a facet in a plan means "this facet, as freshly compiled,
//! replaces whatever previously served its functions". The builder is not
//! incremental: each named facet contributes its entire compiled surface.

use crate::error::PlanError;
use diamond_artifact::{Address, HashError, Selector, SelectorRef};
use diamond_catalog::ArtifactCatalog;
use diamond_snapshot::{DiamondSnapshot, FacetRecord};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// One `{facetName, addSelectors, removeSelectors}` triple
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanEntry {
    /// Empty for removal-only entries
    #[serde(default)]
    pub facet_name: String,
    #[serde(default)]
    pub add_selectors: Vec<SelectorRef>,
    #[serde(default)]
    pub remove_selectors: Vec<SelectorRef>,
}

impl PlanEntry {
    /// Entry for `facet_name` with nothing declared
    pub fn new(facet_name: impl Into<String>) -> Self {
        Self {
            facet_name: facet_name.into(),
            ..Self::default()
        }
    }

    /// Declare an addition
    ///
    /// # Errors
    /// Returns error if `selector` looks like a raw id but is not valid hex
    pub fn add(mut self, selector: &str) -> Result<Self, HashError> {
        self.add_selectors.push(selector.parse()?);
        Ok(self)
    }

    /// Declare a removal
    ///
    /// # Errors
    /// Returns error if `selector` looks like a raw id but is not valid hex
    pub fn remove(mut self, selector: &str) -> Result<Self, HashError> {
        self.remove_selectors.push(selector.parse()?);
        Ok(self)
    }

    /// Whether this entry deploys a facet
    #[inline]
    #[must_use]
    pub fn is_deployment(&self) -> bool {
        !self.facet_name.trim().is_empty()
    }

    /// Declared additions by id
    #[must_use]
    pub fn declared_adds(&self) -> BTreeSet<Selector> {
        self.add_selectors.iter().map(SelectorRef::selector).collect()
    }
}

/// Ordered list of plan entries; serialized as a bare JSON array
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UpgradePlan {
    pub entries: Vec<PlanEntry>,
}

impl UpgradePlan {
    /// Create plan from entries
    #[must_use]
    pub fn new(entries: Vec<PlanEntry>) -> Self {
        Self { entries }
    }

    /// Parse the JSON form
    ///
    /// # Errors
    /// Returns error if the document is not a list of plan entries
    pub fn from_json(json: &str) -> Result<Self, PlanError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Entries that deploy a facet
    pub fn deployments(&self) -> impl Iterator<Item = &PlanEntry> {
        self.entries.iter().filter(|e| e.is_deployment())
    }

    /// Entry for a facet name
    #[must_use]
    pub fn entry(&self, facet_name: &str) -> Option<&PlanEntry> {
        self.deployments().find(|e| e.facet_name.trim() == facet_name)
    }

    /// Whether the plan deploys `facet_name`
    #[must_use]
    pub fn deploys(&self, facet_name: &str) -> bool {
        self.entry(facet_name).is_some()
    }

    /// All declared removals, first occurrence wins
    #[must_use]
    pub fn removals(&self) -> Vec<SelectorRef> {
        let mut seen = BTreeSet::new();
        self.entries
            .iter()
            .flat_map(|e| e.remove_selectors.iter())
            .filter(|r| seen.insert(r.selector()))
            .cloned()
            .collect()
    }
}

/// Planned facet records plus the flat removal list
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlannedSnapshot {
    pub snapshot: DiamondSnapshot,
    pub removals: Vec<SelectorRef>,
}

impl PlannedSnapshot {
    /// Whether `selector` is declared for removal
    #[must_use]
    pub fn removes(&self, selector: Selector) -> bool {
        self.removals.iter().any(|r| r.selector() == selector)
    }
}

/// Materializes an [`UpgradePlan`] against the catalog
pub struct PlanBuilder<'a> {
    catalog: &'a ArtifactCatalog,
}

impl<'a> PlanBuilder<'a> {
    /// Create builder
    #[must_use]
    pub fn new(catalog: &'a ArtifactCatalog) -> Self {
        Self { catalog }
    }

    /// Build the planned snapshot. Chain, block and origin revision are
    /// taken from `live` so the plan is linked to the state it was made
    /// against.
    ///
    /// # Errors
    /// Returns error if a named facet is not compiled, a facet is named
    /// twice, or two planned facets export the same selector
    pub fn build(
        &self,
        plan: &UpgradePlan,
        live: &DiamondSnapshot,
    ) -> Result<PlannedSnapshot, PlanError> {
        let mut seen = BTreeSet::new();
        let mut facets = Vec::new();
        for entry in plan.deployments() {
            let name = entry.facet_name.trim();
            if !seen.insert(name.to_string()) {
                return Err(PlanError::DuplicateFacet(name.to_string()));
            }
            let catalog_entry = self.catalog.get(name).ok_or_else(|| PlanError::UnknownFacet {
                facet: name.to_string(),
            })?;
            let implementation = &catalog_entry.implementation;
            let address = deployed_address(live, name, implementation.bytecode_hash);
            facets.push(FacetRecord::from_implementation(implementation, address));
        }

        let snapshot = DiamondSnapshot {
            diamond: live.diamond,
            chain_id: live.chain_id,
            network: live.network.clone(),
            block_number: live.block_number,
            timestamp: live.timestamp,
            git_commit: live.git_commit.clone(),
            facets,
        };
        snapshot.validate()?;

        let removals = plan.removals();
        tracing::debug!(
            facets = snapshot.facets.len(),
            removals = removals.len(),
            "built planned snapshot"
        );
        Ok(PlannedSnapshot { snapshot, removals })
    }
}

/// Address where this exact code, or else this facet name, is live today
fn deployed_address(
    live: &DiamondSnapshot,
    name: &str,
    bytecode_hash: diamond_artifact::ContentHash,
) -> Option<Address> {
    live.facets
        .iter()
        .find(|f| f.bytecode_hash == Some(bytecode_hash))
        .or_else(|| live.facet_by_name(name))
        .and_then(|f| f.address)
}

#[cfg(test)]
mod tests {
    use super::*;
    use diamond_artifact::{ContentHash, FacetImplementation, SelectorInfo, StateMutability};
    use diamond_catalog::CatalogEntry;
    use diamond_snapshot::SnapshotError;
    use pretty_assertions::assert_eq;

    fn compiled(name: &str, sigs: &[&str]) -> CatalogEntry {
        let selectors = sigs
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
                format!("contracts/facets/{name}.sol"),
                ContentHash::keccak256(name.as_bytes()),
                ContentHash::ZERO,
                selectors,
            )
            .unwrap(),
            creation_code: name.as_bytes().to_vec(),
            artifact_path: format!("artifacts/{name}.json").into(),
            has_ast: false,
        }
    }

    fn empty_diamond() -> DiamondSnapshot {
        DiamondSnapshot {
            diamond: Address::new([0xd1; 20]),
            chain_id: 31337,
            network: "localhost".into(),
            block_number: 1,
            timestamp: 1_700_000_000,
            git_commit: None,
            facets: Vec::new(),
        }
    }

    #[test]
    fn two_facets_exporting_one_selector_are_rejected() {
        let catalog = ArtifactCatalog::from_entries([
            compiled("Alpha", &["f(uint256)", "g()"]),
            compiled("Beta", &["f(uint256)"]),
        ]);
        let plan = UpgradePlan::new(vec![PlanEntry::new("Alpha"), PlanEntry::new("Beta")]);

        match PlanBuilder::new(&catalog).build(&plan, &empty_diamond()) {
            Err(PlanError::Snapshot(SnapshotError::SelectorCollision { selector, facets })) => {
                assert_eq!(selector, Selector::from_signature("f(uint256)"));
                assert_eq!(facets.len(), 2);
            }
            other => panic!("expected a selector collision, got {other:?}"),
        }
    }

    #[test]
    fn facet_named_twice_is_rejected() {
        let catalog = ArtifactCatalog::from_entries([compiled("Alpha", &["f(uint256)"])]);
        let plan = UpgradePlan::new(vec![
            PlanEntry::new("Alpha").add("f(uint256)").unwrap(),
            PlanEntry::new(" Alpha "),
        ]);

        let err = PlanBuilder::new(&catalog).build(&plan, &empty_diamond()).unwrap_err();
        assert!(matches!(err, PlanError::DuplicateFacet(ref name) if name == "Alpha"));
    }

    #[test]
    fn disjoint_facets_build_a_planned_snapshot() {
        let catalog = ArtifactCatalog::from_entries([
            compiled("Alpha", &["f(uint256)"]),
            compiled("Beta", &["g()"]),
        ]);
        let plan = UpgradePlan::new(vec![
            PlanEntry::new("Alpha"),
            PlanEntry::new("Beta"),
            PlanEntry::new("").remove("h()").unwrap(),
        ]);

        let planned = PlanBuilder::new(&catalog).build(&plan, &empty_diamond()).unwrap();
        assert_eq!(planned.snapshot.facets.len(), 2);
        assert_eq!(planned.snapshot.selector_count(), 2);
        assert!(planned.removes(Selector::from_signature("h()")));
    }

    #[test]
    fn parses_json_plan() {
        let plan = UpgradePlan::from_json(
            r#"[
                {"facetName": "Alpha", "addSelectors": ["f(uint256)"], "removeSelectors": []},
                {"facetName": "", "removeSelectors": ["c(uint256)", "0x12345678"]}
            ]"#,
        )
        .unwrap();
        assert_eq!(plan.deployments().count(), 1);
        assert!(plan.deploys("Alpha"));
        let removals = plan.removals();
        assert_eq!(removals.len(), 2);
        assert_eq!(removals[1], SelectorRef::Raw(Selector::new([0x12, 0x34, 0x56, 0x78])));
    }

    #[test]
    fn removals_are_deduplicated_by_id() {
        let c = Selector::from_signature("c(uint256)");
        let plan = UpgradePlan::new(vec![
            PlanEntry::new("A").remove("c(uint256)").unwrap(),
            PlanEntry::new("").remove(&c.to_string()).unwrap(),
        ]);
        assert_eq!(plan.removals(), vec![SelectorRef::Signature("c(uint256)".into())]);
    }

    #[test]
    fn round_trips_camel_case() {
        let plan = UpgradePlan::new(vec![PlanEntry::new("Alpha").add("f(uint256)").unwrap()]);
        let json = serde_json::to_value(&plan).unwrap();
        assert_eq!(
            json,
            serde_json::json!([{"facetName": "Alpha", "addSelectors": ["f(uint256)"], "removeSelectors": []}])
        );
    }
}
