//! Catalog and snapshot builders

use diamond_artifact::{
    Address, ContentHash, FacetImplementation, InternalRoutineInfo, Selector, SelectorInfo,
    StateMutability, Visibility,
};
use diamond_catalog::{ArtifactCatalog, CatalogEntry};
use diamond_snapshot::{DiamondSnapshot, FacetRecord};

pub const CHAIN_ID: u64 = 31337;

pub fn selector(signature: &str) -> Selector {
    Selector::from_signature(signature)
}

/// `[byte; 20]`
pub fn address(byte: u8) -> Address {
    Address::new([byte; 20])
}

pub fn hash(text: &str) -> ContentHash {
    ContentHash::compute(text.as_bytes())
}

/// A compiled facet described in a few lines
#[derive(Debug, Clone)]
pub struct FacetFixture {
    pub name: String,
    pub source_name: String,
    /// Runtime code; the in-memory ledger deploys creation code verbatim,
    /// so this is also the creation code
    pub code: Vec<u8>,
    pub functions: Vec<SelectorInfo>,
    pub routines: Vec<InternalRoutineInfo>,
    pub events: Vec<String>,
}

impl FacetFixture {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            source_name: format!("contracts/facets/{name}.sol"),
            code: format!("runtime:{name}").into_bytes(),
            functions: Vec::new(),
            routines: Vec::new(),
            events: Vec::new(),
        }
    }

    /// Function whose implementation and source fingerprint from `body`
    pub fn function(self, signature: &str, body: &str) -> Self {
        self.function_hashes(signature, body, body)
    }

    /// Function with separately controlled fingerprints
    pub fn function_hashes(mut self, signature: &str, implementation: &str, source: &str) -> Self {
        self.functions.push(SelectorInfo {
            selector: selector(signature),
            signature: signature.to_string(),
            mutability: StateMutability::Nonpayable,
            implementation_hash: Some(hash(implementation)),
            source_hash: Some(hash(source)),
            name: signature.split('(').next().unwrap_or_default().to_string(),
        });
        self
    }

    /// Internal routine fingerprinted from `body`
    pub fn routine(mut self, name: &str, body: &str) -> Self {
        self.routines.push(InternalRoutineInfo {
            name: name.to_string(),
            visibility: Visibility::Internal,
            implementation_hash: hash(body),
            source_hash: hash(body),
        });
        self
    }

    pub fn event(mut self, signature: &str) -> Self {
        self.events.push(signature.to_string());
        self
    }

    /// Replace the runtime code; a new build of the same facet
    pub fn code(mut self, code: &str) -> Self {
        self.code = code.as_bytes().to_vec();
        self
    }

    pub fn signatures(&self) -> Vec<String> {
        self.functions.iter().map(|f| f.signature.clone()).collect()
    }

    pub fn selectors(&self) -> Vec<Selector> {
        self.functions.iter().map(|f| f.selector).collect()
    }

    pub fn implementation(&self) -> FacetImplementation {
        FacetImplementation::new(
            self.name.clone(),
            self.source_name.clone(),
            ContentHash::keccak256(&self.code),
            hash(&format!("abi:{}", self.signatures().join(","))),
            self.functions.clone(),
        )
        .unwrap()
        .with_internal_routines(self.routines.clone())
        .with_events(self.events.iter().cloned())
    }

    pub fn entry(&self) -> CatalogEntry {
        CatalogEntry {
            implementation: self.implementation(),
            creation_code: self.code.clone(),
            artifact_path: format!("artifacts/{}/{}.json", self.source_name, self.name).into(),
            has_ast: true,
        }
    }

    /// Snapshot record of this facet, as deployed at `address`
    pub fn record(&self, address: Option<Address>) -> FacetRecord {
        FacetRecord::from_implementation(&self.implementation(), address)
    }
}

pub fn catalog(facets: &[&FacetFixture]) -> ArtifactCatalog {
    ArtifactCatalog::from_entries(facets.iter().map(|f| f.entry()))
}

/// Snapshot on [`CHAIN_ID`] at block 1
pub fn snapshot(diamond: Address, facets: Vec<FacetRecord>) -> DiamondSnapshot {
    DiamondSnapshot {
        diamond,
        chain_id: CHAIN_ID,
        network: "localhost".to_string(),
        block_number: 1,
        timestamp: 1_700_000_000,
        git_commit: None,
        facets,
    }
}
