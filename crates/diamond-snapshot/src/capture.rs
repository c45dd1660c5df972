//! Live snapshot capture
//!
//! Reads the diamond's installed facets, fetches each facet's code and
//! resolves its identity against the catalog. Read-only: nothing here
//! writes to the ledger or the store.

use crate::error::SnapshotError;
use crate::ledger::{LedgerReader, LiveFacet};
use crate::snapshot::{DiamondSnapshot, FacetRecord, SelectorEntry};
use diamond_artifact::{selector_key, Address, ContentHash};
use diamond_catalog::ArtifactCatalog;
use futures::future::try_join_all;

/// Builds [`DiamondSnapshot`]s from live ledger state
pub struct SnapshotCapturer<'a, L: LedgerReader + ?Sized> {
    ledger: &'a L,
    catalog: &'a ArtifactCatalog,
    network: String,
    git_commit: Option<String>,
}

impl<'a, L: LedgerReader + ?Sized> SnapshotCapturer<'a, L> {
    /// Create capturer
    pub fn new(ledger: &'a L, catalog: &'a ArtifactCatalog, network: impl Into<String>) -> Self {
        Self {
            ledger,
            catalog,
            network: network.into(),
            git_commit: None,
        }
    }

    /// Tag captured snapshots with an origin revision
    #[must_use]
    pub fn with_git_commit(mut self, commit: Option<String>) -> Self {
        self.git_commit = commit;
        self
    }

    /// Capture the current state of `diamond`.
    ///
    /// Facets that resolve to nothing in the catalog are kept by address
    /// with unlabeled selectors.
    ///
    /// # Errors
    /// Returns error on ledger failure or if the live state violates
    /// selector uniqueness
    pub async fn capture(&self, diamond: Address) -> Result<DiamondSnapshot, SnapshotError> {
        let chain_id = self.ledger.chain_id().await?;
        let block = self.ledger.latest_block().await?;
        let live = self.ledger.facets(diamond).await?;

        // independent reads, order preserved by try_join_all
        let codes = try_join_all(live.iter().map(|f| self.ledger.code_at(f.address))).await?;

        let facets = live
            .iter()
            .zip(codes.iter())
            .map(|(facet, code)| self.resolve(facet, code))
            .collect();

        let snapshot = DiamondSnapshot {
            diamond,
            chain_id,
            network: self.network.clone(),
            block_number: block.number,
            timestamp: block.timestamp,
            git_commit: self.git_commit.clone(),
            facets,
        };
        snapshot.validate()?;

        tracing::info!(
            diamond = %diamond,
            block = block.number,
            facets = snapshot.facets.len(),
            selectors = snapshot.selector_count(),
            "captured live snapshot"
        );
        Ok(snapshot)
    }

    fn resolve(&self, facet: &LiveFacet, code: &[u8]) -> FacetRecord {
        let bytecode_hash = (!code.is_empty()).then(|| ContentHash::keccak256(code));
        let key = selector_key(facet.selectors.iter());

        let Some((entry, how)) = self.catalog.resolve(bytecode_hash.as_ref(), &key) else {
            tracing::warn!(
                address = %facet.address,
                selectors = facet.selectors.len(),
                "live facet matches no compiled artifact, recording by address"
            );
            return FacetRecord::address_only(facet.address, bytecode_hash, &facet.selectors);
        };

        let implementation = &entry.implementation;
        tracing::debug!(address = %facet.address, facet = %implementation.name, ?how, "resolved live facet");

        let mut record = FacetRecord::from_implementation(implementation, Some(facet.address));
        record.bytecode_hash = bytecode_hash;
        record.resolved_by = Some(how);
        // the diamond decides what is routed, the artifact only labels it
        record.selectors = facet
            .selectors
            .iter()
            .map(|sel| {
                implementation
                    .selector_info(*sel)
                    .map_or_else(|| SelectorEntry::unlabeled(*sel), SelectorEntry::from)
            })
            .collect();
        record
    }
}
