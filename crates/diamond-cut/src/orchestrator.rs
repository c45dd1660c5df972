//! Cut orchestration
//!
//! One run per invocation:
//!
//! 1. capture live state, load (or seed) the reference
//! 2. build the planned snapshot, diff, attach unplanned-change warnings
//! 3. reconcile the plan against the diff (fatal before any write)
//! 4. production only: ask for confirmation
//! 5. deploy every planned facet, check its selectors, build instructions
//! 6. submit one `diamondCut`, wait for the receipt
//! 7. recapture and append the new snapshot to history
//!
//! Ledger writes are strictly sequential. Nothing after step 3 runs in
//! report-only mode.

use crate::audit::{CutRecord, ReportWriter};
use crate::config::EngineConfig;
use crate::confirm::{AlwaysDeny, Confirmation};
use crate::error::{CutError, CutResult};
use crate::instruction::{facet_cuts, removal_cut, CutReceipt, FacetCut, InitCall};
use crate::ledger::Ledger;
use crate::state::{CutMachine, CutState};
use diamond_artifact::{Address, ContentHash, Selector};
use diamond_catalog::ArtifactCatalog;
use diamond_diff::{
    DiffEngine, DiffReport, PlanBuilder, ReconciliationValidator, UpgradePlan, WorkingTree,
};
use diamond_snapshot::{DiamondSnapshot, HistoryEntry, SnapshotCapturer, SnapshotStore};
use std::collections::{BTreeMap, BTreeSet};

/// Parameters of one upgrade run
#[derive(Debug, Clone)]
pub struct CutOptions {
    pub diamond: Address,
    /// Diamond owner; sends every transaction
    pub owner: Address,
    pub plan: UpgradePlan,
    pub init: InitCall,
    /// Stop after validation
    pub report_only: bool,
    /// First deployment of the diamond: no Replace instructions
    pub fresh_deployment: bool,
}

impl CutOptions {
    /// Options for applying `plan` to `diamond` as `owner`
    #[must_use]
    pub fn new(diamond: Address, owner: Address, plan: UpgradePlan) -> Self {
        Self {
            diamond,
            owner,
            plan,
            init: InitCall::none(),
            report_only: false,
            fresh_deployment: false,
        }
    }

    /// With initialization call
    #[must_use]
    pub fn with_init(mut self, init: InitCall) -> Self {
        self.init = init;
        self
    }

    /// With report-only flag
    #[must_use]
    pub fn with_report_only(mut self, report_only: bool) -> Self {
        self.report_only = report_only;
        self
    }

    /// With fresh-deployment flag
    #[must_use]
    pub fn with_fresh_deployment(mut self, fresh: bool) -> Self {
        self.fresh_deployment = fresh;
        self
    }
}

/// What a run did
#[derive(Debug, Clone)]
pub struct CutOutcome {
    /// Last state reached
    pub state: CutState,
    pub report: DiffReport,
    pub cuts: Vec<FacetCut>,
    /// Fresh facet addresses by name
    pub deployed: BTreeMap<String, Address>,
    pub receipt: Option<CutReceipt>,
    /// History entry of the recaptured snapshot
    pub recorded: Option<HistoryEntry>,
}

/// Drives a plan from diff to recorded cut
pub struct CutOrchestrator<'a> {
    catalog: &'a ArtifactCatalog,
    store: &'a SnapshotStore,
    ledger: &'a dyn Ledger,
    tree: &'a dyn WorkingTree,
    confirmation: &'a dyn Confirmation,
    reports: Option<ReportWriter>,
    network: String,
    production: bool,
}

impl<'a> CutOrchestrator<'a> {
    /// Orchestrator for a non-production network labelled `localhost`
    /// that writes no audit files and declines every confirmation
    pub fn new(
        catalog: &'a ArtifactCatalog,
        store: &'a SnapshotStore,
        ledger: &'a dyn Ledger,
        tree: &'a dyn WorkingTree,
    ) -> Self {
        Self {
            catalog,
            store,
            ledger,
            tree,
            confirmation: &AlwaysDeny,
            reports: None,
            network: "localhost".to_string(),
            production: false,
        }
    }

    /// Take network label, production flag and report directory from
    /// `config`
    #[must_use]
    pub fn with_config(mut self, config: &EngineConfig) -> Self {
        self.network = config.network.name.clone();
        self.production = config.network.production;
        self.reports = Some(ReportWriter::new(config.reports_dir(), self.production));
        self
    }

    /// With network label and production flag
    #[must_use]
    pub fn with_network(mut self, name: impl Into<String>, production: bool) -> Self {
        self.network = name.into();
        self.production = production;
        self
    }

    /// With confirmation gate
    #[must_use]
    pub fn with_confirmation(mut self, confirmation: &'a dyn Confirmation) -> Self {
        self.confirmation = confirmation;
        self
    }

    /// With audit report writer
    #[must_use]
    pub fn with_reports(mut self, reports: ReportWriter) -> Self {
        self.reports = Some(reports);
        self
    }

    /// Execute one run.
    ///
    /// # Errors
    /// Every failure is fatal. Failures up to and including validation and
    /// confirmation happen before any ledger write.
    pub async fn run(&self, options: &CutOptions) -> CutResult<CutOutcome> {
        let mut machine = CutMachine::new(self.production);

        let revision = match self.tree.head_revision().await {
            Ok(rev) => rev,
            Err(e) => {
                tracing::warn!(error = %e, "no origin revision");
                None
            }
        };

        let live = self.capture(options.diamond, revision.clone()).await?;
        let reference = self.reference(&live).await?;

        let planned = PlanBuilder::new(self.catalog).build(&options.plan, &live)?;
        let mut report = DiffEngine::new().compute(Some(&reference), &planned, &live)?;

        let validator = ReconciliationValidator::new(self.catalog);
        let unplanned = validator
            .unplanned_changes(&options.plan, Some(&reference), self.tree)
            .await;
        report.attach_unplanned(unplanned);

        if report.drift_detected {
            tracing::warn!(entries = report.drift.len(), "stored reference disagrees with live state");
        }
        if let Some(reports) = &self.reports {
            reports.write_diff(&report).await?;
        }

        validator.check(&options.plan, &report)?;
        machine.advance(CutState::Validated)?;

        if options.report_only {
            tracing::info!("report only, stopping before deployment");
            return Ok(CutOutcome {
                state: machine.state(),
                report,
                cuts: Vec::new(),
                deployed: BTreeMap::new(),
                receipt: None,
                recorded: None,
            });
        }

        if self.production {
            let approved = self
                .confirmation
                .confirm(&report)
                .map_err(CutError::Prompt)?;
            if !approved {
                return Err(CutError::Declined);
            }
            machine.advance(CutState::Confirmed)?;
        }

        machine.advance(CutState::DeployingFacets)?;
        let mut cuts = Vec::new();
        let mut deployed = BTreeMap::new();
        for entry in options.plan.deployments() {
            let name = entry.facet_name.trim();
            let address = self.deploy_facet(options.owner, name).await?;
            let served = self.deployed_selectors(name, address).await?;

            // declared order is kept for the Add instruction
            let mut declared = Vec::new();
            for sel in entry.add_selectors.iter() {
                let id = sel.selector();
                if !served.contains(&id) {
                    return Err(CutError::MissingSelector {
                        facet: name.to_string(),
                        selector: id,
                        signature: sel.to_string(),
                    });
                }
                if !declared.contains(&id) {
                    declared.push(id);
                }
            }

            let compiled: Vec<Selector> = match self.catalog.get(name) {
                Some(e) => e.implementation.selectors().iter().map(|s| s.selector).collect(),
                None => served.iter().copied().collect(),
            };
            cuts.extend(facet_cuts(address, &compiled, &declared, options.fresh_deployment));
            deployed.insert(name.to_string(), address);
        }

        let removals: Vec<Selector> = planned.removals.iter().map(|r| r.selector()).collect();
        cuts.extend(removal_cut(&removals));
        if cuts.is_empty() {
            return Err(CutError::NothingToCut);
        }

        machine.advance(CutState::CutSubmitted)?;
        tracing::info!(
            instructions = cuts.len(),
            init = options.init.is_set(),
            "submitting diamond cut"
        );
        let receipt = self
            .ledger
            .diamond_cut(options.owner, options.diamond, &cuts, &options.init)
            .await?;
        if !receipt.success {
            return Err(CutError::TransactionReverted {
                tx_hash: receipt.tx_hash,
            });
        }
        if let Some(reports) = &self.reports {
            let record = CutRecord {
                diamond: options.diamond,
                chain_id: live.chain_id,
                git_commit: revision.clone(),
                deployed: deployed.clone(),
                cuts: cuts.clone(),
                init: options.init.clone(),
                receipt: receipt.clone(),
            };
            reports.write_cut(&record).await?;
        }
        machine.advance(CutState::CutConfirmed)?;

        let after = self.capture(options.diamond, revision).await?;
        let recorded = self.store.append(&after).await?;
        machine.advance(CutState::SnapshotRecaptured)?;
        tracing::info!(
            sequence = recorded.sequence,
            hash = %recorded.hash.short(),
            "recorded post-cut snapshot"
        );

        Ok(CutOutcome {
            state: machine.state(),
            report,
            cuts,
            deployed,
            receipt: Some(receipt),
            recorded: Some(recorded),
        })
    }

    async fn capture(&self, diamond: Address, revision: Option<String>) -> CutResult<DiamondSnapshot> {
        let snapshot = SnapshotCapturer::new(self.ledger, self.catalog, self.network.clone())
            .with_git_commit(revision)
            .capture(diamond)
            .await?;
        Ok(snapshot)
    }

    /// Stored reference, or `live` recorded as the first baseline
    async fn reference(&self, live: &DiamondSnapshot) -> CutResult<DiamondSnapshot> {
        if let Some(reference) = self.store.read_latest(live.chain_id, &live.diamond).await? {
            return Ok(reference);
        }
        tracing::warn!(diamond = %live.diamond, "no stored reference, recording live state as baseline");
        self.store.append(live).await?;
        Ok(live.clone())
    }

    async fn deploy_facet(&self, owner: Address, name: &str) -> CutResult<Address> {
        let entry = self
            .catalog
            .get(name)
            .ok_or_else(|| diamond_diff::PlanError::UnknownFacet {
                facet: name.to_string(),
            })?;
        let address = self.ledger.deploy(owner, name, &entry.creation_code).await?;
        tracing::info!(facet = %name, address = %address, "deployed facet");
        Ok(address)
    }

    /// Selectors exported by the code now at `address`, identified through
    /// the catalog by its bytecode hash
    async fn deployed_selectors(&self, name: &str, address: Address) -> CutResult<BTreeSet<Selector>> {
        let code = self.ledger.code_at(address).await?;
        if code.is_empty() {
            return Err(CutError::EmptyDeployment {
                facet: name.to_string(),
                address: address.to_string(),
            });
        }
        let hash = ContentHash::keccak256(&code);
        let entry = match self.catalog.by_bytecode_hash(&hash) {
            Some(entry) => entry,
            None => {
                tracing::warn!(
                    facet = %name,
                    address = %address,
                    "deployed code matches no artifact, checking against compiled selectors"
                );
                self.catalog
                    .get(name)
                    .ok_or_else(|| diamond_diff::PlanError::UnknownFacet {
                        facet: name.to_string(),
                    })?
            }
        };
        Ok(entry
            .implementation
            .selectors()
            .iter()
            .map(|s| s.selector)
            .collect())
    }
}
