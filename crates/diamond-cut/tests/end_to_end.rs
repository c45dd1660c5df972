//! Full upgrade runs against the in-memory ledger

use diamond_artifact::{Address, Selector};
use diamond_catalog::{ArtifactCatalog, BuildInfoCache, CatalogBuilder};
use diamond_cut::{
    AlwaysConfirm, CutError, CutOptions, CutOrchestrator, CutState, EngineConfig, FacetCut,
    FacetCutAction, LATEST_DIFF,
};
use diamond_diff::{MismatchKind, PlanEntry, ReconcileError, StaticWorkingTree, UpgradePlan};
use diamond_snapshot::SnapshotStore;
use diamond_test_utils::{
    address, catalog, selector, snapshot, ArtifactDir, FacetFixture, InMemoryLedger, CHAIN_ID,
};
use pretty_assertions::assert_eq;
use tempfile::TempDir;

const REVISION: &str = "4f2a9c1d";

struct Harness {
    dir: TempDir,
    store: SnapshotStore,
    ledger: InMemoryLedger,
    tree: StaticWorkingTree,
    diamond: Address,
    owner: Address,
}

impl Harness {
    fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let store = SnapshotStore::new(dir.path().join("snapshots"));
        Self {
            dir,
            store,
            ledger: InMemoryLedger::new(),
            tree: StaticWorkingTree::new(Some(REVISION.to_string()), Vec::<&str>::new()),
            diamond: address(0xd1),
            owner: address(0x0a),
        }
    }

    fn install(&self, facet: &FacetFixture, at: Address) {
        self.ledger
            .install(self.diamond, at, &facet.code, &facet.selectors());
    }

    fn options(&self, plan: UpgradePlan) -> CutOptions {
        CutOptions::new(self.diamond, self.owner, plan)
    }

    async fn history_len(&self) -> usize {
        self.store.history(CHAIN_ID, &self.diamond).await.unwrap().len()
    }
}

fn core() -> FacetFixture {
    FacetFixture::new("Core").function("owner()", "return _owner;")
}

fn plan(entries: Vec<PlanEntry>) -> UpgradePlan {
    UpgradePlan::new(entries)
}

#[tokio::test]
async fn new_facet_is_a_single_add() {
    let h = Harness::new();
    let core = core();
    h.install(&core, address(0xc0));
    let alpha = FacetFixture::new("Alpha").function("f(uint256)", "x = a0;");
    let catalog = catalog(&[&core, &alpha]);

    let outcome = CutOrchestrator::new(&catalog, &h.store, &h.ledger, &h.tree)
        .run(&h.options(plan(vec![PlanEntry::new("Alpha").add("f(uint256)").unwrap()])))
        .await
        .unwrap();

    assert_eq!(outcome.state, CutState::SnapshotRecaptured);
    assert_eq!(outcome.report.facets.len(), 1);
    let diff = outcome.report.facet("Alpha").unwrap();
    assert_eq!(diff.added_labels(), vec!["f(uint256)".to_string()]);
    assert!(diff.selectors_removed.is_empty());
    assert!(diff.modified_direct.is_empty());
    assert!(diff.modified_indirect.is_empty());

    let alpha_at = outcome.deployed["Alpha"];
    assert_eq!(
        outcome.cuts,
        vec![FacetCut {
            facet_address: alpha_at,
            action: FacetCutAction::Add,
            selectors: vec![selector("f(uint256)")],
        }]
    );
    assert_eq!(h.ledger.owner_of(h.diamond, selector("f(uint256)")), Some(alpha_at));

    // baseline plus the post-cut snapshot
    let recorded = outcome.recorded.unwrap();
    assert_eq!(recorded.sequence, 1);
    assert_eq!(recorded.snapshot.git_commit.as_deref(), Some(REVISION));
    assert!(recorded.snapshot.facet_by_name("Alpha").is_some());
    assert_eq!(h.history_len().await, 2);
}

#[tokio::test]
async fn dropped_selector_becomes_one_null_address_remove() {
    let h = Harness::new();
    let beta_v1 = FacetFixture::new("Beta")
        .function("a(uint256)", "a")
        .function("b(uint256)", "b")
        .function("c(uint256)", "c")
        .code("runtime:Beta-v1");
    let beta_v2 = FacetFixture::new("Beta")
        .function("a(uint256)", "a")
        .function("b(uint256)", "b")
        .code("runtime:Beta-v2");
    let beta_v1_at = address(0xb1);
    h.install(&beta_v1, beta_v1_at);
    h.store
        .append(&snapshot(h.diamond, vec![beta_v1.record(Some(beta_v1_at))]))
        .await
        .unwrap();
    let catalog = catalog(&[&beta_v2]);

    let entry = PlanEntry::new("Beta").remove("c(uint256)").unwrap();
    let outcome = CutOrchestrator::new(&catalog, &h.store, &h.ledger, &h.tree)
        .run(&h.options(plan(vec![entry])))
        .await
        .unwrap();

    assert!(!outcome.report.drift_detected);
    let diff = outcome.report.facet("Beta").unwrap();
    assert_eq!(diff.removed_labels(), vec!["c(uint256)".to_string()]);
    assert!(diff.selectors_added.is_empty());
    assert_eq!(outcome.report.removals.len(), 1);
    assert_eq!(outcome.report.removals[0].from_facet.as_deref(), Some("Beta"));

    let removes: Vec<&FacetCut> = outcome
        .cuts
        .iter()
        .filter(|c| c.action == FacetCutAction::Remove)
        .collect();
    assert_eq!(removes.len(), 1);
    assert_eq!(removes[0].facet_address, Address::ZERO);
    assert_eq!(removes[0].selectors, vec![selector("c(uint256)")]);

    let beta_v2_at = outcome.deployed["Beta"];
    let replace = outcome
        .cuts
        .iter()
        .find(|c| c.action == FacetCutAction::Replace)
        .unwrap();
    assert_eq!(replace.facet_address, beta_v2_at);
    assert_eq!(
        replace.selectors,
        vec![selector("a(uint256)"), selector("b(uint256)")]
    );
    assert_eq!(h.ledger.owner_of(h.diamond, selector("c(uint256)")), None);
    assert_eq!(h.ledger.submitted_cuts().len(), 1);
}

#[tokio::test]
async fn history_grows_by_one_per_cut_and_never_rewrites() {
    let h = Harness::new();
    let core = core();
    h.install(&core, address(0xc0));

    let alpha_v1 = FacetFixture::new("Alpha").function("f(uint256)", "x = a0;");
    let alpha_v2 = FacetFixture::new("Alpha")
        .function("f(uint256)", "x = a0 + 1;")
        .code("runtime:Alpha-v2");
    let gamma = FacetFixture::new("Gamma").function("g()", "emit G();");

    let runs = [
        (catalog(&[&core, &alpha_v1]), PlanEntry::new("Alpha").add("f(uint256)").unwrap()),
        (catalog(&[&core, &alpha_v2]), PlanEntry::new("Alpha")),
        (catalog(&[&core, &alpha_v2, &gamma]), PlanEntry::new("Gamma").add("g()").unwrap()),
    ];

    let mut seen = Vec::new();
    for (n, (catalog, entry)) in runs.into_iter().enumerate() {
        let outcome = CutOrchestrator::new(&catalog, &h.store, &h.ledger, &h.tree)
            .run(&h.options(plan(vec![entry])))
            .await
            .unwrap();
        if n == 1 {
            let diff = outcome.report.facet("Alpha").unwrap();
            assert_eq!(diff.modified_direct.len(), 1);
            assert_eq!(outcome.cuts.len(), 1);
            assert_eq!(outcome.cuts[0].action, FacetCutAction::Replace);
        }

        let history = h.store.history(CHAIN_ID, &h.diamond).await.unwrap();
        assert_eq!(history.len(), n + 2);
        // earlier entries read back unchanged
        assert_eq!(&history[..seen.len()], &seen[..]);
        seen = history;
    }
    assert_eq!(h.store.verify_history(CHAIN_ID, &h.diamond).await.unwrap(), 4);
}

#[tokio::test]
async fn drift_is_reported_not_fatal() {
    let h = Harness::new();
    let core = core().function("pause()", "paused = true;");
    h.install(&core, address(0xc0));
    let catalog = catalog(&[&core]);
    let report_only = h.options(UpgradePlan::default()).with_report_only(true);

    let clean = CutOrchestrator::new(&catalog, &h.store, &h.ledger, &h.tree)
        .run(&report_only)
        .await
        .unwrap();
    assert!(!clean.report.drift_detected);
    assert_eq!(clean.state, CutState::Validated);

    // someone reroutes pause() outside the engine
    h.ledger.set_code(address(0xee), b"rogue");
    h.ledger.reroute(h.diamond, selector("pause()"), address(0xee));

    let drifted = CutOrchestrator::new(&catalog, &h.store, &h.ledger, &h.tree)
        .run(&report_only)
        .await
        .unwrap();
    assert!(drifted.report.drift_detected);
    assert_eq!(drifted.report.drift.len(), 1);
    assert_eq!(drifted.report.drift[0].selector, selector("pause()"));
    assert_eq!(drifted.report.drift[0].reference_owner.as_deref(), Some("Core"));
    assert!(drifted.report.summary.contains("DRIFT"));
    // report-only runs never advance history past the baseline
    assert_eq!(h.history_len().await, 1);
}

#[tokio::test]
async fn unchanged_source_with_changed_routine_is_indirect() {
    let h = Harness::new();
    let v1 = FacetFixture::new("Alpha")
        .function("f(uint256)", "return _g(a0);")
        .routine("_g", "return a0 * 2;")
        .code("runtime:Alpha-v1");
    let v2 = FacetFixture::new("Alpha")
        .function_hashes("f(uint256)", "return _g(a0); // inlined v2", "return _g(a0);")
        .routine("_g", "return a0 * 3;")
        .code("runtime:Alpha-v2");
    let at = address(0xa1);
    h.install(&v1, at);
    h.store
        .append(&snapshot(h.diamond, vec![v1.record(Some(at))]))
        .await
        .unwrap();
    let catalog = catalog(&[&v2]);

    let outcome = CutOrchestrator::new(&catalog, &h.store, &h.ledger, &h.tree)
        .run(&h.options(plan(vec![PlanEntry::new("Alpha")])).with_report_only(true))
        .await
        .unwrap();

    let diff = outcome.report.facet("Alpha").unwrap();
    assert!(diff.modified_direct.is_empty());
    assert_eq!(diff.modified_indirect.len(), 1);
    assert_eq!(diff.modified_indirect[0].selector, selector("f(uint256)"));
    assert_eq!(diff.routines_modified.len(), 1);
    assert!(outcome.report.summary.contains("indirect"));
}

#[tokio::test]
async fn undeclared_addition_aborts_before_any_write() {
    let h = Harness::new();
    let core = core();
    h.install(&core, address(0xc0));
    let alpha = FacetFixture::new("Alpha")
        .function("f(uint256)", "x = a0;")
        .function("g()", "y = 1;");
    let catalog = catalog(&[&core, &alpha]);

    let err = CutOrchestrator::new(&catalog, &h.store, &h.ledger, &h.tree)
        .run(&h.options(plan(vec![PlanEntry::new("Alpha").add("f(uint256)").unwrap()])))
        .await
        .unwrap_err();

    let CutError::Reconcile(ReconcileError::Mismatches(mismatches)) = err else {
        panic!("expected reconciliation failure");
    };
    assert_eq!(mismatches.len(), 1);
    assert_eq!(mismatches[0].kind, MismatchKind::UndeclaredAddition);
    assert_eq!(mismatches[0].signature.as_deref(), Some("g()"));
    assert!(h.ledger.submitted_cuts().is_empty());
}

#[tokio::test]
async fn unknown_facet_is_fatal() {
    let h = Harness::new();
    let core = core();
    h.install(&core, address(0xc0));
    let catalog = catalog(&[&core]);

    let err = CutOrchestrator::new(&catalog, &h.store, &h.ledger, &h.tree)
        .run(&h.options(plan(vec![PlanEntry::new("Ghost")])))
        .await
        .unwrap_err();
    assert!(matches!(err, CutError::Plan(_)));
    assert!(h.ledger.submitted_cuts().is_empty());
}

#[tokio::test]
async fn stale_artifact_missing_declared_selector_is_fatal() {
    let h = Harness::new();
    let core = core();
    h.install(&core, address(0xc0));
    let old = FacetFixture::new("AlphaOld").function("old()", "").code("runtime:AlphaOld");
    let alpha = FacetFixture::new("Alpha").function("f(uint256)", "x = a0;");
    // the artifact's creation code still builds the old facet
    let mut stale = alpha.entry();
    stale.creation_code = old.code.clone();
    let catalog = ArtifactCatalog::from_entries([core.entry(), old.entry(), stale]);

    let err = CutOrchestrator::new(&catalog, &h.store, &h.ledger, &h.tree)
        .run(&h.options(plan(vec![PlanEntry::new("Alpha").add("f(uint256)").unwrap()])))
        .await
        .unwrap_err();

    assert!(
        matches!(err, CutError::MissingSelector { ref facet, selector: missing, .. } if facet == "Alpha" && missing == Selector::from_signature("f(uint256)"))
    );
    assert!(h.ledger.submitted_cuts().is_empty());
}

#[tokio::test]
async fn reverted_cut_does_not_advance_history() {
    let h = Harness::new();
    let core = core();
    h.install(&core, address(0xc0));
    let alpha = FacetFixture::new("Alpha").function("f(uint256)", "x = a0;");
    let catalog = catalog(&[&core, &alpha]);
    h.ledger.revert_next_cut();

    let err = CutOrchestrator::new(&catalog, &h.store, &h.ledger, &h.tree)
        .run(&h.options(plan(vec![PlanEntry::new("Alpha").add("f(uint256)").unwrap()])))
        .await
        .unwrap_err();

    assert!(matches!(err, CutError::TransactionReverted { .. }));
    assert_eq!(h.ledger.owner_of(h.diamond, selector("f(uint256)")), None);
    assert_eq!(h.history_len().await, 1);
}

#[tokio::test]
async fn production_run_writes_audit_trail() {
    let h = Harness::new();
    let core = core();
    h.install(&core, address(0xc0));
    let alpha = FacetFixture::new("Alpha").function("f(uint256)", "x = a0;");
    let catalog = catalog(&[&core, &alpha]);
    let config = EngineConfig::new()
        .with_network("mainnet")
        .with_production(true)
        .with_reports(h.dir.path().join("reports"));

    let outcome = CutOrchestrator::new(&catalog, &h.store, &h.ledger, &h.tree)
        .with_config(&config)
        .with_confirmation(&AlwaysConfirm)
        .run(&h.options(plan(vec![PlanEntry::new("Alpha").add("f(uint256)").unwrap()])))
        .await
        .unwrap();
    assert_eq!(outcome.state, CutState::SnapshotRecaptured);

    let reports = config.reports_dir();
    let names: Vec<String> = std::fs::read_dir(&reports)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    assert!(names.iter().any(|n| n.starts_with("diff-")));
    assert!(names.iter().any(|n| n.starts_with("cut-")));
    assert!(reports.join(LATEST_DIFF).exists());
}

#[tokio::test]
async fn catalog_from_disk_drives_an_upgrade() {
    let h = Harness::new();
    let core = core();
    h.install(&core, address(0xc0));
    let alpha = FacetFixture::new("Alpha")
        .function("f(uint256)", "x = a0;")
        .event("Done(uint256)");
    let artifacts = ArtifactDir::new();
    artifacts.write(&core).write(&alpha);

    let cache = BuildInfoCache::default();
    let build = CatalogBuilder::new(artifacts.path(), &cache).build().await.unwrap();
    assert_eq!(build.catalog.len(), 2);

    let outcome = CutOrchestrator::new(&build.catalog, &h.store, &h.ledger, &h.tree)
        .run(&h.options(plan(vec![PlanEntry::new("Alpha").add("f(uint256)").unwrap()])))
        .await
        .unwrap();

    let recorded = outcome.recorded.unwrap().snapshot;
    let record = recorded.facet_by_name("Alpha").unwrap();
    assert_eq!(record.events, vec!["Done(uint256)".to_string()]);
    assert_eq!(record.address, Some(outcome.deployed["Alpha"]));
}
