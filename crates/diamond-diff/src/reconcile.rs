//! Reconciliation of declared intent against the compiled difference
//!
//! Every addition and removal the diff engine detects must be declared in
//! the plan, and every declaration must correspond to a detected change.
//! Facets left out of the plan are checked separately against the working
//! tree: a changed source file with a non-empty structural diff is surfaced
//! as a warning, never as an error.

use crate::engine::facet_diff;
use crate::error::{ReconcileError, WorkingTreeError};
use crate::plan::UpgradePlan;
use crate::report::{DiffReport, Mismatch, MismatchKind, UnplannedChange};
use async_trait::async_trait;
use diamond_artifact::Selector;
use diamond_catalog::ArtifactCatalog;
use diamond_snapshot::{DiamondSnapshot, FacetRecord};
use std::collections::BTreeSet;
use std::path::PathBuf;

/// Source-control view of the project
#[async_trait]
pub trait WorkingTree: Send + Sync {
    /// Revision the working tree is based on
    async fn head_revision(&self) -> Result<Option<String>, WorkingTreeError>;

    /// Staged, unstaged and untracked paths, relative to the project root
    async fn changed_files(&self) -> Result<BTreeSet<PathBuf>, WorkingTreeError>;
}

/// Fixed working tree, for tests and for projects outside source control
#[derive(Debug, Clone, Default)]
pub struct StaticWorkingTree {
    pub revision: Option<String>,
    pub changed: BTreeSet<PathBuf>,
}

impl StaticWorkingTree {
    /// Tree at `revision` with `changed` files
    pub fn new<I, P>(revision: Option<String>, changed: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        Self {
            revision,
            changed: changed.into_iter().map(Into::into).collect(),
        }
    }
}

#[async_trait]
impl WorkingTree for StaticWorkingTree {
    async fn head_revision(&self) -> Result<Option<String>, WorkingTreeError> {
        Ok(self.revision.clone())
    }

    async fn changed_files(&self) -> Result<BTreeSet<PathBuf>, WorkingTreeError> {
        Ok(self.changed.clone())
    }
}

/// Cross-checks a diff report against the plan that produced it
pub struct ReconciliationValidator<'a> {
    catalog: &'a ArtifactCatalog,
}

impl<'a> ReconciliationValidator<'a> {
    /// Create validator
    #[must_use]
    pub fn new(catalog: &'a ArtifactCatalog) -> Self {
        Self { catalog }
    }

    /// Check declared additions and removals in both directions.
    ///
    /// # Errors
    /// Returns every mismatch found, not just the first
    pub fn check(&self, plan: &UpgradePlan, report: &DiffReport) -> Result<(), ReconcileError> {
        let mismatches = self.mismatches(plan, report);
        if mismatches.is_empty() {
            Ok(())
        } else {
            for m in &mismatches {
                tracing::error!(kind = ?m.kind, selector = %m.selector, "{m}");
            }
            Err(ReconcileError::Mismatches(mismatches))
        }
    }

    /// All mismatches between `plan` and `report`
    #[must_use]
    pub fn mismatches(&self, plan: &UpgradePlan, report: &DiffReport) -> Vec<Mismatch> {
        let declared_removals: BTreeSet<Selector> =
            plan.removals().iter().map(|r| r.selector()).collect();
        let mut out = Vec::new();

        for entry in plan.deployments() {
            let name = entry.facet_name.trim();
            let Some(diff) = report.facet(name) else {
                continue;
            };
            let declared = entry.declared_adds();

            for added in &diff.selectors_added {
                if report.moves_into(name, added.selector).is_some() {
                    continue;
                }
                if !declared.contains(&added.selector) {
                    out.push(Mismatch {
                        kind: MismatchKind::UndeclaredAddition,
                        facet: Some(name.to_string()),
                        selector: added.selector,
                        signature: added.signature.clone(),
                        detail: "is added by the compiled facet but not declared in addSelectors"
                            .to_string(),
                    });
                }
            }

            for decl in &entry.add_selectors {
                let selector = decl.selector();
                let detail = if let Some(m) = report.moves_into(name, selector) {
                    format!(
                        "is declared as an addition but is already served by {}; it will be replaced, not added",
                        m.from_facet
                    )
                } else if diff.selectors_added.iter().any(|a| a.selector == selector) {
                    continue;
                } else if self
                    .catalog
                    .get(name)
                    .is_some_and(|e| e.implementation.serves(selector))
                {
                    "is declared as an addition but the previous version already serves it"
                        .to_string()
                } else {
                    "is declared as an addition but the compiled facet does not export it"
                        .to_string()
                };
                out.push(Mismatch {
                    kind: MismatchKind::PhantomAddition,
                    facet: Some(name.to_string()),
                    selector,
                    signature: decl.signature().map(str::to_string),
                    detail,
                });
            }

            for removed in &diff.selectors_removed {
                if report.is_moved(removed.selector) || declared_removals.contains(&removed.selector) {
                    continue;
                }
                out.push(Mismatch {
                    kind: MismatchKind::UndeclaredRemoval,
                    facet: Some(name.to_string()),
                    selector: removed.selector,
                    signature: removed.signature.clone(),
                    detail: "is dropped by the compiled facet but not declared in removeSelectors"
                        .to_string(),
                });
            }
        }

        for removal in &report.removals {
            let (facet, detail) = if let Some(owner) = &removal.still_planned_in {
                (
                    Some(owner.clone()),
                    "is declared for removal but is still exported by a planned facet".to_string(),
                )
            } else if report.has_reference() && removal.from_facet.is_none() {
                (
                    None,
                    "is declared for removal but the diamond does not serve it".to_string(),
                )
            } else {
                continue;
            };
            out.push(Mismatch {
                kind: MismatchKind::PhantomRemoval,
                facet,
                selector: removal.selector,
                signature: removal.signature.clone(),
                detail,
            });
        }
        out
    }

    /// Facets left out of the plan whose source file is modified in the
    /// working tree and whose compiled surface differs from the reference.
    /// A working tree that cannot be inspected yields no warnings.
    pub async fn unplanned_changes(
        &self,
        plan: &UpgradePlan,
        reference: Option<&DiamondSnapshot>,
        tree: &dyn WorkingTree,
    ) -> Vec<UnplannedChange> {
        let changed = match tree.changed_files().await {
            Ok(changed) => changed,
            Err(e) => {
                tracing::warn!(error = %e, "skipping unplanned-change check");
                return Vec::new();
            }
        };
        let Some(reference) = reference else {
            return Vec::new();
        };

        let mut out = Vec::new();
        for entry in self.catalog.iter() {
            let name = entry.name();
            if plan.deploys(name) {
                continue;
            }
            let source = entry.implementation.source_name.as_str();
            if !changed.iter().any(|p| p.ends_with(source)) {
                continue;
            }
            let Some(previous) = reference.facet_by_name(name) else {
                continue;
            };
            let compiled = FacetRecord::from_implementation(&entry.implementation, None);
            let diff = facet_diff(Some(previous), &compiled, None);
            if diff.is_unchanged() {
                continue;
            }
            let description = diff.describe();
            tracing::warn!(facet = %name, file = %source, changes = %description, "unplanned change");
            out.push(UnplannedChange {
                facet: name.to_string(),
                source_file: source.to_string(),
                description,
            });
        }
        out
    }
}
