//! Diff report model
//!
//! Everything here is transient: a report is built per run and persisted
//! only as an audit file.

use diamond_artifact::{Address, Selector, Visibility};
use diamond_snapshot::SelectorEntry;
use serde::{Deserialize, Serialize};
use std::fmt;

/// How a planned facet was matched to its predecessor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CorrespondenceTier {
    Name,
    Address,
    /// Weakest tier; always reported as a warning
    Plurality,
}

impl fmt::Display for CorrespondenceTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Name => "name",
            Self::Address => "address",
            Self::Plurality => "plurality",
        })
    }
}

/// The reference facet a planned facet is compared against
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Correspondence {
    pub tier: CorrespondenceTier,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous_address: Option<Address>,
    /// Selectors the two facets have in common
    pub shared_selectors: usize,
}

/// A selector with its signature when known
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectorChange {
    pub selector: Selector,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
}

impl SelectorChange {
    /// Signature, else hex id
    #[must_use]
    pub fn label(&self) -> String {
        self.signature
            .clone()
            .unwrap_or_else(|| self.selector.to_string())
    }
}

impl From<&SelectorEntry> for SelectorChange {
    fn from(entry: &SelectorEntry) -> Self {
        Self {
            selector: entry.selector,
            signature: entry.signature.clone(),
        }
    }
}

/// An internal routine that appeared, disappeared or changed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoutineChange {
    pub name: String,
    pub visibility: Visibility,
}

/// Structural difference of one planned facet against its predecessor
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FacetDiff {
    pub facet_name: String,
    /// `None` when the facet is new
    pub correspondence: Option<Correspondence>,
    pub previous_selector_count: usize,
    pub planned_selector_count: usize,
    pub selectors_added: Vec<SelectorChange>,
    pub selectors_removed: Vec<SelectorChange>,
    /// Own source text changed
    pub modified_direct: Vec<SelectorChange>,
    /// Source unchanged, body hash changed, and some internal routine changed
    pub modified_indirect: Vec<SelectorChange>,
    pub routines_added: Vec<RoutineChange>,
    pub routines_removed: Vec<RoutineChange>,
    pub routines_modified: Vec<RoutineChange>,
    pub events_added: Vec<String>,
    pub events_removed: Vec<String>,
    pub abi_changed: bool,
    pub bytecode_changed: bool,
}

impl FacetDiff {
    /// Labels of added selectors
    #[must_use]
    pub fn added_labels(&self) -> Vec<String> {
        self.selectors_added.iter().map(SelectorChange::label).collect()
    }

    /// Labels of removed selectors
    #[must_use]
    pub fn removed_labels(&self) -> Vec<String> {
        self.selectors_removed.iter().map(SelectorChange::label).collect()
    }

    /// Any internal routine added, removed or modified
    #[must_use]
    pub fn has_routine_changes(&self) -> bool {
        !(self.routines_added.is_empty()
            && self.routines_removed.is_empty()
            && self.routines_modified.is_empty())
    }

    /// Changes visible to callers of the diamond
    #[must_use]
    pub fn has_surface_changes(&self) -> bool {
        !(self.selectors_added.is_empty()
            && self.selectors_removed.is_empty()
            && self.modified_direct.is_empty()
            && self.modified_indirect.is_empty())
    }

    /// No structural difference at all
    #[must_use]
    pub fn is_unchanged(&self) -> bool {
        !self.has_surface_changes()
            && !self.has_routine_changes()
            && self.events_added.is_empty()
            && self.events_removed.is_empty()
    }

    /// Compact one-line description, `+2 selectors, ~1 direct, 1 routine modified`
    #[must_use]
    pub fn describe(&self) -> String {
        let mut parts = Vec::new();
        push_count(&mut parts, "+", self.selectors_added.len(), "selector");
        push_count(&mut parts, "-", self.selectors_removed.len(), "selector");
        if !self.modified_direct.is_empty() {
            parts.push(format!("~{} direct", self.modified_direct.len()));
        }
        if !self.modified_indirect.is_empty() {
            parts.push(format!("~{} indirect", self.modified_indirect.len()));
        }
        for (n, what) in [
            (self.routines_added.len(), "added"),
            (self.routines_removed.len(), "removed"),
            (self.routines_modified.len(), "modified"),
        ] {
            if n > 0 {
                parts.push(format!("{n} {} {what}", plural(n, "routine")));
            }
        }
        let events = self.events_added.len() + self.events_removed.len();
        if events > 0 {
            parts.push(format!("{events} {} changed", plural(events, "event")));
        }
        if parts.is_empty() {
            "no structural change".to_string()
        } else {
            parts.join(", ")
        }
    }
}

fn plural(n: usize, word: &str) -> String {
    if n == 1 {
        word.to_string()
    } else {
        format!("{word}s")
    }
}

fn push_count(parts: &mut Vec<String>, sign: &str, n: usize, word: &str) {
    if n > 0 {
        parts.push(format!("{sign}{n} {}", plural(n, word)));
    }
}

/// A selector that changes owning facet
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectorMove {
    pub selector: Selector,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
    pub from_facet: String,
    pub to_facet: String,
}

/// A declared removal
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Removal {
    pub selector: Selector,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
    /// Owner in the reference, if it served the selector
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from_facet: Option<String>,
    /// Planned facet that still exports the selector
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub still_planned_in: Option<String>,
}

impl Removal {
    /// Signature, else hex id
    #[must_use]
    pub fn label(&self) -> String {
        self.signature
            .clone()
            .unwrap_or_else(|| self.selector.to_string())
    }
}

/// One selector whose owner differs between reference and live state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DriftEntry {
    pub selector: Selector,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference_owner: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub live_owner: Option<String>,
}

/// A facet left out of the plan whose source changed in the working tree
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnplannedChange {
    pub facet: String,
    pub source_file: String,
    pub description: String,
}

/// Which side of a reconciliation check failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MismatchKind {
    /// Compiled facet adds a selector the plan does not declare
    UndeclaredAddition,
    /// Plan declares an addition the compiled diff does not show
    PhantomAddition,
    /// Compiled facet drops a selector the plan does not declare removed
    UndeclaredRemoval,
    /// Plan declares a removal that has nothing to remove
    PhantomRemoval,
}

/// One disagreement between declared plan and compiled difference
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Mismatch {
    pub kind: MismatchKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub facet: Option<String>,
    pub selector: Selector,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
    pub detail: String,
}

impl fmt::Display for Mismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = self.signature.as_deref().unwrap_or("<unknown signature>");
        match &self.facet {
            Some(facet) => write!(f, "{facet}: {label} ({}) {}", self.selector, self.detail),
            None => write!(f, "{label} ({}) {}", self.selector, self.detail),
        }
    }
}

/// Full result of one diff run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiffReport {
    pub diamond: Address,
    pub chain_id: u64,
    pub network: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub git_commit: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference_block: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference_timestamp: Option<u64>,
    pub live_block: u64,
    pub live_timestamp: u64,
    pub drift_detected: bool,
    pub drift: Vec<DriftEntry>,
    pub facets: Vec<FacetDiff>,
    pub moves: Vec<SelectorMove>,
    pub removals: Vec<Removal>,
    pub warnings: Vec<String>,
    pub unplanned_changes: Vec<UnplannedChange>,
    pub summary: String,
}

impl DiffReport {
    /// Diff for a planned facet
    #[must_use]
    pub fn facet(&self, name: &str) -> Option<&FacetDiff> {
        self.facets.iter().find(|f| f.facet_name == name)
    }

    /// Whether a reference snapshot was available
    #[inline]
    #[must_use]
    pub fn has_reference(&self) -> bool {
        self.reference_block.is_some()
    }

    /// Whether `selector` moves into `facet` from another facet
    #[must_use]
    pub fn moves_into(&self, facet: &str, selector: Selector) -> Option<&SelectorMove> {
        self.moves
            .iter()
            .find(|m| m.selector == selector && m.to_facet == facet)
    }

    /// Whether `selector` is taken over by some planned facet
    #[must_use]
    pub fn is_moved(&self, selector: Selector) -> bool {
        self.moves.iter().any(|m| m.selector == selector)
    }

    /// Attach unplanned-change warnings and re-render the summary
    pub fn attach_unplanned(&mut self, changes: Vec<UnplannedChange>) {
        self.unplanned_changes = changes;
        self.summary = crate::summary::render(self);
    }
}
