//! Diff engine
//!
//! Compares the reference snapshot (last trusted state), the planned
//! snapshot and the live snapshot. Live state is used only for drift
//! detection; every facet diff is computed against the reference.

use crate::error::DiffError;
use crate::plan::PlannedSnapshot;
use crate::report::{
    Correspondence, CorrespondenceTier, DiffReport, DriftEntry, FacetDiff, Removal,
    RoutineChange, SelectorChange, SelectorMove,
};
use diamond_artifact::{InternalRoutineInfo, Selector, Visibility};
use diamond_snapshot::{DiamondSnapshot, FacetRecord};
use std::collections::{BTreeMap, BTreeSet};

/// Matched predecessor: index into the reference facets. A name match
/// also carries every later record under the same name.
#[derive(Debug, Clone)]
struct Matched {
    index: usize,
    also: Vec<usize>,
    tier: CorrespondenceTier,
}

/// Stateless diff computation
#[derive(Debug, Clone, Copy, Default)]
pub struct DiffEngine;

impl DiffEngine {
    /// Create engine
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Compute the diff report.
    ///
    /// # Errors
    /// Returns error if the reference or planned snapshot violates
    /// selector uniqueness
    pub fn compute(
        &self,
        reference: Option<&DiamondSnapshot>,
        planned: &PlannedSnapshot,
        live: &DiamondSnapshot,
    ) -> Result<DiffReport, DiffError> {
        if let Some(reference) = reference {
            reference.validate().map_err(DiffError::Reference)?;
        }
        planned.snapshot.validate().map_err(DiffError::Planned)?;

        let mut warnings = Vec::new();
        let matches = correspond(reference, &planned.snapshot.facets);

        let mut facets = Vec::with_capacity(planned.snapshot.facets.len());
        for (record, matched) in planned.snapshot.facets.iter().zip(matches) {
            let (previous, correspondence) = match (reference, matched) {
                (Some(reference), Some(m)) => {
                    let previous = merge_records(reference, &m);
                    let shared = shared_count(&previous, record);
                    if m.tier == CorrespondenceTier::Plurality {
                        let message = format!(
                            "{} was matched to previous facet {} by plurality of {shared} shared selector(s); check this pairing",
                            record.label(),
                            previous.label()
                        );
                        tracing::warn!(facet = %record.label(), previous = %previous.label(), shared, "plurality correspondence");
                        warnings.push(message);
                    }
                    let correspondence = Correspondence {
                        tier: m.tier,
                        previous_name: previous.name.clone(),
                        previous_address: previous.address,
                        shared_selectors: shared,
                    };
                    (Some(previous), Some(correspondence))
                }
                _ => (None, None),
            };
            facets.push(facet_diff(previous.as_ref(), record, correspondence));
        }

        let moves = reference.map(|r| moves(r, planned)).unwrap_or_default();
        let removals = removals(reference, planned);

        let drift = reference.map(|r| drift(r, live)).unwrap_or_default();
        if !drift.is_empty() {
            tracing::warn!(
                diamond = %live.diamond,
                selectors = drift.len(),
                "stored reference disagrees with live diamond"
            );
            warnings.push(format!(
                "drift: {} selector(s) are routed differently on the live diamond than in the stored reference; re-synchronize before trusting this diff",
                drift.len()
            ));
        }
        for unresolved in live.facets.iter().filter(|f| f.name.is_none()) {
            warnings.push(format!(
                "live facet {} matches no compiled artifact; its diff precision is address-only",
                unresolved.label()
            ));
        }

        let mut report = DiffReport {
            diamond: live.diamond,
            chain_id: live.chain_id,
            network: live.network.clone(),
            git_commit: planned.snapshot.git_commit.clone(),
            reference_block: reference.map(|r| r.block_number),
            reference_timestamp: reference.map(|r| r.timestamp),
            live_block: live.block_number,
            live_timestamp: live.timestamp,
            drift_detected: !drift.is_empty(),
            drift,
            facets,
            moves,
            removals,
            warnings,
            unplanned_changes: Vec::new(),
            summary: String::new(),
        };
        report.summary = crate::summary::render(&report);
        Ok(report)
    }
}

/// Match every planned facet to a reference facet: name first for all
/// facets, then address, then plurality of shared selectors. A reference
/// facet is claimed by at most one planned facet.
fn correspond(reference: Option<&DiamondSnapshot>, planned: &[FacetRecord]) -> Vec<Option<Matched>> {
    let Some(reference) = reference else {
        return vec![None; planned.len()];
    };
    let mut claimed = BTreeSet::new();

    let mut out: Vec<Option<Matched>> = planned
        .iter()
        .map(|p| {
            let name = p.name.as_deref()?;
            let mut same_name = reference
                .facets
                .iter()
                .enumerate()
                .filter(|(_, r)| r.name.as_deref() == Some(name))
                .map(|(i, _)| i);
            let index = same_name.next()?;
            let also: Vec<usize> = same_name.collect();
            claimed.insert(index);
            claimed.extend(also.iter().copied());
            Some(Matched {
                index,
                also,
                tier: CorrespondenceTier::Name,
            })
        })
        .collect();

    for (slot, p) in out.iter_mut().zip(planned) {
        if slot.is_some() {
            continue;
        }
        let by_address = p.address.and_then(|address| {
            reference
                .facets
                .iter()
                .enumerate()
                .find(|(i, r)| !claimed.contains(i) && r.address == Some(address))
                .map(|(i, _)| i)
        });
        if let Some(index) = by_address {
            claimed.insert(index);
            *slot = Some(Matched {
                index,
                also: Vec::new(),
                tier: CorrespondenceTier::Address,
            });
            continue;
        }

        let wanted = p.selector_set();
        let mut best: Option<(usize, usize)> = None;
        for (i, r) in reference.facets.iter().enumerate() {
            if claimed.contains(&i) {
                continue;
            }
            let n = r.selectors.iter().filter(|e| wanted.contains(&e.selector)).count();
            // ties keep the earlier facet
            if n > 0 && best.map_or(true, |(_, top)| n > top) {
                best = Some((i, n));
            }
        }
        if let Some((index, _)) = best {
            claimed.insert(index);
            *slot = Some(Matched {
                index,
                also: Vec::new(),
                tier: CorrespondenceTier::Plurality,
            });
        }
    }
    out
}

/// Previous state of a matched facet. A partial earlier cut can leave one
/// facet name at several addresses; their selectors, routines and events
/// are folded into the first record.
fn merge_records(reference: &DiamondSnapshot, matched: &Matched) -> FacetRecord {
    let mut previous = reference.facets[matched.index].clone();
    for other in matched.also.iter().map(|&i| &reference.facets[i]) {
        previous.selectors.extend(other.selectors.iter().cloned());
        for routine in &other.internal_routines {
            if !previous.internal_routines.contains(routine) {
                previous.internal_routines.push(routine.clone());
            }
        }
        for event in &other.events {
            if !previous.events.contains(event) {
                previous.events.push(event.clone());
            }
        }
    }
    previous
}

fn shared_count(previous: &FacetRecord, planned: &FacetRecord) -> usize {
    let prev = previous.selector_set();
    planned
        .selectors
        .iter()
        .filter(|e| prev.contains(&e.selector))
        .count()
}

/// Structural diff of one planned record against its predecessor. With no
/// predecessor every planned selector, routine and event counts as added.
#[must_use]
pub fn facet_diff(
    previous: Option<&FacetRecord>,
    planned: &FacetRecord,
    correspondence: Option<Correspondence>,
) -> FacetDiff {
    let prev_selectors = previous.map(FacetRecord::selector_set).unwrap_or_default();
    let planned_selectors = planned.selector_set();

    let selectors_added = planned
        .selectors
        .iter()
        .filter(|e| !prev_selectors.contains(&e.selector))
        .map(SelectorChange::from)
        .collect();
    let selectors_removed = previous
        .map(|p| {
            p.selectors
                .iter()
                .filter(|e| !planned_selectors.contains(&e.selector))
                .map(SelectorChange::from)
                .collect()
        })
        .unwrap_or_default();

    let no_routines: &[InternalRoutineInfo] = &[];
    let routines = routine_diff(
        previous.map_or(no_routines, |p| p.internal_routines.as_slice()),
        &planned.internal_routines,
    );
    let routines_changed = !routines.is_empty();

    let mut modified_direct = Vec::new();
    let mut modified_indirect = Vec::new();
    if let Some(previous) = previous {
        for next in &planned.selectors {
            let Some(prev) = previous.entry(next.selector) else {
                continue;
            };
            match (prev.source_hash, next.source_hash) {
                (Some(a), Some(b)) if a != b => modified_direct.push(SelectorChange::from(next)),
                (Some(_), Some(_)) => {
                    let body_changed = matches!(
                        (prev.implementation_hash, next.implementation_hash),
                        (Some(a), Some(b)) if a != b
                    );
                    if body_changed && routines_changed {
                        modified_indirect.push(SelectorChange::from(next));
                    }
                }
                _ => {}
            }
        }
    }

    let prev_events: BTreeSet<&String> = previous.map(|p| p.events.iter().collect()).unwrap_or_default();
    let next_events: BTreeSet<&String> = planned.events.iter().collect();

    FacetDiff {
        facet_name: planned.label(),
        correspondence,
        previous_selector_count: prev_selectors.len(),
        planned_selector_count: planned_selectors.len(),
        selectors_added,
        selectors_removed,
        modified_direct,
        modified_indirect,
        routines_added: routines.added,
        routines_removed: routines.removed,
        routines_modified: routines.modified,
        events_added: next_events.difference(&prev_events).map(|e| (*e).clone()).collect(),
        events_removed: prev_events.difference(&next_events).map(|e| (*e).clone()).collect(),
        abi_changed: previous.map_or(false, |p| differs(p.abi_hash, planned.abi_hash)),
        bytecode_changed: previous.map_or(false, |p| differs(p.bytecode_hash, planned.bytecode_hash)),
    }
}

fn differs<T: PartialEq>(a: Option<T>, b: Option<T>) -> bool {
    matches!((a, b), (Some(a), Some(b)) if a != b)
}

#[derive(Debug, Default)]
struct RoutineDiff {
    added: Vec<RoutineChange>,
    removed: Vec<RoutineChange>,
    modified: Vec<RoutineChange>,
}

impl RoutineDiff {
    fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty() && self.modified.is_empty()
    }
}

/// Routines are keyed by (visibility, name). Overloads sharing a key are
/// paired after setting aside identical bodies.
fn routine_diff(prev: &[InternalRoutineInfo], next: &[InternalRoutineInfo]) -> RoutineDiff {
    fn group(list: &[InternalRoutineInfo]) -> BTreeMap<(Visibility, &str), Vec<&InternalRoutineInfo>> {
        let mut groups: BTreeMap<(Visibility, &str), Vec<&InternalRoutineInfo>> = BTreeMap::new();
        for r in list {
            groups.entry((r.visibility, r.name.as_str())).or_default().push(r);
        }
        groups
    }

    let before = group(prev);
    let after = group(next);
    let keys: BTreeSet<(Visibility, &str)> = before.keys().chain(after.keys()).copied().collect();

    let mut diff = RoutineDiff::default();
    for key in keys {
        let change = || RoutineChange {
            name: key.1.to_string(),
            visibility: key.0,
        };
        let mut old: Vec<&InternalRoutineInfo> = before.get(&key).cloned().unwrap_or_default();
        let mut new: Vec<&InternalRoutineInfo> = after.get(&key).cloned().unwrap_or_default();

        old.retain(|o| match new.iter().position(|n| same_routine(o, n)) {
            Some(pos) => {
                new.remove(pos);
                false
            }
            None => true,
        });

        let paired = old.len().min(new.len());
        for _ in 0..paired {
            diff.modified.push(change());
        }
        for _ in paired..old.len() {
            diff.removed.push(change());
        }
        for _ in paired..new.len() {
            diff.added.push(change());
        }
    }
    diff
}

/// Unchanged when the sanitized bodies agree; source hashes decide only
/// when a body hash is missing.
fn same_routine(a: &InternalRoutineInfo, b: &InternalRoutineInfo) -> bool {
    if a.implementation_hash.is_zero() || b.implementation_hash.is_zero() {
        a.source_hash == b.source_hash
    } else {
        a.implementation_hash == b.implementation_hash
    }
}

fn moves(reference: &DiamondSnapshot, planned: &PlannedSnapshot) -> Vec<SelectorMove> {
    let mut out = Vec::new();
    for record in &planned.snapshot.facets {
        for entry in &record.selectors {
            let Some(owner) = reference.owner_of(entry.selector) else {
                continue;
            };
            if owner.name != record.name {
                out.push(SelectorMove {
                    selector: entry.selector,
                    signature: entry
                        .signature
                        .clone()
                        .or_else(|| owner.entry(entry.selector).and_then(|e| e.signature.clone())),
                    from_facet: owner.label(),
                    to_facet: record.label(),
                });
            }
        }
    }
    out
}

fn removals(reference: Option<&DiamondSnapshot>, planned: &PlannedSnapshot) -> Vec<Removal> {
    planned
        .removals
        .iter()
        .map(|r| {
            let selector = r.selector();
            let owner = reference.and_then(|s| s.owner_of(selector));
            Removal {
                selector,
                signature: r
                    .signature()
                    .map(str::to_string)
                    .or_else(|| owner.and_then(|o| o.entry(selector)).and_then(|e| e.signature.clone())),
                from_facet: owner.map(FacetRecord::label),
                still_planned_in: planned.snapshot.owner_of(selector).map(FacetRecord::label),
            }
        })
        .collect()
}

/// Selector-for-selector comparison of reference and live ownership
fn drift(reference: &DiamondSnapshot, live: &DiamondSnapshot) -> Vec<DriftEntry> {
    fn owners(snapshot: &DiamondSnapshot) -> BTreeMap<Selector, &FacetRecord> {
        snapshot
            .owners()
            .into_iter()
            .map(|(sel, idx)| (sel, &snapshot.facets[idx]))
            .collect()
    }

    let before = owners(reference);
    let after = owners(live);
    let selectors: BTreeSet<Selector> = before.keys().chain(after.keys()).copied().collect();

    selectors
        .into_iter()
        .filter_map(|selector| {
            let r = before.get(&selector).copied();
            let l = after.get(&selector).copied();
            let agree = match (r, l) {
                (Some(a), Some(b)) => same_owner(a, b),
                _ => false,
            };
            if agree {
                return None;
            }
            let signature = [r, l]
                .into_iter()
                .flatten()
                .find_map(|f| f.entry(selector).and_then(|e| e.signature.clone()));
            Some(DriftEntry {
                selector,
                signature,
                reference_owner: r.map(FacetRecord::label),
                live_owner: l.map(FacetRecord::label),
            })
        })
        .collect()
}

fn same_owner(a: &FacetRecord, b: &FacetRecord) -> bool {
    match (a.address, b.address) {
        (Some(x), Some(y)) => x == y,
        _ => a.name.is_some() && a.name == b.name,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use diamond_artifact::{Address, ContentHash, SelectorRef};
    use diamond_snapshot::SelectorEntry;
    use pretty_assertions::assert_eq;

    fn entry(sig: &str, source: &str, body: &str) -> SelectorEntry {
        SelectorEntry {
            selector: Selector::from_signature(sig),
            signature: Some(sig.to_string()),
            name: sig.split('(').next().map(str::to_string),
            mutability: None,
            implementation_hash: Some(ContentHash::compute(body.as_bytes())),
            source_hash: Some(ContentHash::compute(source.as_bytes())),
        }
    }

    fn routine(name: &str, source: &str, body: &str) -> InternalRoutineInfo {
        InternalRoutineInfo {
            name: name.to_string(),
            visibility: Visibility::Internal,
            implementation_hash: ContentHash::compute(body.as_bytes()),
            source_hash: ContentHash::compute(source.as_bytes()),
        }
    }

    fn facet(name: &str, address: u8, selectors: Vec<SelectorEntry>) -> FacetRecord {
        FacetRecord {
            name: Some(name.to_string()),
            address: Some(Address::new([address; 20])),
            source_name: Some(format!("contracts/{name}.sol")),
            bytecode_hash: None,
            abi_hash: None,
            resolved_by: None,
            selectors,
            internal_routines: Vec::new(),
            events: Vec::new(),
        }
    }

    fn snapshot(facets: Vec<FacetRecord>) -> DiamondSnapshot {
        DiamondSnapshot {
            diamond: Address::new([0xd1; 20]),
            chain_id: 31337,
            network: "localhost".into(),
            block_number: 10,
            timestamp: 1_700_000_000,
            git_commit: None,
            facets,
        }
    }

    fn planned(facets: Vec<FacetRecord>, removals: &[&str]) -> PlannedSnapshot {
        let mut facets = facets;
        for f in &mut facets {
            f.address = None;
        }
        PlannedSnapshot {
            snapshot: snapshot(facets),
            removals: removals.iter().map(|r| r.parse().unwrap()).collect(),
        }
    }

    #[test]
    fn new_facet_adds_every_selector() {
        let reference = snapshot(vec![facet("Beta", 0xb0, vec![entry("a()", "a", "a")])]);
        let plan = planned(vec![facet("Alpha", 0, vec![entry("f(uint256)", "f", "f")])], &[]);
        let report = DiffEngine::new().compute(Some(&reference), &plan, &reference).unwrap();

        let alpha = report.facet("Alpha").unwrap();
        assert!(alpha.correspondence.is_none());
        assert_eq!(alpha.added_labels(), vec!["f(uint256)".to_string()]);
        assert!(alpha.selectors_removed.is_empty());
        assert!(alpha.modified_direct.is_empty() && alpha.modified_indirect.is_empty());
        assert!(!report.drift_detected);
    }

    #[test]
    fn dropped_selector_is_removed() {
        let beta = facet(
            "Beta",
            0xb0,
            vec![entry("a()", "a", "a"), entry("b()", "b", "b"), entry("c(uint256)", "c", "c")],
        );
        let reference = snapshot(vec![beta]);
        let plan = planned(
            vec![facet("Beta", 0, vec![entry("a()", "a", "a"), entry("b()", "b", "b")])],
            &["c(uint256)"],
        );
        let report = DiffEngine::new().compute(Some(&reference), &plan, &reference).unwrap();

        let diff = report.facet("Beta").unwrap();
        assert_eq!(diff.removed_labels(), vec!["c(uint256)".to_string()]);
        assert!(diff.selectors_added.is_empty());
        assert_eq!(report.removals.len(), 1);
        assert_eq!(report.removals[0].from_facet.as_deref(), Some("Beta"));
        assert!(report.removals[0].still_planned_in.is_none());
    }

    #[test]
    fn source_change_is_direct() {
        let reference = snapshot(vec![facet("A", 1, vec![entry("f()", "f v1", "f1")])]);
        let plan = planned(vec![facet("A", 0, vec![entry("f()", "f v2", "f2")])], &[]);
        let report = DiffEngine::new().compute(Some(&reference), &plan, &reference).unwrap();
        let diff = report.facet("A").unwrap();
        assert_eq!(diff.modified_direct.len(), 1);
        assert!(diff.modified_indirect.is_empty());
    }

    #[test]
    fn routine_change_makes_body_change_indirect() {
        let mut before = facet("A", 1, vec![entry("f()", "f", "f calls _h v1")]);
        before.internal_routines = vec![routine("_h", "h v1", "h1")];
        let mut after = facet("A", 0, vec![entry("f()", "f", "f calls _h v2")]);
        after.internal_routines = vec![routine("_h", "h v2", "h2")];

        let reference = snapshot(vec![before]);
        let plan = planned(vec![after], &[]);
        let report = DiffEngine::new().compute(Some(&reference), &plan, &reference).unwrap();
        let diff = report.facet("A").unwrap();
        assert!(diff.modified_direct.is_empty());
        assert_eq!(diff.modified_indirect.len(), 1);
        assert_eq!(diff.routines_modified.len(), 1);
    }

    #[test]
    fn body_change_without_routine_change_is_not_classified() {
        let reference = snapshot(vec![facet("A", 1, vec![entry("f()", "f", "f1")])]);
        let plan = planned(vec![facet("A", 0, vec![entry("f()", "f", "f2")])], &[]);
        let report = DiffEngine::new().compute(Some(&reference), &plan, &reference).unwrap();
        let diff = report.facet("A").unwrap();
        assert!(diff.modified_direct.is_empty() && diff.modified_indirect.is_empty());
    }

    #[test]
    fn comment_only_routine_change_is_not_modified() {
        let before = vec![routine("_h", "h // old comment", "h")];
        let after = vec![routine("_h", "h // new comment", "h")];
        assert!(routine_diff(&before, &after).is_empty());

        let grown = vec![routine("_h", "h", "h"), routine("_g", "g", "g")];
        let diff = routine_diff(&before, &grown);
        assert_eq!(diff.added.len(), 1);
        assert_eq!(diff.added[0].name, "_g");
    }

    #[test]
    fn overloads_pair_after_identical_bodies() {
        let before = vec![routine("_h", "h1", "h1"), routine("_h", "h2", "h2")];
        let after = vec![routine("_h", "h3", "h3"), routine("_h", "h1", "h1")];
        let diff = routine_diff(&before, &after);
        assert_eq!(diff.modified.len(), 1);
        assert!(diff.added.is_empty() && diff.removed.is_empty());
    }

    #[test]
    fn correspondence_falls_back_to_address_then_plurality() {
        let mut unnamed = facet("x", 0xaa, vec![entry("a()", "a", "a")]);
        unnamed.name = None;
        let old = facet("Old", 0xbb, vec![entry("p()", "p", "p"), entry("q()", "q", "q")]);
        let reference = snapshot(vec![unnamed, old]);

        let mut by_address = facet("Named", 0xaa, vec![entry("a()", "a", "a")]);
        by_address.address = Some(Address::new([0xaa; 20]));
        let renamed = facet("New", 0, vec![entry("p()", "p", "p"), entry("q()", "q", "q")]);
        let mut plan = planned(vec![renamed], &[]);
        plan.snapshot.facets.insert(0, by_address);

        let report = DiffEngine::new().compute(Some(&reference), &plan, &reference).unwrap();
        let named = report.facet("Named").unwrap();
        assert_eq!(named.correspondence.as_ref().unwrap().tier, CorrespondenceTier::Address);
        let new = report.facet("New").unwrap();
        let c = new.correspondence.as_ref().unwrap();
        assert_eq!(c.tier, CorrespondenceTier::Plurality);
        assert_eq!(c.previous_name.as_deref(), Some("Old"));
        assert!(new.selectors_added.is_empty());
        assert_eq!(report.warnings.iter().filter(|w| w.contains("plurality")).count(), 1);
        // ownership changes name, so every selector is a move
        assert_eq!(report.moves.len(), 3);
    }

    #[test]
    fn name_claims_take_priority_over_plurality() {
        let beta = facet("Beta", 0xb0, vec![entry("a()", "a", "a"), entry("m()", "m", "m")]);
        let reference = snapshot(vec![beta]);
        let plan = planned(
            vec![
                facet("Alpha", 0, vec![entry("m()", "m", "m")]),
                facet("Beta", 0, vec![entry("a()", "a", "a")]),
            ],
            &[],
        );
        let report = DiffEngine::new().compute(Some(&reference), &plan, &reference).unwrap();
        assert!(report.facet("Alpha").unwrap().correspondence.is_none());
        let beta = report.facet("Beta").unwrap();
        assert_eq!(beta.removed_labels(), vec!["m()".to_string()]);
        assert_eq!(report.moves.len(), 1);
        assert_eq!(report.moves[0].from_facet, "Beta");
        assert_eq!(report.moves[0].to_facet, "Alpha");
    }

    #[test]
    fn facet_name_split_across_addresses_is_one_predecessor() {
        let mut old = facet("Beta", 0xb2, vec![entry("c()", "c", "c")]);
        old.internal_routines.push(routine("_r", "r", "r"));
        let mut current = facet("Beta", 0xb1, vec![entry("a()", "a", "a"), entry("b()", "b", "b")]);
        current.internal_routines.push(routine("_r", "r", "r"));
        let reference = snapshot(vec![current, old]);

        let mut next = facet(
            "Beta",
            0,
            vec![entry("a()", "a", "a"), entry("b()", "b", "b"), entry("c()", "c", "c")],
        );
        next.internal_routines.push(routine("_r", "r", "r"));
        let plan = planned(vec![next], &[]);

        let report = DiffEngine::new().compute(Some(&reference), &plan, &reference).unwrap();
        let beta = report.facet("Beta").unwrap();
        assert!(beta.selectors_added.is_empty());
        assert!(beta.selectors_removed.is_empty());
        assert!(beta.routines_removed.is_empty());
        assert_eq!(beta.previous_selector_count, 3);
        assert_eq!(beta.correspondence.as_ref().unwrap().tier, CorrespondenceTier::Name);
        assert!(report.moves.is_empty());
    }

    #[test]
    fn drift_detected_only_on_disagreement() {
        let reference = snapshot(vec![
            facet("A", 1, vec![entry("a()", "a", "a")]),
            facet("B", 2, vec![entry("b()", "b", "b")]),
        ]);
        let plan = planned(vec![], &[]);
        let same = DiffEngine::new().compute(Some(&reference), &plan, &reference).unwrap();
        assert!(!same.drift_detected);

        let mut live = reference.clone();
        let moved = live.facets[1].selectors.remove(0);
        live.facets[0].selectors.push(moved);
        let report = DiffEngine::new().compute(Some(&reference), &plan, &live).unwrap();
        assert!(report.drift_detected);
        assert_eq!(report.drift.len(), 1);
        assert_eq!(report.drift[0].reference_owner.as_deref(), Some("B"));
        assert_eq!(report.drift[0].live_owner.as_deref(), Some("A"));
        assert!(report.summary.contains("DRIFT"));
    }

    #[test]
    fn no_reference_means_no_drift_and_all_new() {
        let live = snapshot(vec![facet("A", 1, vec![entry("a()", "a", "a")])]);
        let plan = planned(vec![facet("A", 0, vec![entry("a()", "a", "a")])], &[]);
        let report = DiffEngine::new().compute(None, &plan, &live).unwrap();
        assert!(!report.has_reference());
        assert!(!report.drift_detected);
        assert_eq!(report.facet("A").unwrap().selectors_added.len(), 1);
    }

    #[test]
    fn raw_removal_takes_signature_from_reference() {
        let reference = snapshot(vec![facet("A", 1, vec![entry("c(uint256)", "c", "c")])]);
        let raw = Selector::from_signature("c(uint256)").to_string();
        let plan = planned(vec![], &[raw.as_str()]);
        let report = DiffEngine::new().compute(Some(&reference), &plan, &reference).unwrap();
        assert!(matches!(plan.removals[0], SelectorRef::Raw(_)));
        assert_eq!(report.removals[0].signature.as_deref(), Some("c(uint256)"));
    }
}
