//! Human-readable diff summary
//!
//! Grouped per facet into diamond impact (what callers see) and source
//! changes (routine and event deltas behind an unchanged surface).

use crate::report::{DiffReport, FacetDiff, RoutineChange};
use std::fmt::Write as _;

/// Render the multi-line summary for a report
#[must_use]
pub fn render(report: &DiffReport) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "Diamond {} on {} (chain {})",
        report.diamond, report.network, report.chain_id
    );
    match (report.reference_block, report.reference_timestamp) {
        (Some(block), Some(ts)) => {
            let _ = writeln!(out, "Reference: block {block} (timestamp {ts})");
        }
        _ => {
            let _ = writeln!(out, "Reference: none (first run, live state is the baseline)");
        }
    }
    let _ = writeln!(
        out,
        "Live:      block {} (timestamp {})",
        report.live_block, report.live_timestamp
    );
    if let Some(commit) = &report.git_commit {
        let _ = writeln!(out, "Revision:  {commit}");
    }

    if report.drift_detected {
        let _ = writeln!(
            out,
            "\n!! DRIFT: stored reference does not match the live diamond ({} selector(s))",
            report.drift.len()
        );
        for entry in &report.drift {
            let _ = writeln!(
                out,
                "   {} {}: reference {}, live {}",
                entry.selector,
                entry.signature.as_deref().unwrap_or(""),
                entry.reference_owner.as_deref().unwrap_or("<none>"),
                entry.live_owner.as_deref().unwrap_or("<none>"),
            );
        }
    }

    if !report.unplanned_changes.is_empty() {
        let _ = writeln!(out, "\n!! UNPLANNED CHANGES in facets left out of the plan:");
        for change in &report.unplanned_changes {
            let _ = writeln!(
                out,
                "   {} ({}): {}",
                change.facet, change.source_file, change.description
            );
        }
    }

    for warning in report.warnings.iter().filter(|w| !w.starts_with("drift:")) {
        let _ = writeln!(out, "warning: {warning}");
    }

    for facet in &report.facets {
        render_facet(&mut out, facet);
    }

    if !report.moves.is_empty() {
        let _ = writeln!(out, "\nSelector moves:");
        for m in &report.moves {
            let _ = writeln!(
                out,
                "   {} {}: {} -> {}",
                m.selector,
                m.signature.as_deref().unwrap_or(""),
                m.from_facet,
                m.to_facet
            );
        }
    }

    if !report.removals.is_empty() {
        let _ = writeln!(out, "\nRemovals:");
        for r in &report.removals {
            let _ = writeln!(
                out,
                "   {} {} from {}",
                r.selector,
                r.signature.as_deref().unwrap_or(""),
                r.from_facet.as_deref().unwrap_or("<not served>")
            );
        }
    }
    out
}

fn render_facet(out: &mut String, facet: &FacetDiff) {
    let origin = match &facet.correspondence {
        Some(c) => format!(
            "previous {} via {}",
            c.previous_name
                .clone()
                .or_else(|| c.previous_address.map(|a| a.to_string()))
                .unwrap_or_default(),
            c.tier
        ),
        None => "new facet".to_string(),
    };
    let _ = writeln!(
        out,
        "\n== {} ({origin}; {} -> {} selectors) ==",
        facet.facet_name, facet.previous_selector_count, facet.planned_selector_count
    );

    let _ = writeln!(out, "  Diamond impact:");
    if facet.has_surface_changes() {
        for s in &facet.selectors_added {
            let _ = writeln!(out, "    + {}", s.label());
        }
        for s in &facet.selectors_removed {
            let _ = writeln!(out, "    - {}", s.label());
        }
        for s in &facet.modified_direct {
            let _ = writeln!(out, "    ~ {} (direct)", s.label());
        }
        for s in &facet.modified_indirect {
            let _ = writeln!(out, "    ~ {} (indirect)", s.label());
        }
    } else {
        let _ = writeln!(out, "    (none)");
    }

    let _ = writeln!(out, "  Source changes:");
    let mut any = false;
    for (sign, list) in [
        ('+', &facet.routines_added),
        ('-', &facet.routines_removed),
        ('~', &facet.routines_modified),
    ] {
        for r in list {
            any = true;
            let _ = writeln!(out, "    {sign} routine {}", routine_label(r));
        }
    }
    for e in &facet.events_added {
        any = true;
        let _ = writeln!(out, "    + event {e}");
    }
    for e in &facet.events_removed {
        any = true;
        let _ = writeln!(out, "    - event {e}");
    }
    if facet.abi_changed {
        any = true;
        let _ = writeln!(out, "    abi changed");
    }
    if facet.bytecode_changed {
        any = true;
        let _ = writeln!(out, "    bytecode changed");
    }
    if !any {
        let _ = writeln!(out, "    (none)");
    }
}

fn routine_label(r: &RoutineChange) -> String {
    format!("{} ({})", r.name, r.visibility)
}
