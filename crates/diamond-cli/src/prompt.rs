//! Interactive confirmation for production cuts

use diamond_cut::Confirmation;
use diamond_diff::DiffReport;
use dialoguer::Confirm;

/// Prints the diff summary and asks on the terminal
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct TerminalConfirmation;

impl Confirmation for TerminalConfirmation {
    fn confirm(&self, report: &DiffReport) -> std::io::Result<bool> {
        eprintln!("{}", report.summary);
        if !report.unplanned_changes.is_empty() {
            eprintln!(
                "{} facet(s) changed in the working tree but are not in the plan",
                report.unplanned_changes.len()
            );
        }
        Confirm::new()
            .with_prompt(format!(
                "Apply this cut to {} on {}?",
                report.diamond, report.network
            ))
            .default(false)
            .interact()
            .map_err(std::io::Error::other)
    }
}
