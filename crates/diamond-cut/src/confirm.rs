//! Human confirmation gate
//!
//! Production cuts pause after validation and show the diff to an
//! operator. The prompt is injected so the orchestrator runs headless in
//! tests.

use diamond_diff::DiffReport;

/// Decides whether a validated cut may proceed
#[cfg_attr(test, mockall::automock)]
pub trait Confirmation: Send + Sync {
    /// `Ok(true)` to proceed
    ///
    /// # Errors
    /// Returns error if the operator could not be asked
    fn confirm(&self, report: &DiffReport) -> std::io::Result<bool>;
}

/// Always proceeds (`--yes`)
#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysConfirm;

impl Confirmation for AlwaysConfirm {
    fn confirm(&self, _report: &DiffReport) -> std::io::Result<bool> {
        Ok(true)
    }
}

/// Always declines
#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysDeny;

impl Confirmation for AlwaysDeny {
    fn confirm(&self, _report: &DiffReport) -> std::io::Result<bool> {
        Ok(false)
    }
}
