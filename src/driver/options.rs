use crate::diagnostics::DiagnosticKind;
use crate::rules::RuleFilter;
use serde::Deserialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

pub const DEFAULT_MAX_ITERATIONS: usize = 10;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Verbosity {
    /// Warnings only.
    Quiet,
    #[default]
    Normal,
    /// Also sites skipped for unresolved types.
    Verbose,
}

impl Verbosity {
    pub fn reports(self, kind: DiagnosticKind) -> bool {
        match kind {
            DiagnosticKind::SuspectMatch | DiagnosticKind::RewriteCycleDetected => true,
            DiagnosticKind::AmbiguousMatch => self >= Verbosity::Normal,
            DiagnosticKind::TypeResolutionFailure => self == Verbosity::Verbose,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DriverOptions {
    /// Upper bound on rewrite passes over a unit.
    pub max_iterations: usize,
    pub filter: RuleFilter,
    pub verbosity: Verbosity,
}

impl Default for DriverOptions {
    fn default() -> Self {
        Self {
            max_iterations: DEFAULT_MAX_ITERATIONS,
            filter: RuleFilter::default(),
            verbosity: Verbosity::default(),
        }
    }
}

/// Cooperative cancellation, checked between sites and between passes.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verbosity_gates_informational_kinds() {
        assert!(!Verbosity::Quiet.reports(DiagnosticKind::AmbiguousMatch));
        assert!(Verbosity::Quiet.reports(DiagnosticKind::SuspectMatch));
        assert!(Verbosity::Normal.reports(DiagnosticKind::AmbiguousMatch));
        assert!(!Verbosity::Normal.reports(DiagnosticKind::TypeResolutionFailure));
        assert!(Verbosity::Verbose.reports(DiagnosticKind::TypeResolutionFailure));
    }

    #[test]
    fn cancel_is_shared_between_clones() {
        let token = CancelToken::new();
        let clone = token.clone();
        clone.cancel();
        assert!(token.is_cancelled());
    }
}
