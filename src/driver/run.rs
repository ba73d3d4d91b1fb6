use crate::ast::{AstView, NodeId, NodeKind, Range, SyntaxTree};
use crate::diagnostics::{Diagnostic, DiagnosticKind};
use crate::driver::emit::emit_edits;
use crate::driver::errors::DriverError;
use crate::driver::options::{CancelToken, DriverOptions};
use crate::edit::{splice, Edit, EditError};
use crate::matcher::{match_rule, MatchOutcome, RuleMatch};
use crate::rewrite::{graft, instantiate};
use crate::rules::RuleRegistry;
use crate::template::Rule;
use std::collections::BTreeSet;

/// What running the registry over one unit produced.
#[derive(Debug, Clone, Default)]
pub struct UnitOutcome {
    pub edits: Vec<Edit>,
    pub diagnostics: Vec<Diagnostic>,
    /// Passes performed, the last one included.
    pub passes: usize,
    /// A pass ended without rewrites before the cap was hit.
    pub converged: bool,
}

impl UnitOutcome {
    pub fn is_unchanged(&self) -> bool {
        self.edits.is_empty()
    }

    /// The unit's source with every edit applied.
    pub fn render(&self, source: &str) -> Result<String, EditError> {
        splice(source, &self.edits)
    }
}

/// Applies a rule registry to compilation units.
///
/// The driver holds no per-unit state, so one instance can serve units on
/// several threads.
#[derive(Debug, Clone)]
pub struct Driver {
    registry: RuleRegistry,
    options: DriverOptions,
}

impl Driver {
    pub fn new(registry: &RuleRegistry, options: DriverOptions) -> Self {
        let registry = if options.filter.is_empty() {
            registry.clone()
        } else {
            registry.filtered(&options.filter)
        };
        Self { registry, options }
    }

    pub fn registry(&self) -> &RuleRegistry {
        &self.registry
    }

    pub fn options(&self) -> &DriverOptions {
        &self.options
    }

    /// Rewrites `tree` to a fixed point and returns the resulting edits.
    pub fn run(
        &self,
        mut tree: SyntaxTree,
        cancel: &CancelToken,
    ) -> Result<UnitOutcome, DriverError> {
        let mut sink = Sink::new(&self.options);
        let mut outcome = UnitOutcome::default();
        while outcome.passes < self.options.max_iterations {
            if cancel.is_cancelled() {
                return Err(cancelled(&tree));
            }
            let rewrites = self.pass(&mut tree, cancel, &mut sink)?;
            outcome.passes += 1;
            tracing::debug!(
                file = %tree.path().display(),
                pass = outcome.passes,
                rewrites,
                "pass finished"
            );
            if rewrites == 0 {
                outcome.converged = true;
                break;
            }
        }
        if !outcome.converged {
            tracing::warn!(
                file = %tree.path().display(),
                passes = outcome.passes,
                "rewriting did not reach a fixed point"
            );
            sink.report(Diagnostic::new(
                DiagnosticKind::RewriteCycleDetected,
                tree.path(),
                None,
                format!(
                    "still rewriting after {} passes; emitting the last state",
                    outcome.passes
                ),
            ));
        }
        outcome.edits = emit_edits(&tree);
        outcome.diagnostics = sink.diagnostics;
        Ok(outcome)
    }

    /// One post-order sweep. A rewritten node blocks its ancestors until the
    /// next pass.
    fn pass(
        &self,
        tree: &mut SyntaxTree,
        cancel: &CancelToken,
        sink: &mut Sink,
    ) -> Result<usize, DriverError> {
        let mut blocked = BTreeSet::new();
        let mut rewrites = 0;
        for node in tree.post_order(tree.root()) {
            if cancel.is_cancelled() {
                return Err(cancelled(tree));
            }
            if blocked.contains(&node) || matches!(tree.kind(node), NodeKind::Parens) {
                continue;
            }
            let Some((rule, found)) = self.select(tree, node, sink) else {
                continue;
            };
            let replacement = match instantiate(&*tree, rule, &found) {
                Ok(replacement) => replacement,
                Err(err) => {
                    tracing::warn!(rule = %rule.name, "{err}");
                    continue;
                }
            };
            tracing::debug!(
                rule = %rule.name,
                file = %tree.path().display(),
                range = ?tree.effective_range(replacement.slot),
                "rewriting"
            );
            let root = graft(tree, &replacement);
            let mut current = tree.parent(root);
            while let Some(ancestor) = current {
                blocked.insert(ancestor);
                current = tree.parent(ancestor);
            }
            rewrites += 1;
        }
        Ok(rewrites)
    }

    /// The first rule in registry order that matches `node`. Suppressed
    /// matches and rules whose own befores disagree are reported.
    fn select<'r>(
        &'r self,
        tree: &SyntaxTree,
        node: NodeId,
        sink: &mut Sink,
    ) -> Option<(&'r Rule, RuleMatch)> {
        let range = tree.effective_range(node);
        let mut chosen: Option<(&'r Rule, RuleMatch)> = None;
        for rule in self.registry.rules_applicable_to(tree.kind(node).tag()) {
            match match_rule(tree, rule, node) {
                MatchOutcome::Matched(found) => {
                    if !found.ambiguous.is_empty() {
                        let others: Vec<String> = found
                            .ambiguous
                            .iter()
                            .map(|idx| format!("#{idx}"))
                            .collect();
                        sink.site(
                            DiagnosticKind::AmbiguousMatch,
                            tree,
                            range,
                            rule,
                            format!(
                                "before-template(s) {} also match with different bindings; using #{}",
                                others.join(", "),
                                found.before
                            ),
                        );
                    }
                    if chosen.is_none() {
                        chosen = Some((rule, found));
                    } else if let Some((first, _)) = &chosen {
                        tracing::debug!(
                            rule = %rule.name,
                            chosen = %first.name,
                            "site already taken by an earlier rule"
                        );
                    }
                }
                MatchOutcome::Suspect { symbols, .. } => {
                    sink.site(
                        DiagnosticKind::SuspectMatch,
                        tree,
                        range,
                        rule,
                        format!(
                            "rewrite suppressed: captured variable(s) {} not effectively final",
                            quoted(&symbols)
                        ),
                    );
                }
                MatchOutcome::Unresolved(reason) => {
                    sink.site(
                        DiagnosticKind::TypeResolutionFailure,
                        tree,
                        range,
                        rule,
                        format!("site skipped: {reason}"),
                    );
                }
                MatchOutcome::NoMatch => {}
            }
        }
        chosen
    }
}

fn cancelled(tree: &SyntaxTree) -> DriverError {
    DriverError::Cancelled {
        file: tree.path().to_path_buf(),
    }
}

fn quoted(names: &[String]) -> String {
    names
        .iter()
        .map(|name| format!("'{name}'"))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Collects diagnostics the verbosity admits, each site and rule once.
struct Sink {
    verbosity: crate::driver::Verbosity,
    seen: BTreeSet<(DiagnosticKind, Option<Range>, Option<String>)>,
    diagnostics: Vec<Diagnostic>,
}

impl Sink {
    fn new(options: &DriverOptions) -> Self {
        Self {
            verbosity: options.verbosity,
            seen: BTreeSet::new(),
            diagnostics: Vec::new(),
        }
    }

    fn site(
        &mut self,
        kind: DiagnosticKind,
        tree: &SyntaxTree,
        range: Option<Range>,
        rule: &Rule,
        message: String,
    ) {
        self.report(Diagnostic::new(kind, tree.path(), range, message).with_rule(&rule.name));
    }

    fn report(&mut self, diagnostic: Diagnostic) {
        if !self.verbosity.reports(diagnostic.kind) {
            return;
        }
        let key = (diagnostic.kind, diagnostic.range, diagnostic.rule.clone());
        if self.seen.insert(key) {
            self.diagnostics.push(diagnostic);
        }
    }
}
