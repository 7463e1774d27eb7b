//! Script validation: lint rules and diagnostics.
//!
//! The engine resolves steps lazily, so a malformed script only fails once the
//! flow reaches the broken link. Call [`validate`] to find those problems up
//! front, or [`validate_or_raise`] to fail on the first `Error`-severity issue.

use std::collections::HashSet;

use scripted_chat_types::{Result, ScriptError};

use crate::script::{Script, Step, END_STEP, START_STEP};
use crate::substitution::{placeholders, split_indexed};

// ---------------------------------------------------------------------------
// Diagnostic types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub rule: String,
    pub severity: Severity,
    pub message: String,
    pub step_id: Option<String>,
    pub fix: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Error,
    Warning,
    Info,
}

// ---------------------------------------------------------------------------
// LintRule trait
// ---------------------------------------------------------------------------

pub trait LintRule: Send + Sync {
    fn name(&self) -> &str;
    fn apply(&self, script: &Script) -> Vec<Diagnostic>;
}

// ---------------------------------------------------------------------------
// Chain walk
// ---------------------------------------------------------------------------

/// Steps visited when following `next` from the entry step, in order.
///
/// The walk stops at the terminal step, at a missing or dangling `next`, or
/// when a step would be visited twice. `revisit` holds the step that closed
/// the loop, if any.
struct Chain<'a> {
    steps: Vec<&'a Step>,
    revisit: Option<&'a Step>,
}

fn walk_chain(script: &Script) -> Chain<'_> {
    let mut steps = Vec::new();
    let mut seen = HashSet::new();
    let mut current = Some(script.entry_step());

    while let Some(step) = current {
        if !seen.insert(step.id.as_str()) {
            return Chain {
                steps,
                revisit: Some(step),
            };
        }
        steps.push(step);
        if step.is_terminal() {
            break;
        }
        current = step.next.as_deref().and_then(|next| script.step(next).ok());
    }

    Chain {
        steps,
        revisit: None,
    }
}

// ---------------------------------------------------------------------------
// Rules
// ---------------------------------------------------------------------------

struct EntryStepRule;
impl LintRule for EntryStepRule {
    fn name(&self) -> &str { "entry_step" }
    fn apply(&self, script: &Script) -> Vec<Diagnostic> {
        if script.contains(START_STEP) {
            return vec![];
        }
        let entry = &script.entry_step().id;
        vec![Diagnostic {
            rule: self.name().into(),
            severity: Severity::Warning,
            message: format!("Script has no '{START_STEP}' step; '{entry}' is used as the entry"),
            step_id: Some(entry.clone()),
            fix: Some(format!("Rename the first step to '{START_STEP}'")),
        }]
    }
}

struct TerminalStepRule;
impl LintRule for TerminalStepRule {
    fn name(&self) -> &str { "terminal_step" }
    fn apply(&self, script: &Script) -> Vec<Diagnostic> {
        if script.terminal_step().is_some() {
            return vec![];
        }
        vec![Diagnostic {
            rule: self.name().into(),
            severity: Severity::Error,
            message: format!("Script has no '{END_STEP}' step; the flow can never finish"),
            step_id: None,
            fix: Some(format!("Add a step with id '{END_STEP}'")),
        }]
    }
}

struct NextTargetExistsRule;
impl LintRule for NextTargetExistsRule {
    fn name(&self) -> &str { "next_target_exists" }
    fn apply(&self, script: &Script) -> Vec<Diagnostic> {
        script
            .steps()
            .iter()
            .filter(|s| !s.is_terminal())
            .filter_map(|s| {
                let next = s.next.as_deref()?;
                if script.contains(next) {
                    return None;
                }
                Some(Diagnostic {
                    rule: self.name().into(),
                    severity: Severity::Error,
                    message: format!("Step '{}' continues to unknown step '{next}'", s.id),
                    step_id: Some(s.id.clone()),
                    fix: Some(format!("Add step '{next}' or fix the next of '{}'", s.id)),
                })
            })
            .collect()
    }
}

struct MissingNextRule;
impl LintRule for MissingNextRule {
    fn name(&self) -> &str { "missing_next" }
    fn apply(&self, script: &Script) -> Vec<Diagnostic> {
        script
            .steps()
            .iter()
            .filter(|s| !s.is_terminal() && s.next.is_none())
            .map(|s| Diagnostic {
                rule: self.name().into(),
                severity: Severity::Error,
                message: format!("Step '{}' has no next step", s.id),
                step_id: Some(s.id.clone()),
                fix: Some(format!("Set next on '{}'", s.id)),
            })
            .collect()
    }
}

struct LinearChainRule;
impl LintRule for LinearChainRule {
    fn name(&self) -> &str { "linear_chain" }
    fn apply(&self, script: &Script) -> Vec<Diagnostic> {
        let chain = walk_chain(script);
        match chain.revisit {
            Some(step) => vec![Diagnostic {
                rule: self.name().into(),
                severity: Severity::Error,
                message: format!(
                    "Step '{}' is visited twice before reaching '{END_STEP}'",
                    step.id
                ),
                step_id: Some(step.id.clone()),
                fix: Some("Break the loop so the chain ends at the terminal step".into()),
            }],
            None => vec![],
        }
    }
}

struct ReachabilityRule;
impl LintRule for ReachabilityRule {
    fn name(&self) -> &str { "reachability" }
    fn apply(&self, script: &Script) -> Vec<Diagnostic> {
        let chain = walk_chain(script);
        let visited: HashSet<&str> = chain.steps.iter().map(|s| s.id.as_str()).collect();
        script
            .steps()
            .iter()
            .filter(|s| !visited.contains(s.id.as_str()))
            .map(|s| Diagnostic {
                rule: self.name().into(),
                severity: Severity::Warning,
                message: format!("Step '{}' is not reachable from the entry step", s.id),
                step_id: Some(s.id.clone()),
                fix: Some(format!("Point a next at '{}' or remove it", s.id)),
            })
            .collect()
    }
}

struct PlaceholderReferenceRule;
impl LintRule for PlaceholderReferenceRule {
    fn name(&self) -> &str { "placeholder_reference" }
    fn apply(&self, script: &Script) -> Vec<Diagnostic> {
        let chain = walk_chain(script);
        let mut answered: HashSet<&str> = HashSet::new();
        let mut diags = Vec::new();

        for step in &chain.steps {
            for name in placeholders(&step.message) {
                let referenced = split_indexed(name)
                    .filter(|(id, _)| script.contains(id))
                    .map(|(id, _)| id)
                    .unwrap_or(name);
                if answered.contains(referenced) {
                    continue;
                }
                diags.push(Diagnostic {
                    rule: self.name().into(),
                    severity: Severity::Info,
                    message: format!(
                        "Step '{}' references '{{{{{name}}}}}', which is not answered earlier; it must come from a custom variable",
                        step.id
                    ),
                    step_id: Some(step.id.clone()),
                    fix: None,
                });
            }
            answered.insert(step.id.as_str());
        }
        diags
    }
}

/// Run all built-in lint rules and return diagnostics.
pub fn validate(script: &Script) -> Vec<Diagnostic> {
    let rules: Vec<Box<dyn LintRule>> = vec![
        Box::new(EntryStepRule),
        Box::new(TerminalStepRule),
        Box::new(NextTargetExistsRule),
        Box::new(MissingNextRule),
        Box::new(LinearChainRule),
        Box::new(ReachabilityRule),
        Box::new(PlaceholderReferenceRule),
    ];

    let mut diagnostics = Vec::new();
    for rule in &rules {
        diagnostics.extend(rule.apply(script));
    }
    diagnostics
}

/// Run all lint rules; return `Err` if any `Error`-severity diagnostic found.
pub fn validate_or_raise(script: &Script) -> Result<Vec<Diagnostic>> {
    let diagnostics = validate(script);
    let errors: Vec<_> = diagnostics
        .iter()
        .filter(|d| d.severity == Severity::Error)
        .map(|d| d.message.clone())
        .collect();
    if !errors.is_empty() {
        return Err(ScriptError::Validation(errors.join("; ")));
    }
    Ok(diagnostics)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
