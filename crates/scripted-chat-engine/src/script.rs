use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use scripted_chat_types::{Result, ScriptError};

use crate::hook::{AfterProceed, BeforeProceed, DynAfterProceed, DynBeforeProceed};

/// Reserved id of the preferred entry step.
pub const START_STEP: &str = "start";

/// Reserved id of the terminal step.
pub const END_STEP: &str = "end";

/// Kind of input field a step asks the user for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InputKind {
    Text,
    Email,
}

/// A single scripted step. Steps with no `input` are choice-only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Step {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input: Option<InputKind>,
    pub message: String,
    #[serde(skip)]
    pub before_proceed: Option<DynBeforeProceed>,
    #[serde(skip)]
    pub after_proceed: Option<DynAfterProceed>,
}

impl Step {
    pub fn new(id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            next: None,
            input: None,
            message: message.into(),
            before_proceed: None,
            after_proceed: None,
        }
    }

    pub fn with_next(mut self, next: impl Into<String>) -> Self {
        self.next = Some(next.into());
        self
    }

    pub fn with_input(mut self, input: InputKind) -> Self {
        self.input = Some(input);
        self
    }

    /// Validation hook that replaces the flow-level one for this step.
    pub fn with_before_proceed(mut self, hook: impl BeforeProceed + 'static) -> Self {
        self.before_proceed = Some(DynBeforeProceed::new(hook));
        self
    }

    /// Hook run after leaving this step, following the flow-level one.
    pub fn with_after_proceed(mut self, hook: impl AfterProceed + 'static) -> Self {
        self.after_proceed = Some(DynAfterProceed::new(hook));
        self
    }

    /// The `end` step has no outgoing transition.
    pub fn is_terminal(&self) -> bool {
        self.id == END_STEP
    }
}

/// Ordered collection of steps, unique by id. Read-only once built.
#[derive(Debug, Clone)]
pub struct Script {
    steps: Vec<Step>,
    index: HashMap<String, usize>,
    entry: usize,
}

impl Script {
    /// Build a script. The entry step is `start` when present, otherwise the
    /// first step.
    pub fn new(steps: Vec<Step>) -> Result<Self> {
        if steps.is_empty() {
            return Err(ScriptError::EmptyScript);
        }

        let mut index = HashMap::with_capacity(steps.len());
        for (pos, step) in steps.iter().enumerate() {
            if index.insert(step.id.clone(), pos).is_some() {
                return Err(ScriptError::DuplicateStep {
                    id: step.id.clone(),
                });
            }
        }

        let entry = index.get(START_STEP).copied().unwrap_or(0);

        Ok(Self {
            steps,
            index,
            entry,
        })
    }

    /// Look up a step by id.
    pub fn step(&self, id: &str) -> Result<&Step> {
        self.position(id).map(|pos| &self.steps[pos])
    }

    pub(crate) fn position(&self, id: &str) -> Result<usize> {
        self.index
            .get(id)
            .copied()
            .ok_or_else(|| ScriptError::UnknownStep { id: id.to_string() })
    }

    pub(crate) fn step_at(&self, pos: usize) -> &Step {
        &self.steps[pos]
    }

    pub(crate) fn entry_position(&self) -> usize {
        self.entry
    }

    pub fn entry_step(&self) -> &Step {
        &self.steps[self.entry]
    }

    /// Find the terminal step, if the script declares one.
    pub fn terminal_step(&self) -> Option<&Step> {
        self.step(END_STEP).ok()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn linear_script() -> Script {
        Script::new(vec![
            Step::new("start", "Hi").with_next("q1").with_input(InputKind::Text),
            Step::new("q1", "You said {{start}}")
                .with_next("end")
                .with_input(InputKind::Text),
            Step::new("end", "Bye").with_next("end"),
        ])
        .unwrap()
    }

    #[test]
    fn entry_is_explicit_start() {
        let script = Script::new(vec![
            Step::new("intro", "Welcome").with_next("start"),
            Step::new("start", "Hi").with_next("end"),
            Step::new("end", "Bye"),
        ])
        .unwrap();
        assert_eq!(script.entry_step().id, "start");
    }

    #[test]
    fn entry_falls_back_to_first_step() {
        let script = Script::new(vec![
            Step::new("greet", "Hello").with_next("end"),
            Step::new("end", "Bye"),
        ])
        .unwrap();
        assert_eq!(script.entry_step().id, "greet");
    }

    #[test]
    fn lookup_unknown_step_fails() {
        let script = linear_script();
        let err = script.step("missing").unwrap_err();
        assert!(matches!(err, ScriptError::UnknownStep { ref id } if id == "missing"));
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        let err = Script::new(vec![
            Step::new("start", "a").with_next("end"),
            Step::new("start", "b").with_next("end"),
        ])
        .unwrap_err();
        assert!(matches!(err, ScriptError::DuplicateStep { ref id } if id == "start"));
    }

    #[test]
    fn empty_script_is_rejected() {
        assert!(matches!(
            Script::new(Vec::new()).unwrap_err(),
            ScriptError::EmptyScript
        ));
    }

    #[test]
    fn terminal_step_is_end() {
        let script = linear_script();
        let end = script.terminal_step().unwrap();
        assert!(end.is_terminal());
        assert!(!script.entry_step().is_terminal());
        assert_eq!(script.len(), 3);
        assert!(script.contains("q1"));
    }

    #[test]
    fn step_deserializes_from_json() {
        let json = r#"{"id": "email", "next": "end", "input": "email", "message": "Your email?"}"#;
        let step: Step = serde_json::from_str(json).unwrap();
        assert_eq!(step.id, "email");
        assert_eq!(step.next.as_deref(), Some("end"));
        assert_eq!(step.input, Some(InputKind::Email));
        assert!(step.before_proceed.is_none());
    }

    #[test]
    fn choice_step_has_no_input() {
        let json = r#"{"id": "pick", "next": "end", "message": "Pick one"}"#;
        let step: Step = serde_json::from_str(json).unwrap();
        assert!(step.input.is_none());
    }
}
