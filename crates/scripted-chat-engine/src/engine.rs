//! Flow engine: the step-transition loop.
//!
//! The engine owns the script, the cursor, the accumulated results, and the
//! custom variables. Rendering is delegated to a [`FlowObserver`]; the engine
//! performs no I/O of its own.
//!
//! `proceed` and `reset` take `&mut self`, so a single engine can never have
//! two transitions in flight. Hooks run one at a time and are awaited without
//! a timeout; a hook that never settles stalls the flow.

use std::collections::HashMap;
use std::sync::Arc;

use scripted_chat_types::{Result, ScriptError, StepResult, Variables};

use crate::events::{BlockReason, EventEmitter, FlowEvent};
use crate::hook::{
    AfterProceed, BeforeProceed, DynAfterProceed, DynBeforeProceed, ProceedEvent,
};
use crate::observer::{FlowObserver, NoopObserver};
use crate::script::{Script, Step};
use crate::substitution::substitute;
use crate::validation::validate_or_raise;

// ---------------------------------------------------------------------------
// Public types
// ---------------------------------------------------------------------------

/// Configuration for a flow.
pub struct FlowConfig {
    pub script: Script,
    pub custom_variables: HashMap<String, String>,
    /// Flow-level validation, replaced by a step's own hook when it has one.
    pub before_proceed: Option<DynBeforeProceed>,
    /// Flow-level post-transition hook, run before the left step's own hook.
    pub after_proceed: Option<DynAfterProceed>,
    pub observer: Arc<dyn FlowObserver>,
    pub events: EventEmitter,
    /// Refuse scripts with `Error`-severity lint diagnostics.
    pub strict: bool,
}

impl FlowConfig {
    pub fn new(script: Script) -> Self {
        Self {
            script,
            custom_variables: HashMap::new(),
            before_proceed: None,
            after_proceed: None,
            observer: Arc::new(NoopObserver),
            events: EventEmitter::default(),
            strict: false,
        }
    }

    pub fn with_variable(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.custom_variables.insert(key.into(), value.into());
        self
    }

    pub fn with_variables(mut self, variables: HashMap<String, String>) -> Self {
        self.custom_variables.extend(variables);
        self
    }

    pub fn with_before_proceed(mut self, hook: impl BeforeProceed + 'static) -> Self {
        self.before_proceed = Some(DynBeforeProceed::new(hook));
        self
    }

    pub fn with_after_proceed(mut self, hook: impl AfterProceed + 'static) -> Self {
        self.after_proceed = Some(DynAfterProceed::new(hook));
        self
    }

    pub fn with_observer(mut self, observer: Arc<dyn FlowObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn with_events(mut self, events: EventEmitter) -> Self {
        self.events = events;
        self
    }

    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }
}

/// Outcome of a call to [`FlowEngine::proceed`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    /// Moved to a non-terminal step.
    Advanced { to: String },
    /// Moved to the terminal step.
    Ended,
    /// Nothing changed; the caller may prompt again.
    Blocked(BlockReason),
}

/// Drives a script forward one step at a time.
pub struct FlowEngine {
    script: Script,
    cursor: usize,
    results: Vec<StepResult>,
    variables: Variables,
    before_proceed: Option<DynBeforeProceed>,
    after_proceed: Option<DynAfterProceed>,
    observer: Arc<dyn FlowObserver>,
    events: EventEmitter,
}

// ---------------------------------------------------------------------------
// FlowEngine
// ---------------------------------------------------------------------------

impl FlowEngine {
    pub fn new(config: FlowConfig) -> Result<Self> {
        if config.strict {
            validate_or_raise(&config.script)?;
        }

        let cursor = config.script.entry_position();
        tracing::debug!(
            entry = %config.script.step_at(cursor).id,
            steps = config.script.len(),
            "Flow created"
        );

        Ok(Self {
            script: config.script,
            cursor,
            results: Vec::new(),
            variables: Variables::from_map(config.custom_variables),
            before_proceed: config.before_proceed,
            after_proceed: config.after_proceed,
            observer: config.observer,
            events: config.events,
        })
    }

    /// Look up a step by id. An unknown id is a script authoring error.
    pub fn get_step(&self, id: &str) -> Result<&Step> {
        tracing::debug!(id, "Step lookup");
        self.script.step(id)
    }

    /// The step the current step continues to. At the terminal step this is
    /// whatever `end` declares as its next; only `proceed` refuses to move.
    pub fn get_next_step(&self) -> Result<&Step> {
        let current = self.current_step();
        let next = current
            .next
            .as_deref()
            .ok_or_else(|| ScriptError::MissingNext {
                id: current.id.clone(),
            })?;
        self.get_step(next)
    }

    fn set_step(&mut self, id: &str) -> Result<&Step> {
        self.cursor = self.script.position(id)?;
        Ok(self.script.step_at(self.cursor))
    }

    pub fn current_step(&self) -> &Step {
        self.script.step_at(self.cursor)
    }

    pub fn entry_step(&self) -> &Step {
        self.script.entry_step()
    }

    pub fn results(&self) -> &[StepResult] {
        &self.results
    }

    pub fn script(&self) -> &Script {
        &self.script
    }

    pub fn is_ended(&self) -> bool {
        self.current_step().is_terminal()
    }

    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<FlowEvent> {
        self.events.subscribe()
    }

    /// Replace placeholders in `template` using the results so far and the
    /// current custom variables.
    pub async fn substitute(&self, template: &str) -> String {
        let variables = self.variables.snapshot().await;
        substitute(template, &self.results, &variables)
    }

    pub async fn set_custom_variable(&self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        self.variables.set(key.clone(), value).await;
        self.events.emit(FlowEvent::VariableSet { key });
    }

    pub async fn custom_variable(&self, key: &str) -> Option<String> {
        self.variables.get(key).await
    }

    /// Announce the current step to the observer: its substituted message,
    /// then `on_continue` (or `on_end` at the terminal step). Returns the
    /// message.
    pub async fn start(&self) -> String {
        let step = self.current_step();
        let message = self.substitute(&step.message).await;
        self.observer.on_new_step_message(&message);
        if step.is_terminal() {
            self.observer.on_end();
        } else {
            self.observer.on_continue(step);
        }
        message
    }

    /// Submit values for the current step and advance when allowed.
    ///
    /// Runs the step's `before_proceed` hook, or the flow-level one when the
    /// step has none. The transition is blocked when validation fails or no
    /// values were given; nothing is recorded or notified in that case.
    /// Otherwise the result is recorded, the cursor moves, the observer is
    /// notified, and the flow-level then the left step's `after_proceed` hooks
    /// run in turn.
    ///
    /// Hook errors propagate unchanged. Calling this at the terminal step
    /// fails with [`ScriptError::FlowEnded`].
    pub async fn proceed(&mut self, values: Vec<Option<String>>) -> Result<Transition> {
        let current = self.current_step();
        if current.is_terminal() {
            return Err(ScriptError::FlowEnded {
                id: current.id.clone(),
            });
        }

        let result = StepResult::new(current.id.clone(), values);
        let next_step = self.get_next_step()?;

        let hook = current
            .before_proceed
            .as_ref()
            .or(self.before_proceed.as_ref());
        let valid = match hook {
            Some(hook) => {
                tracing::debug!(step = %current.id, hook = hook.name(), "Running before_proceed");
                let event = ProceedEvent {
                    result: &result,
                    current_step: current,
                    next_step: Some(next_step),
                    results: &self.results,
                    variables: &self.variables,
                    events: &self.events,
                };
                hook.before_proceed(&event).await?
            }
            None => true,
        };

        let blocked = if !valid {
            Some(BlockReason::Validation)
        } else if result.values.is_empty() {
            Some(BlockReason::EmptyValues)
        } else {
            None
        };
        if let Some(reason) = blocked {
            tracing::debug!(step = %current.id, ?reason, "Transition blocked");
            self.events.emit(FlowEvent::TransitionBlocked {
                step: current.id.clone(),
                reason,
            });
            return Ok(Transition::Blocked(reason));
        }

        // Commit
        let from = current.id.clone();
        let next_id = next_step.id.clone();
        let left_after_proceed = current.after_proceed.clone();

        self.results.push(result.clone());
        self.observer.on_new_user_message(&result.values);
        self.set_step(&next_id)?;
        tracing::info!(from = %from, to = %next_id, "Step committed");
        self.events.emit(FlowEvent::StepCommitted {
            from,
            to: next_id.clone(),
            values: result.values.clone(),
        });

        let entered = self.current_step();
        let message = self.substitute(&entered.message).await;
        self.observer.on_new_step_message(&message);

        let ended = entered.is_terminal();
        if ended {
            tracing::info!(results = self.results.len(), "Flow ended");
            self.observer.on_end();
            self.events.emit(FlowEvent::FlowEnded {
                results: self.results.clone(),
            });
        } else {
            self.observer.on_continue(entered);
        }

        let following = if ended {
            None
        } else {
            Some(self.get_next_step()?)
        };
        let event = ProceedEvent {
            result: &result,
            current_step: entered,
            next_step: following,
            results: &self.results,
            variables: &self.variables,
            events: &self.events,
        };
        if let Some(hook) = &self.after_proceed {
            tracing::debug!(step = %entered.id, hook = hook.name(), "Running flow after_proceed");
            hook.after_proceed(&event).await?;
        }
        if let Some(hook) = &left_after_proceed {
            tracing::debug!(step = %entered.id, hook = hook.name(), "Running step after_proceed");
            hook.after_proceed(&event).await?;
        }

        Ok(if ended {
            Transition::Ended
        } else {
            Transition::Advanced { to: next_id }
        })
    }

    /// Return to the entry step and forget all results. Custom variables
    /// are kept.
    pub fn reset(&mut self) {
        self.cursor = self.script.entry_position();
        self.results.clear();
        tracing::info!(entry = %self.current_step().id, "Flow reset");
        self.events.emit(FlowEvent::FlowReset);
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
