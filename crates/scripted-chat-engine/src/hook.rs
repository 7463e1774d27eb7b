//! Proceed hooks, dynamic dispatch wrappers, and built-in validators.

use std::fmt;
use std::sync::{Arc, LazyLock};

use async_trait::async_trait;

use scripted_chat_types::{Result, StepResult, Variables};

use crate::events::{EventEmitter, FlowEvent};
use crate::script::Step;

// ---------------------------------------------------------------------------
// ProceedEvent
// ---------------------------------------------------------------------------

/// What a hook sees of a transition.
///
/// For `before_proceed`, `current_step` is the step being left and
/// `next_step` the one about to be entered. For `after_proceed`,
/// `current_step` is the step just entered and `next_step` the one after it
/// (`None` once the flow has ended).
pub struct ProceedEvent<'a> {
    pub result: &'a StepResult,
    pub current_step: &'a Step,
    pub next_step: Option<&'a Step>,
    pub results: &'a [StepResult],
    pub(crate) variables: &'a Variables,
    pub(crate) events: &'a EventEmitter,
}

impl ProceedEvent<'_> {
    /// Upsert a custom variable. Messages substituted later in the same
    /// transition already see it.
    pub async fn set_variable(&self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        self.variables.set(key.clone(), value).await;
        self.events.emit(FlowEvent::VariableSet { key });
    }

    pub async fn variable(&self, key: &str) -> Option<String> {
        self.variables.get(key).await
    }
}

// ---------------------------------------------------------------------------
// Hook traits
// ---------------------------------------------------------------------------

#[async_trait]
pub trait BeforeProceed: Send + Sync {
    /// Human-readable name used in logs.
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }

    /// Return `Ok(false)` to block the transition.
    async fn before_proceed(&self, event: &ProceedEvent<'_>) -> Result<bool>;
}

#[async_trait]
pub trait AfterProceed: Send + Sync {
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }

    async fn after_proceed(&self, event: &ProceedEvent<'_>) -> Result<()>;
}

// ---------------------------------------------------------------------------
// Object-safe, cloneable wrappers
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct DynBeforeProceed(Arc<dyn BeforeProceed>);

impl DynBeforeProceed {
    pub fn new(hook: impl BeforeProceed + 'static) -> Self {
        Self(Arc::new(hook))
    }

    pub fn name(&self) -> &str {
        self.0.name()
    }

    pub async fn before_proceed(&self, event: &ProceedEvent<'_>) -> Result<bool> {
        self.0.before_proceed(event).await
    }
}

impl From<Arc<dyn BeforeProceed>> for DynBeforeProceed {
    fn from(hook: Arc<dyn BeforeProceed>) -> Self {
        Self(hook)
    }
}

impl fmt::Debug for DynBeforeProceed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("DynBeforeProceed").field(&self.name()).finish()
    }
}

#[derive(Clone)]
pub struct DynAfterProceed(Arc<dyn AfterProceed>);

impl DynAfterProceed {
    pub fn new(hook: impl AfterProceed + 'static) -> Self {
        Self(Arc::new(hook))
    }

    pub fn name(&self) -> &str {
        self.0.name()
    }

    pub async fn after_proceed(&self, event: &ProceedEvent<'_>) -> Result<()> {
        self.0.after_proceed(event).await
    }
}

impl From<Arc<dyn AfterProceed>> for DynAfterProceed {
    fn from(hook: Arc<dyn AfterProceed>) -> Self {
        Self(hook)
    }
}

impl fmt::Debug for DynAfterProceed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("DynAfterProceed").field(&self.name()).finish()
    }
}

// ---------------------------------------------------------------------------
// Built-in validators
// ---------------------------------------------------------------------------

static EMAIL: LazyLock<regex::Regex> = LazyLock::new(|| {
    regex::Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("email pattern compiles")
});

/// Accepts the transition only when every captured value looks like an
/// email address.
pub struct EmailFormat;

#[async_trait]
impl BeforeProceed for EmailFormat {
    fn name(&self) -> &str {
        "email_format"
    }

    async fn before_proceed(&self, event: &ProceedEvent<'_>) -> Result<bool> {
        Ok(event
            .result
            .values
            .iter()
            .all(|v| v.as_deref().is_some_and(|v| EMAIL.is_match(v.trim()))))
    }
}

/// Rejects missing or blank values.
pub struct RequireAll;

#[async_trait]
impl BeforeProceed for RequireAll {
    fn name(&self) -> &str {
        "require_all"
    }

    async fn before_proceed(&self, event: &ProceedEvent<'_>) -> Result<bool> {
        Ok(event
            .result
            .values
            .iter()
            .all(|v| v.as_deref().is_some_and(|v| !v.trim().is_empty())))
    }
}
