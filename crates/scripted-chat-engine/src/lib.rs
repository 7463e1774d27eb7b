//! Scripted conversation engine.
//!
//! Walks a linear chain of named steps, recording the values submitted at
//! each one, running validation and follow-up hooks around every transition,
//! and substituting earlier answers and custom variables into later messages.

pub mod engine;
pub mod events;
pub mod hook;
pub mod observer;
pub mod script;
pub mod substitution;
pub mod validation;

pub use engine::{FlowConfig, FlowEngine, Transition};
pub use events::{BlockReason, EventEmitter, FlowEvent};
pub use hook::{
    AfterProceed, BeforeProceed, DynAfterProceed, DynBeforeProceed, EmailFormat, ProceedEvent,
    RequireAll,
};
pub use observer::{FlowObserver, NoopObserver, Notification, RecordingObserver};
pub use script::{InputKind, Script, Step, END_STEP, START_STEP};
pub use substitution::{placeholders, substitute};
pub use validation::{validate, validate_or_raise, Diagnostic, LintRule, Severity};
