//! Shared types, errors, variables, and step results for the scripted chat engine.
//!
//! This crate provides the foundational types used across the other crates:
//! - `ScriptError`: unified error taxonomy
//! - `Variables`: shared, mutable custom variables
//! - `StepResult`: the values recorded when a step is passed

use serde::{Deserialize, Serialize};

/// Unified error type for the scripted chat crates.
#[derive(Debug, thiserror::Error)]
pub enum ScriptError {
    // === Script authoring errors ===
    #[error("Script does not contain step '{id}'")]
    UnknownStep { id: String },

    #[error("Step '{id}' does not declare a next step")]
    MissingNext { id: String },

    #[error("Script contains step '{id}' more than once")]
    DuplicateStep { id: String },

    #[error("Script has no steps")]
    EmptyScript,

    #[error("Script validation failed: {0}")]
    Validation(String),

    // === Runtime errors ===
    #[error("Flow already ended at step '{id}'; reset before proceeding")]
    FlowEnded { id: String },

    #[error("Hook failed on step '{step}': {message}")]
    Hook { step: String, message: String },

    // === Generic ===
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ScriptError {
    /// Returns `true` if the error comes from a malformed script rather than
    /// from a runtime condition. These are never recovered from.
    pub fn is_author_error(&self) -> bool {
        matches!(
            self,
            ScriptError::UnknownStep { .. }
                | ScriptError::MissingNext { .. }
                | ScriptError::DuplicateStep { .. }
                | ScriptError::EmptyScript
                | ScriptError::Validation(_)
        )
    }
}

/// A convenience alias for `Result<T, ScriptError>`.
pub type Result<T> = std::result::Result<T, ScriptError>;

// ---------------------------------------------------------------------------
// Variables: custom variables shared with hooks
// ---------------------------------------------------------------------------

use std::collections::HashMap;
use std::sync::Arc;

/// Custom variables available to message substitution.
///
/// Cloning a `Variables` yields another handle to the **same** inner map, so a
/// hook holding a handle can upsert values the engine sees immediately.
#[derive(Clone, Debug)]
pub struct Variables {
    inner: Arc<tokio::sync::RwLock<HashMap<String, String>>>,
}

impl Variables {
    /// Create an empty set of variables.
    pub fn new() -> Self {
        Self::from_map(HashMap::new())
    }

    /// Seed variables from an existing map.
    pub fn from_map(values: HashMap<String, String>) -> Self {
        Self {
            inner: Arc::new(tokio::sync::RwLock::new(values)),
        }
    }

    /// Insert or overwrite a variable.
    pub async fn set(&self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        tracing::trace!(key = %key, "Custom variable set");
        self.inner.write().await.insert(key, value.into());
    }

    /// Read a variable by name (cloned).
    pub async fn get(&self, key: &str) -> Option<String> {
        self.inner.read().await.get(key).cloned()
    }

    /// Copy of the current variables.
    pub async fn snapshot(&self) -> HashMap<String, String> {
        self.inner.read().await.clone()
    }
}

impl Default for Variables {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// StepResult: values captured when a step is passed
// ---------------------------------------------------------------------------

/// Record produced once per step the user successfully passes through.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepResult {
    pub step: String,
    pub values: Vec<Option<String>>,
}

impl StepResult {
    pub fn new(step: impl Into<String>, values: Vec<Option<String>>) -> Self {
        Self {
            step: step.into(),
            values,
        }
    }

    /// All values joined with `", "`. Missing values render as empty text.
    pub fn joined(&self) -> String {
        self.values
            .iter()
            .map(|v| v.as_deref().unwrap_or(""))
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// The value at `index`, or `None` when it is absent or empty.
    pub fn value(&self, index: usize) -> Option<&str> {
        self.values
            .get(index)
            .and_then(|v| v.as_deref())
            .filter(|v| !v.is_empty())
    }
}
