//! Flow event system for observability.
//!
//! Emits [`FlowEvent`]s via a [`tokio::sync::broadcast`] channel so that
//! loggers, transcripts, or tests can follow a conversation without being
//! wired in as the flow's observer.

use serde::{Deserialize, Serialize};

use scripted_chat_types::StepResult;

/// Why a transition did not happen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockReason {
    /// A `before_proceed` hook returned `false`.
    Validation,
    /// No values were captured for the step.
    EmptyValues,
}

/// Events emitted while a flow is driven.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum FlowEvent {
    StepCommitted {
        from: String,
        to: String,
        values: Vec<Option<String>>,
    },
    TransitionBlocked {
        step: String,
        reason: BlockReason,
    },
    FlowEnded {
        results: Vec<StepResult>,
    },
    FlowReset,
    VariableSet {
        key: String,
    },
}

/// Event emitter wrapping a broadcast sender.
#[derive(Clone)]
pub struct EventEmitter {
    sender: tokio::sync::broadcast::Sender<FlowEvent>,
}

impl EventEmitter {
    /// Create a new emitter with the given channel capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = tokio::sync::broadcast::channel(capacity);
        Self { sender }
    }

    /// Emit an event to all current subscribers.
    ///
    /// If there are no active receivers the event is silently dropped.
    pub fn emit(&self, event: FlowEvent) {
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<FlowEvent> {
        self.sender.subscribe()
    }
}

impl Default for EventEmitter {
    fn default() -> Self {
        Self::new(256)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn emitter_sends_and_receives() {
        let emitter = EventEmitter::new(16);
        let mut rx = emitter.subscribe();

        emitter.emit(FlowEvent::StepCommitted {
            from: "start".into(),
            to: "q1".into(),
            values: vec![Some("hello".into())],
        });

        match rx.recv().await.unwrap() {
            FlowEvent::StepCommitted { from, to, values } => {
                assert_eq!(from, "start");
                assert_eq!(to, "q1");
                assert_eq!(values, vec![Some("hello".to_string())]);
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[test]
    fn emit_with_no_subscribers_does_not_panic() {
        let emitter = EventEmitter::new(4);
        emitter.emit(FlowEvent::FlowReset);
    }

    #[test]
    fn blocked_event_serializes_reason_in_snake_case() {
        let event = FlowEvent::TransitionBlocked {
            step: "email".into(),
            reason: BlockReason::EmptyValues,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["TransitionBlocked"]["reason"], "empty_values");
        assert_eq!(json["TransitionBlocked"]["step"], "email");
    }
}
