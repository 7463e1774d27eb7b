//! Notification callbacks: the engine's whole output surface.
//!
//! A caller implements [`FlowObserver`] to render messages and input widgets
//! on whatever surface it owns. The engine calls these in a fixed order during
//! a committed transition and never during a blocked one.

use std::sync::Mutex;

use crate::script::Step;

pub trait FlowObserver: Send + Sync {
    /// The values the user just submitted for the step being left.
    fn on_new_user_message(&self, _values: &[Option<String>]) {}

    /// The substituted message of the step being entered.
    fn on_new_step_message(&self, _message: &str) {}

    /// The flow moved to a non-terminal step.
    fn on_continue(&self, _next_step: &Step) {}

    /// The flow reached the terminal step.
    fn on_end(&self) {}
}

/// Observer that ignores every notification.
pub struct NoopObserver;

impl FlowObserver for NoopObserver {}

// ---------------------------------------------------------------------------
// RecordingObserver
// ---------------------------------------------------------------------------

/// A notification as captured by [`RecordingObserver`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    UserMessage(Vec<Option<String>>),
    StepMessage(String),
    Continue(String),
    End,
}

/// Observer that keeps every notification in call order.
#[derive(Default)]
pub struct RecordingObserver {
    notifications: Mutex<Vec<Notification>>,
}

impl RecordingObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn notifications(&self) -> Vec<Notification> {
        self.lock().clone()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    fn record(&self, notification: Notification) {
        self.lock().push(notification);
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<Notification>> {
        // A poisoned recorder still holds valid notifications.
        self.notifications
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl FlowObserver for RecordingObserver {
    fn on_new_user_message(&self, values: &[Option<String>]) {
        self.record(Notification::UserMessage(values.to_vec()));
    }

    fn on_new_step_message(&self, message: &str) {
        self.record(Notification::StepMessage(message.to_string()));
    }

    fn on_continue(&self, next_step: &Step) {
        self.record(Notification::Continue(next_step.id.clone()));
    }

    fn on_end(&self) {
        self.record(Notification::End);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recording_keeps_call_order() {
        let observer = RecordingObserver::new();
        observer.on_new_user_message(&[Some("hello".into())]);
        observer.on_new_step_message("You said hello");
        observer.on_continue(&Step::new("q1", "You said {{start}}"));
        observer.on_end();

        assert_eq!(
            observer.notifications(),
            vec![
                Notification::UserMessage(vec![Some("hello".into())]),
                Notification::StepMessage("You said hello".into()),
                Notification::Continue("q1".into()),
                Notification::End,
            ]
        );

        observer.clear();
        assert!(observer.notifications().is_empty());
    }

    #[test]
    fn noop_observer_accepts_everything() {
        let observer = NoopObserver;
        observer.on_new_user_message(&[]);
        observer.on_new_step_message("ignored");
        observer.on_end();
    }
}
