//! End-to-end tests for the scripted chat engine.
//!
//! Each test drives a full conversation: build script -> validate -> proceed
//! through the steps -> verify results, notifications, and messages.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use scripted_chat_engine::{
    validate_or_raise, AfterProceed, BlockReason, EmailFormat, FlowConfig, FlowEngine, InputKind,
    Notification, ProceedEvent, RecordingObserver, Script, Step, Transition,
};
use scripted_chat_types::{Result, StepResult};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn values(items: &[&str]) -> Vec<Option<String>> {
    items.iter().map(|v| Some(v.to_string())).collect()
}

fn build(config: FlowConfig) -> (FlowEngine, Arc<RecordingObserver>) {
    let observer = Arc::new(RecordingObserver::new());
    let engine = FlowEngine::new(config.with_observer(observer.clone()))
        .expect("engine should build");
    (engine, observer)
}

fn signup_script() -> Script {
    Script::new(vec![
        Step::new("start", "Hi! What's your name?")
            .with_next("email")
            .with_input(InputKind::Text),
        Step::new("email", "Thanks {{start}}. What's your email?")
            .with_next("topics")
            .with_input(InputKind::Email)
            .with_before_proceed(EmailFormat),
        Step::new("topics", "Which topics interest you at {{company}}?").with_next("end"),
        Step::new(
            "end",
            "All set {{start}}: we'll write to {{email}} about {{topics}} (first: {{topics.0}}).",
        ),
    ])
    .expect("script should build")
}

/// Collects the results each after hook observed, to check commit order.
struct ResultLog(Arc<Mutex<Vec<Vec<StepResult>>>>);

#[async_trait]
impl AfterProceed for ResultLog {
    async fn after_proceed(&self, event: &ProceedEvent<'_>) -> Result<()> {
        self.0.lock().unwrap().push(event.results.to_vec());
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[tokio::test]
async fn two_question_scenario() {
    let script = Script::new(vec![
        Step::new("start", "Hi").with_next("q1").with_input(InputKind::Text),
        Step::new("q1", "You said {{start}}")
            .with_next("end")
            .with_input(InputKind::Text),
        Step::new("end", "Bye").with_next("end"),
    ])
    .unwrap();
    validate_or_raise(&script).expect("scenario script is valid");
    let (mut engine, observer) = build(FlowConfig::new(script));

    let transition = engine.proceed(values(&["hello"])).await.unwrap();

    assert_eq!(transition, Transition::Advanced { to: "q1".into() });
    assert_eq!(engine.results(), &[StepResult::new("start", values(&["hello"]))]);
    assert_eq!(engine.current_step().id, "q1");
    let notes = observer.notifications();
    assert!(notes.contains(&Notification::StepMessage("You said hello".into())));
    assert!(notes.contains(&Notification::Continue("q1".into())));
    assert!(!notes.contains(&Notification::End));
}

#[tokio::test]
async fn full_signup_conversation() {
    let (mut engine, observer) = build(
        FlowConfig::new(signup_script())
            .with_variable("company", "Acme")
            .strict(true),
    );

    assert_eq!(engine.start().await, "Hi! What's your name?");

    assert_eq!(
        engine.proceed(values(&["Ann"])).await.unwrap(),
        Transition::Advanced { to: "email".into() }
    );

    // Invalid email is rejected by the step's own validator.
    assert_eq!(
        engine.proceed(values(&["ann-at-example"])).await.unwrap(),
        Transition::Blocked(BlockReason::Validation)
    );
    assert_eq!(engine.current_step().id, "email");

    assert_eq!(
        engine.proceed(values(&["ann@example.com"])).await.unwrap(),
        Transition::Advanced { to: "topics".into() }
    );
    assert_eq!(
        engine.proceed(values(&["rust", "async"])).await.unwrap(),
        Transition::Ended
    );

    assert!(engine.is_ended());
    let steps: Vec<_> = engine.results().iter().map(|r| r.step.as_str()).collect();
    assert_eq!(steps, vec!["start", "email", "topics"]);

    let messages: Vec<_> = observer
        .notifications()
        .into_iter()
        .filter_map(|n| match n {
            Notification::StepMessage(m) => Some(m),
            _ => None,
        })
        .collect();
    assert_eq!(
        messages,
        vec![
            "Hi! What's your name?".to_string(),
            "Thanks Ann. What's your email?".to_string(),
            "Which topics interest you at Acme?".to_string(),
            "All set Ann: we'll write to ann@example.com about rust, async (first: rust)."
                .to_string(),
        ]
    );
    assert_eq!(observer.notifications().last(), Some(&Notification::End));
}

#[tokio::test]
async fn after_hooks_see_committed_results_in_order() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let (mut engine, _) = build(
        FlowConfig::new(signup_script())
            .with_variable("company", "Acme")
            .with_after_proceed(ResultLog(seen.clone())),
    );

    engine.proceed(values(&["Ann"])).await.unwrap();
    engine.proceed(values(&["ann@example.com"])).await.unwrap();

    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), 2);
    assert_eq!(seen[0], vec![StepResult::new("start", values(&["Ann"]))]);
    assert_eq!(
        seen[1],
        vec![
            StepResult::new("start", values(&["Ann"])),
            StepResult::new("email", values(&["ann@example.com"])),
        ]
    );
}

#[tokio::test]
async fn reset_allows_a_second_run() {
    let (mut engine, _) = build(FlowConfig::new(signup_script()));
    engine.set_custom_variable("company", "Initech").await;

    engine.proceed(values(&["Ann"])).await.unwrap();
    engine.proceed(values(&["ann@example.com"])).await.unwrap();
    engine.reset();

    assert_eq!(engine.current_step().id, "start");
    assert!(engine.results().is_empty());

    engine.proceed(values(&["Bob"])).await.unwrap();
    engine.proceed(values(&["bob@example.com"])).await.unwrap();
    assert_eq!(
        engine.substitute("{{start}} at {{company}}").await,
        "Bob at Initech"
    );
}

#[tokio::test]
async fn unresolved_placeholders_survive() {
    let (engine, _) = build(FlowConfig::new(signup_script()));
    assert_eq!(
        engine.substitute("{{start}} / {{nobody}} / {{start.3}}").await,
        "{{start}} / {{nobody}} / {{start.3}}"
    );
}

#[tokio::test]
async fn choice_step_accepts_missing_entries() {
    let script = Script::new(vec![
        Step::new("start", "Pick up to three").with_next("end"),
        Step::new("end", "Picked {{start}}; second was {{start.1}}"),
    ])
    .unwrap();
    let (mut engine, observer) = build(FlowConfig::new(script));

    engine
        .proceed(vec![Some("red".into()), None, Some("blue".into())])
        .await
        .unwrap();

    assert!(observer
        .notifications()
        .contains(&Notification::StepMessage(
            "Picked red, , blue; second was {{start.1}}".into()
        )));
}
