//! Placeholder substitution for step messages.
//!
//! Messages may reference earlier answers with `{{step}}` (all values joined
//! with `", "`) or `{{step.N}}` (the N-th value, zero-based), and custom
//! variables with `{{name}}`.

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::{Captures, Regex};

use scripted_chat_types::StepResult;

static PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{\{([^{}]+)\}\}").expect("placeholder pattern compiles"));

/// Replace placeholders in `template`.
///
/// Each placeholder resolves against step results first and custom variables
/// second. Inserted text is never rescanned. Placeholders that resolve to
/// nothing are left verbatim.
pub fn substitute(
    template: &str,
    results: &[StepResult],
    variables: &HashMap<String, String>,
) -> String {
    PLACEHOLDER
        .replace_all(template, |caps: &Captures<'_>| {
            let key = &caps[1];
            resolve_step(key, results)
                .or_else(|| variables.get(key).cloned())
                .unwrap_or_else(|| caps[0].to_string())
        })
        .into_owned()
}

/// Names referenced by placeholders in `template`, in order of appearance.
pub fn placeholders(template: &str) -> Vec<&str> {
    PLACEHOLDER
        .captures_iter(template)
        .filter_map(|caps| caps.get(1).map(|m| m.as_str()))
        .collect()
}

/// Split `step.N` into its step id and index.
pub fn split_indexed(key: &str) -> Option<(&str, usize)> {
    let (step, index) = key.rsplit_once('.')?;
    Some((step, index.parse().ok()?))
}

fn resolve_step(key: &str, results: &[StepResult]) -> Option<String> {
    let joined: Vec<String> = results
        .iter()
        .filter(|r| r.step == key)
        .map(StepResult::joined)
        .collect();
    if !joined.is_empty() {
        return Some(joined.join(", "));
    }

    // Each visit is indexed on its own; the first one with a value at N wins.
    let (step, index) = split_indexed(key)?;
    results
        .iter()
        .filter(|r| r.step == step)
        .find_map(|r| r.value(index))
        .map(String::from)
}
