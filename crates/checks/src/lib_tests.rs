use serde_json::json;

use super::*;

#[test]
fn empty_checklist_passes_vacuously() {
    let outcome = CheckRegistry::new().evaluate(&[], &CheckContext::default());
    assert!(outcome.passed);
    assert!(outcome.results.is_empty());
}

#[test]
fn unrecognized_kind_fails_with_message_not_panic() {
    let checks = vec![Check::new("made_up_kind", Map::new())];
    let outcome = CheckRegistry::new().evaluate(&checks, &CheckContext::default());
    assert!(!outcome.passed);
    assert_eq!(outcome.results.len(), 1);
    assert!(outcome.results[0].message.as_deref().unwrap().contains("made_up_kind"));
}

#[test]
fn all_checks_must_pass() {
    let ctx = CheckContext { step_output: "SUCCESS".into(), ..Default::default() };
    let checks = vec![
        Check::new("contains", map_params(&[("text", json!("SUCCESS"))])),
        Check::new("not_contains", map_params(&[("text", json!("FAILURE"))])),
    ];
    let outcome = CheckRegistry::new().evaluate(&checks, &ctx);
    assert!(outcome.passed);
    assert_eq!(outcome.results.len(), 2);
}

#[test]
fn one_failing_check_fails_the_whole_outcome() {
    let ctx = CheckContext { step_output: "SUCCESS".into(), ..Default::default() };
    let checks = vec![
        Check::new("contains", map_params(&[("text", json!("SUCCESS"))])),
        Check::new("contains", map_params(&[("text", json!("nope"))])),
    ];
    let outcome = CheckRegistry::new().evaluate(&checks, &ctx);
    assert!(!outcome.passed);
}

#[test]
fn register_adds_a_custom_kind_at_runtime() {
    let mut registry = CheckRegistry::new();
    registry.register("always_fails", |check, _ctx| CheckResult {
        kind: check.kind.clone(),
        passed: false,
        message: Some("nope".into()),
    });
    let outcome = registry.evaluate(&[Check::new("always_fails", Map::new())], &CheckContext::default());
    assert!(!outcome.passed);
    assert_eq!(outcome.results[0].message.as_deref(), Some("nope"));
}

fn map_params(pairs: &[(&str, Value)]) -> Map<String, Value> {
    pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
}
