use super::*;

#[test]
fn pending_step_has_no_timestamps_or_attempts() {
    let step = RunStep::pending("build");
    assert_eq!(step.state, StepState::Pending);
    assert_eq!(step.retry_count, 0);
    assert_eq!(step.attempt_count, 0);
    assert!(step.started_at_ms.is_none());
    assert!(!step.approved);
}

#[test]
fn run_state_terminal_classification() {
    assert!(RunState::Completed.is_terminal());
    assert!(RunState::Failed.is_terminal());
    assert!(RunState::Blocked.is_terminal());
    assert!(RunState::Cancelled.is_terminal());
    assert!(!RunState::Running.is_terminal());
    assert!(!RunState::Queued.is_terminal());
    assert!(!RunState::WaitingApproval.is_terminal());
    assert!(!RunState::WaitingInput.is_terminal());
}

#[test]
fn step_state_ready_for_dependents() {
    assert!(StepState::Completed.is_terminal_ready());
    assert!(StepState::Skipped.is_terminal_ready());
    assert!(!StepState::Failed.is_terminal_ready());
    assert!(!StepState::Active.is_terminal_ready());
}

#[test]
fn run_round_trips_through_json() {
    let mut steps = IndexMap::new();
    steps.insert("a".to_string(), RunStep::pending("a"));
    let run = Run {
        id: 1,
        workflow_id: "demo".to_string(),
        workflow_version: "1.0.0".to_string(),
        state: RunState::Running,
        args: Map::new(),
        steps,
        failure: None,
        created_at_ms: 10,
        updated_at_ms: 20,
    };
    let json = serde_json::to_string(&run).unwrap();
    let back: Run = serde_json::from_str(&json).unwrap();
    assert_eq!(back.id, run.id);
    assert_eq!(back.state, RunState::Running);
    assert_eq!(back.steps.len(), 1);
}
