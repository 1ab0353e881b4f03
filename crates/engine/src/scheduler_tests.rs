use std::path::PathBuf;

use ferretbot_registry::{CheckSpec, OnFail, StepKind, WorkflowDefinition, WorkflowStep};
use indexmap::IndexMap;
use serde_json::Map;

use super::*;
use crate::run::{Run, RunState, RunStep};

fn step(id: &str, depends_on: &[&str]) -> WorkflowStep {
    WorkflowStep {
        id: id.to_string(),
        kind: StepKind::Agent,
        instruction: Some("do it".to_string()),
        tools: vec!["shell".to_string()],
        load_skills: vec![],
        depends_on: depends_on.iter().map(|s| s.to_string()).collect(),
        done_when: vec![CheckSpec { r#type: "non_empty".to_string(), params: Map::new() }],
        outputs: vec![],
        on_fail: OnFail::FailRun,
        retries: 0,
        approval: false,
        path: None,
        content: None,
        mode: None,
        prompt: None,
        response_key: None,
    }
}

fn workflow(steps: Vec<WorkflowStep>) -> WorkflowDefinition {
    WorkflowDefinition {
        id: "demo".to_string(),
        version: "1.0.0".to_string(),
        name: "demo".to_string(),
        description: None,
        inputs: vec![],
        steps,
        dir: PathBuf::from("/tmp/demo"),
    }
}

fn run_with_states(wf: &WorkflowDefinition, states: &[(&str, StepState)]) -> Run {
    let mut steps = IndexMap::new();
    for (id, state) in states {
        let mut rs = RunStep::pending(*id);
        rs.state = *state;
        steps.insert(id.to_string(), rs);
    }
    Run {
        id: 1,
        workflow_id: wf.id.clone(),
        workflow_version: wf.version.clone(),
        state: RunState::Running,
        args: Map::new(),
        steps,
        failure: None,
        created_at_ms: 0,
        updated_at_ms: 0,
    }
}

#[test]
fn first_step_with_no_deps_is_ready() {
    let wf = workflow(vec![step("a", &[]), step("b", &["a"])]);
    let run = run_with_states(&wf, &[("a", StepState::Pending), ("b", StepState::Pending)]);
    match find_next_ready_step(&wf, &run) {
        Readiness::Ready(id) => assert_eq!(id, "a"),
        _ => panic!("expected a ready step"),
    }
}

#[test]
fn step_waits_for_unfinished_dependency() {
    let wf = workflow(vec![step("a", &[]), step("b", &["a"])]);
    let run = run_with_states(&wf, &[("a", StepState::Active), ("b", StepState::Pending)]);
    match find_next_ready_step(&wf, &run) {
        Readiness::Suspended => {}
        _ => panic!("expected suspended, b should not be ready while a is active"),
    }
}

#[test]
fn skipped_dependency_unblocks_dependent() {
    let wf = workflow(vec![step("a", &[]), step("b", &["a"])]);
    let run = run_with_states(&wf, &[("a", StepState::Skipped), ("b", StepState::Pending)]);
    match find_next_ready_step(&wf, &run) {
        Readiness::Ready(id) => assert_eq!(id, "b"),
        _ => panic!("expected b ready once a is skipped"),
    }
}

#[test]
fn all_terminal_steps_complete_the_run() {
    let wf = workflow(vec![step("a", &[])]);
    let run = run_with_states(&wf, &[("a", StepState::Completed)]);
    match find_next_ready_step(&wf, &run) {
        Readiness::Complete => {}
        _ => panic!("expected run to be complete"),
    }
}

#[test]
fn ties_break_by_source_order() {
    let wf = workflow(vec![step("b", &[]), step("a", &[])]);
    let run = run_with_states(&wf, &[("b", StepState::Pending), ("a", StepState::Pending)]);
    match find_next_ready_step(&wf, &run) {
        Readiness::Ready(id) => assert_eq!(id, "b"),
        _ => panic!("expected b first, by source order"),
    }
}
