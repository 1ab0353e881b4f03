use indexmap::IndexMap;
use serde_json::Map;
use tempfile::tempdir;

use super::*;
use crate::run::{Run, RunState, RunStep};

fn sample_run(id: u64) -> Run {
    let mut steps = IndexMap::new();
    steps.insert("a".to_string(), RunStep::pending("a"));
    Run {
        id,
        workflow_id: "demo".to_string(),
        workflow_version: "1.0.0".to_string(),
        state: RunState::Running,
        args: Map::new(),
        steps,
        failure: None,
        created_at_ms: 1,
        updated_at_ms: 2,
    }
}

#[test]
fn persist_then_recover_round_trips() {
    let dir = tempdir().unwrap();
    let run = sample_run(42);
    persist_run(dir.path(), &run).unwrap();

    let recovered = recover_runs(dir.path());
    assert_eq!(recovered.len(), 1);
    assert_eq!(recovered[0].id, 42);
    assert_eq!(recovered[0].state, RunState::Running);
}

#[test]
fn persist_creates_storage_dir_lazily() {
    let dir = tempdir().unwrap();
    let nested = dir.path().join("nested").join("storage");
    assert!(!nested.exists());
    persist_run(&nested, &sample_run(1)).unwrap();
    assert!(nested.exists());
}

#[test]
fn corrupt_snapshot_is_skipped_not_fatal() {
    let dir = tempdir().unwrap();
    std::fs::write(dir.path().join("run-1.json"), b"not json").unwrap();
    let recovered = recover_runs(dir.path());
    assert!(recovered.is_empty());
}

#[test]
fn overwriting_a_run_replaces_the_previous_snapshot() {
    let dir = tempdir().unwrap();
    let mut run = sample_run(7);
    persist_run(dir.path(), &run).unwrap();
    run.state = RunState::Completed;
    persist_run(dir.path(), &run).unwrap();

    let recovered = recover_runs(dir.path());
    assert_eq!(recovered.len(), 1);
    assert_eq!(recovered[0].state, RunState::Completed);
}
