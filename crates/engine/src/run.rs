// SPDX-License-Identifier: MIT

//! Run and run-step records (spec §3): the mutable state a [`crate::Engine`]
//! owns, schedules, and persists.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    Queued,
    Running,
    WaitingApproval,
    WaitingInput,
    Completed,
    Failed,
    Blocked,
    Cancelled,
}

impl RunState {
    pub fn is_terminal(self) -> bool {
        matches!(self, RunState::Completed | RunState::Failed | RunState::Blocked | RunState::Cancelled)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepState {
    Pending,
    Active,
    Completed,
    Failed,
    Skipped,
}

impl StepState {
    pub fn is_terminal_ready(self) -> bool {
        matches!(self, StepState::Completed | StepState::Skipped)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StepResultMeta {
    #[serde(default)]
    pub tool_calls: Vec<Value>,
    #[serde(default)]
    pub tool_results: Vec<Value>,
    #[serde(default)]
    pub artifacts: Vec<Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunStep {
    pub id: String,
    pub state: StepState,
    #[serde(default)]
    pub result: String,
    #[serde(default)]
    pub result_meta: StepResultMeta,
    #[serde(default)]
    pub started_at_ms: Option<u64>,
    #[serde(default)]
    pub completed_at_ms: Option<u64>,
    #[serde(default)]
    pub retry_count: u32,
    #[serde(default)]
    pub attempt_count: u32,
    #[serde(default)]
    pub last_failure_hash: Option<String>,
    #[serde(default)]
    pub check_results: Vec<CheckResultRecord>,
    /// Whether an `approval=true` gate has been cleared for this step in
    /// this run. Not part of spec.md's listed run-step fields; needed to
    /// make the approval gate idempotent across repeated `advance` calls.
    #[serde(default)]
    pub approved: bool,
}

impl RunStep {
    pub fn pending(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            state: StepState::Pending,
            result: String::new(),
            result_meta: StepResultMeta::default(),
            started_at_ms: None,
            completed_at_ms: None,
            retry_count: 0,
            attempt_count: 0,
            last_failure_hash: None,
            check_results: Vec::new(),
            approved: false,
        }
    }
}

/// Serializable mirror of `ferretbot_checks::CheckResult` (that crate's type
/// isn't `Serialize`, and a run snapshot must round-trip through JSON).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckResultRecord {
    pub kind: String,
    pub passed: bool,
    pub message: Option<String>,
}

impl From<&ferretbot_checks::CheckResult> for CheckResultRecord {
    fn from(r: &ferretbot_checks::CheckResult) -> Self {
        Self { kind: r.kind.clone(), passed: r.passed, message: r.message.clone() }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunFailure {
    pub code: String,
    pub message: String,
    pub step_id: Option<String>,
    pub attempts: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Run {
    pub id: u64,
    pub workflow_id: String,
    pub workflow_version: String,
    pub state: RunState,
    #[serde(default)]
    pub args: Map<String, Value>,
    pub steps: IndexMap<String, RunStep>,
    #[serde(default)]
    pub failure: Option<RunFailure>,
    pub created_at_ms: u64,
    pub updated_at_ms: u64,
}

/// Lightweight summary for `workflow:run:list` / IPC responses.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub id: u64,
    pub workflow_id: String,
    pub workflow_version: String,
    pub state: RunState,
}

impl From<&Run> for RunSummary {
    fn from(run: &Run) -> Self {
        Self {
            id: run.id,
            workflow_id: run.workflow_id.clone(),
            workflow_version: run.workflow_version.clone(),
            state: run.state,
        }
    }
}

#[cfg(test)]
#[path = "run_tests.rs"]
mod tests;
