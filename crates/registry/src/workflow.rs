// SPDX-License-Identifier: MIT

//! Workflow definition types: the shape registered by [`crate::WorkflowRegistry`]
//! and executed by the engine.

use std::collections::HashSet;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Check kinds the evaluator recognizes. Kept in sync with
/// `ferretbot-checks`'s built-in registry so registration can reject typos
/// before a run ever touches the evaluator.
pub const RECOGNIZED_CHECK_KINDS: &[&str] = &[
    "contains",
    "not_contains",
    "regex",
    "exit_code",
    "command_exit_code",
    "file_exists",
    "file_not_exists",
    "file_contains",
    "file_regex",
    "file_hash_changed",
    "non_empty",
];

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("workflow id '{0}' must match ^[a-z0-9-]+$")]
    InvalidId(String),
    #[error("workflow {id}@{version} is already registered")]
    DuplicateVersion { id: String, version: String },
    #[error("step '{0}' depends on unknown step '{1}'")]
    UnknownDependency(String, String),
    #[error("dependsOn graph contains a cycle involving step '{0}'")]
    Cycle(String),
    #[error("step '{0}' has an empty doneWhen list")]
    EmptyDoneWhen(String),
    #[error("step '{step}' doneWhen entry has unrecognized type '{kind}'")]
    UnrecognizedCheckKind { step: String, kind: String },
    #[error("agent step '{0}' requires a non-empty instruction")]
    AgentMissingInstruction(String),
    #[error("agent step '{0}' requires at least one tool")]
    AgentMissingTools(String),
    #[error("system step '{0}' requires a path")]
    SystemMissingPath(String),
    #[error("system step '{0}' requires content")]
    SystemMissingContent(String),
    #[error("system_delete_file step '{0}' must not declare outputs")]
    DeleteStepHasOutputs(String),
    #[error("wait_for_input step '{0}' requires a prompt")]
    WaitMissingPrompt(String),
    #[error("wait_for_input step '{0}' requires a responseKey")]
    WaitMissingResponseKey(String),
    #[error("duplicate step id '{0}'")]
    DuplicateStepId(String),
}

impl From<ValidationError> for ferretbot_core::FerretError {
    fn from(err: ValidationError) -> Self {
        ferretbot_core::FerretError::Validation(err.to_string())
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepKind {
    #[default]
    Agent,
    WaitForInput,
    SystemWriteFile,
    SystemDeleteFile,
    SystemEnsureFile,
}

impl StepKind {
    pub fn is_system(self) -> bool {
        !matches!(self, StepKind::Agent | StepKind::WaitForInput)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OnFail {
    FailRun,
    Blocked,
}

impl Default for OnFail {
    fn default() -> Self {
        OnFail::FailRun
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InputType {
    String,
    Number,
    Boolean,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowInput {
    pub name: String,
    pub r#type: InputType,
    #[serde(default)]
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
}

/// A single success-check descriptor (spec §4.4). Recognized fields are
/// spread flat alongside `type` so the evaluator can pull whichever
/// parameters its kind needs without a struct per kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckSpec {
    pub r#type: String,
    #[serde(flatten)]
    pub params: serde_json::Map<String, Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WorkflowStep {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: StepKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instruction: Option<String>,
    #[serde(default)]
    pub tools: Vec<String>,
    #[serde(default)]
    pub load_skills: Vec<String>,
    #[serde(default)]
    pub depends_on: Vec<String>,
    #[serde(default)]
    pub done_when: Vec<CheckSpec>,
    #[serde(default)]
    pub outputs: Vec<String>,
    #[serde(default)]
    pub on_fail: OnFail,
    #[serde(default)]
    pub retries: u32,
    #[serde(default)]
    pub approval: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_key: Option<String>,
}

impl WorkflowStep {
    fn validate(&self) -> Result<(), ValidationError> {
        // doneWhen is required for every non-wait step; wait steps complete via
        // the input gate rather than a check, so they're exempt.
        if self.kind != StepKind::WaitForInput && self.done_when.is_empty() {
            return Err(ValidationError::EmptyDoneWhen(self.id.clone()));
        }
        for check in &self.done_when {
            if !RECOGNIZED_CHECK_KINDS.contains(&check.r#type.as_str()) {
                return Err(ValidationError::UnrecognizedCheckKind {
                    step: self.id.clone(),
                    kind: check.r#type.clone(),
                });
            }
        }
        match self.kind {
            StepKind::Agent => {
                if self.instruction.as_deref().unwrap_or("").trim().is_empty() {
                    return Err(ValidationError::AgentMissingInstruction(self.id.clone()));
                }
                if self.tools.is_empty() {
                    return Err(ValidationError::AgentMissingTools(self.id.clone()));
                }
            }
            StepKind::SystemWriteFile | StepKind::SystemEnsureFile => {
                if self.path.as_deref().unwrap_or("").is_empty() {
                    return Err(ValidationError::SystemMissingPath(self.id.clone()));
                }
                if self.content.is_none() {
                    return Err(ValidationError::SystemMissingContent(self.id.clone()));
                }
            }
            StepKind::SystemDeleteFile => {
                if self.path.as_deref().unwrap_or("").is_empty() {
                    return Err(ValidationError::SystemMissingPath(self.id.clone()));
                }
                if !self.outputs.is_empty() {
                    return Err(ValidationError::DeleteStepHasOutputs(self.id.clone()));
                }
            }
            StepKind::WaitForInput => {
                if self.prompt.as_deref().unwrap_or("").is_empty() {
                    return Err(ValidationError::WaitMissingPrompt(self.id.clone()));
                }
                if self.response_key.as_deref().unwrap_or("").is_empty() {
                    return Err(ValidationError::WaitMissingResponseKey(self.id.clone()));
                }
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WorkflowDefinitionFile {
    pub id: String,
    pub version: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub inputs: Vec<WorkflowInput>,
    pub steps: Vec<WorkflowStep>,
}

/// An immutable, validated workflow definition, as held by the registry.
#[derive(Debug, Clone)]
pub struct WorkflowDefinition {
    pub id: String,
    pub version: String,
    pub name: String,
    pub description: Option<String>,
    pub inputs: Vec<WorkflowInput>,
    pub steps: Vec<WorkflowStep>,
    pub dir: PathBuf,
}

fn valid_id(id: &str) -> bool {
    !id.is_empty() && id.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
}

impl WorkflowDefinition {
    /// Build and validate a definition from its parsed file form.
    pub fn from_file(file: WorkflowDefinitionFile, dir: PathBuf) -> Result<Self, ValidationError> {
        if !valid_id(&file.id) {
            return Err(ValidationError::InvalidId(file.id));
        }

        let mut seen = HashSet::new();
        for step in &file.steps {
            if !seen.insert(step.id.clone()) {
                return Err(ValidationError::DuplicateStepId(step.id.clone()));
            }
        }

        let ids: HashSet<&str> = file.steps.iter().map(|s| s.id.as_str()).collect();
        for step in &file.steps {
            for dep in &step.depends_on {
                if !ids.contains(dep.as_str()) {
                    return Err(ValidationError::UnknownDependency(step.id.clone(), dep.clone()));
                }
            }
        }
        detect_cycle(&file.steps)?;

        for step in &file.steps {
            step.validate()?;
        }

        Ok(WorkflowDefinition {
            id: file.id.clone(),
            version: file.version,
            name: file.name.unwrap_or(file.id),
            description: file.description,
            inputs: file.inputs,
            steps: file.steps,
            dir,
        })
    }
}

fn detect_cycle(steps: &[WorkflowStep]) -> Result<(), ValidationError> {
    #[derive(Clone, Copy, PartialEq)]
    enum Mark {
        Unvisited,
        Visiting,
        Done,
    }

    let mut marks: std::collections::HashMap<&str, Mark> =
        steps.iter().map(|s| (s.id.as_str(), Mark::Unvisited)).collect();
    let by_id: std::collections::HashMap<&str, &WorkflowStep> =
        steps.iter().map(|s| (s.id.as_str(), s)).collect();

    fn visit<'a>(
        id: &'a str,
        by_id: &std::collections::HashMap<&'a str, &'a WorkflowStep>,
        marks: &mut std::collections::HashMap<&'a str, Mark>,
    ) -> Result<(), ValidationError> {
        match marks.get(id).copied().unwrap_or(Mark::Done) {
            Mark::Done => return Ok(()),
            Mark::Visiting => return Err(ValidationError::Cycle(id.to_string())),
            Mark::Unvisited => {}
        }
        marks.insert(id, Mark::Visiting);
        if let Some(step) = by_id.get(id) {
            for dep in &step.depends_on {
                visit(dep, by_id, marks)?;
            }
        }
        marks.insert(id, Mark::Done);
        Ok(())
    }

    for step in steps {
        visit(&step.id, &by_id, &mut marks)?;
    }
    Ok(())
}

#[cfg(test)]
#[path = "workflow_tests.rs"]
mod tests;
