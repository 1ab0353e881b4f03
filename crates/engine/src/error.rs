// SPDX-License-Identifier: MIT

//! `EngineError` (spec §7): the taxonomy of §7 encoded as Rust types rather
//! than stringly-typed error codes.

use ferretbot_registry::ValidationError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("workflow '{id}' (version {version:?}) not found")]
    WorkflowNotFound { id: String, version: Option<String> },
    #[error("run {0} not found")]
    RunNotFound(u64),
    #[error("step '{0}' not found in run")]
    StepNotFound(String),
    #[error("dependsOn graph contains a cycle involving step '{0}'")]
    Cycle(String),
    #[error("workflow validation failed: {0}")]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl EngineError {
    /// The §7 error code this variant surfaces as.
    pub fn code(&self) -> &'static str {
        match self {
            EngineError::WorkflowNotFound { .. } | EngineError::RunNotFound(_) | EngineError::StepNotFound(_) => {
                "not_found"
            }
            EngineError::Cycle(_) | EngineError::Validation(_) => "validation_error",
            EngineError::Io(_) | EngineError::Json(_) => "tool_error",
        }
    }
}

impl From<EngineError> for ferretbot_core::FerretError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::WorkflowNotFound { .. } | EngineError::RunNotFound(_) | EngineError::StepNotFound(_) => {
                ferretbot_core::FerretError::NotFound(err.to_string())
            }
            EngineError::Cycle(_) | EngineError::Validation(_) => {
                ferretbot_core::FerretError::Validation(err.to_string())
            }
            EngineError::Io(_) | EngineError::Json(_) => ferretbot_core::FerretError::ToolError {
                step_id: None,
                message: err.to_string(),
            },
        }
    }
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
