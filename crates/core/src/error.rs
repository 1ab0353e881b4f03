// SPDX-License-Identifier: MIT

//! Error taxonomy shared across the workspace (spec §7).
//!
//! Each crate that needs a narrower error type implements `From<_> for
//! FerretError` so the IPC gateway can turn any core error into a
//! `workflow_command_result { ok: false }` response without a giant match.

use thiserror::Error;

/// The six error codes produced by the core (spec §7).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FerretError {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("check failed on step {step_id}: {message}")]
    CheckFailed { step_id: String, message: String },

    #[error("no progress on step {step_id}")]
    NoProgress { step_id: String },

    #[error("tool error{}: {message}", step_id.as_ref().map(|s| format!(" on step {s}")).unwrap_or_default())]
    ToolError {
        step_id: Option<String>,
        message: String,
    },

    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

impl FerretError {
    /// The stable error code string used in IPC responses (spec §7 table).
    pub fn code(&self) -> &'static str {
        match self {
            FerretError::Validation(_) => "validation_error",
            FerretError::NotFound(_) => "not_found",
            FerretError::CheckFailed { .. } => "check_failed",
            FerretError::NoProgress { .. } => "no_progress",
            FerretError::ToolError { .. } => "tool_error",
            FerretError::InvalidRequest(_) => "invalid_request",
        }
    }

    /// The step id this failure applies to, if any.
    pub fn step_id(&self) -> Option<&str> {
        match self {
            FerretError::CheckFailed { step_id, .. } => Some(step_id),
            FerretError::NoProgress { step_id } => Some(step_id),
            FerretError::ToolError { step_id, .. } => step_id.as_deref(),
            _ => None,
        }
    }
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
