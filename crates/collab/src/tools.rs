// SPDX-License-Identifier: MIT

//! The built-in `ToolRegistry` (spec §6): file read/write against a
//! `Workspace` plus a bounded shell-out. Grounded on the *interface* shape
//! of `oddjobs`'s own tool-like effects (`Effect::SpawnAgent` /
//! subprocess execution in `engine/src/executor.rs`), with the shell-out
//! itself a bounded `tokio::process::Command` rather than the teacher's
//! dropped shell-script language.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;
use tokio::process::Command;

use crate::subprocess::{run_with_timeout, SubprocessError, DEFAULT_TOOL_TIMEOUT};
use crate::workspace::Workspace;

/// A tool's name, description, and JSON Schema parameter shape, as handed to
/// a `Provider` alongside a chat request.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolSchema {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    pub arguments: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolResult {
    pub id: String,
    pub output: String,
    pub is_error: bool,
}

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("tool '{0}' is not registered")]
    NotFound(String),
    #[error("tool '{tool}' received invalid arguments: {message}")]
    InvalidArguments { tool: String, message: String },
    #[error("tool '{tool}' failed: {message}")]
    Execution { tool: String, message: String },
}

#[async_trait]
pub trait ToolRegistry: Send + Sync {
    fn list(&self) -> Vec<ToolSchema>;
    fn get(&self, name: &str) -> Option<ToolSchema>;
    async fn execute(&self, call: ToolCall) -> Result<ToolResult, ToolError>;
}

const READ_FILE: &str = "read_file";
const WRITE_FILE: &str = "write_file";
const RUN_COMMAND: &str = "run_command";

fn builtin_schemas() -> Vec<ToolSchema> {
    vec![
        ToolSchema {
            name: READ_FILE.to_string(),
            description: "Read a UTF-8 text file from the workspace.".to_string(),
            parameters: json!({
                "type": "object",
                "properties": { "path": { "type": "string" } },
                "required": ["path"],
            }),
        },
        ToolSchema {
            name: WRITE_FILE.to_string(),
            description: "Write a UTF-8 text file in the workspace, creating parent directories as needed.".to_string(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "path": { "type": "string" },
                    "content": { "type": "string" },
                },
                "required": ["path", "content"],
            }),
        },
        ToolSchema {
            name: RUN_COMMAND.to_string(),
            description: "Run an allow-listed shell command with arguments and return its combined output.".to_string(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "command": { "type": "string" },
                    "args": { "type": "array", "items": { "type": "string" } },
                },
                "required": ["command"],
            }),
        },
    ]
}

/// `ToolRegistry` backed by a `Workspace` for file access and an
/// allow-listed `tokio::process::Command` for shell-outs.
///
/// An empty `allowed_commands` means every command is permitted — callers
/// wiring this up for an untrusted agent should always supply an explicit
/// allow-list.
pub struct BuiltinToolRegistry {
    workspace: Arc<dyn Workspace>,
    allowed_commands: Vec<String>,
    timeout: Duration,
}

impl BuiltinToolRegistry {
    pub fn new(workspace: Arc<dyn Workspace>, allowed_commands: Vec<String>) -> Self {
        Self {
            workspace,
            allowed_commands,
            timeout: DEFAULT_TOOL_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn string_arg(call: &ToolCall, key: &str) -> Result<String, ToolError> {
        call.arguments
            .get(key)
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| ToolError::InvalidArguments {
                tool: call.name.clone(),
                message: format!("missing or non-string '{key}'"),
            })
    }

    async fn read_file(&self, call: &ToolCall) -> Result<String, ToolError> {
        let path = Self::string_arg(call, "path")?;
        self.workspace
            .read_text_file(&path)
            .await
            .map_err(|e| ToolError::Execution {
                tool: call.name.clone(),
                message: e.to_string(),
            })
    }

    async fn write_file(&self, call: &ToolCall) -> Result<String, ToolError> {
        let path = Self::string_arg(call, "path")?;
        let content = Self::string_arg(call, "content")?;
        self.workspace
            .write_text_file(&path, &content)
            .await
            .map_err(|e| ToolError::Execution {
                tool: call.name.clone(),
                message: e.to_string(),
            })?;
        Ok(format!("wrote {} bytes to {path}", content.len()))
    }

    async fn run_command(&self, call: &ToolCall) -> Result<String, ToolError> {
        let command = Self::string_arg(call, "command")?;
        if !self.allowed_commands.is_empty() && !self.allowed_commands.iter().any(|c| c == &command) {
            return Err(ToolError::InvalidArguments {
                tool: call.name.clone(),
                message: format!("command '{command}' is not in the allow-list"),
            });
        }
        let args: Vec<String> = match call.arguments.get("args") {
            None => Vec::new(),
            Some(Value::Array(items)) => items
                .iter()
                .map(|v| v.as_str().map(str::to_string))
                .collect::<Option<Vec<_>>>()
                .ok_or_else(|| ToolError::InvalidArguments {
                    tool: call.name.clone(),
                    message: "'args' must be an array of strings".to_string(),
                })?,
            Some(_) => {
                return Err(ToolError::InvalidArguments {
                    tool: call.name.clone(),
                    message: "'args' must be an array of strings".to_string(),
                })
            }
        };

        let mut cmd = Command::new(&command);
        cmd.args(&args);
        let description = format!("run_command: {command}");
        let output = run_with_timeout(cmd, self.timeout, &description)
            .await
            .map_err(|e: SubprocessError| ToolError::Execution {
                tool: call.name.clone(),
                message: e.to_string(),
            })?;

        let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
        if !output.stderr.is_empty() {
            combined.push_str("\n--- stderr ---\n");
            combined.push_str(&String::from_utf8_lossy(&output.stderr));
        }
        if !output.status.success() {
            return Err(ToolError::Execution {
                tool: call.name.clone(),
                message: format!("exited with {}: {combined}", output.status),
            });
        }
        Ok(combined)
    }
}

#[async_trait]
impl ToolRegistry for BuiltinToolRegistry {
    fn list(&self) -> Vec<ToolSchema> {
        builtin_schemas()
    }

    fn get(&self, name: &str) -> Option<ToolSchema> {
        builtin_schemas().into_iter().find(|s| s.name == name)
    }

    async fn execute(&self, call: ToolCall) -> Result<ToolResult, ToolError> {
        let outcome = match call.name.as_str() {
            READ_FILE => self.read_file(&call).await,
            WRITE_FILE => self.write_file(&call).await,
            RUN_COMMAND => self.run_command(&call).await,
            other => return Err(ToolError::NotFound(other.to_string())),
        };

        match outcome {
            Ok(output) => Ok(ToolResult {
                id: call.id,
                output,
                is_error: false,
            }),
            Err(ToolError::Execution { message, .. }) => Ok(ToolResult {
                id: call.id,
                output: message,
                is_error: true,
            }),
            Err(other) => Err(other),
        }
    }
}

#[cfg(test)]
#[path = "tools_tests.rs"]
mod tests;
