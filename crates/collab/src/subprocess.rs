// SPDX-License-Identifier: MIT

//! Bounded subprocess execution for the shell-out tool.
//!
//! `oddjobs`'s own `crate::adapters::subprocess::run_with_timeout` is called
//! throughout `daemon/src/adapters/workspace.rs` (`git worktree add`, `git
//! worktree remove`, ...) but its implementation is not part of this
//! exercise's retrieval pack. This rebuilds the same shape its call sites
//! imply: a `tokio::process::Command` wrapped in `tokio::time::timeout`,
//! the process killed on timeout rather than left to finish in the
//! background.

use std::process::Output;
use std::time::Duration;

use thiserror::Error;
use tokio::process::Command;

/// Default ceiling for a single tool invocation.
pub const DEFAULT_TOOL_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Error)]
pub enum SubprocessError {
    #[error("{description} timed out after {timeout:?}")]
    TimedOut {
        description: String,
        timeout: Duration,
    },
    #[error("{description} failed to spawn: {source}")]
    Spawn {
        description: String,
        #[source]
        source: std::io::Error,
    },
}

/// Run `cmd` to completion, killing it if it exceeds `timeout`.
///
/// `description` is only used for the error message; it should name the
/// command being run (`"git worktree add"`, `"run_command: npm test"`) so a
/// timeout in the logs is traceable back to its caller.
pub async fn run_with_timeout(
    mut cmd: Command,
    timeout: Duration,
    description: &str,
) -> Result<Output, SubprocessError> {
    cmd.kill_on_drop(true);
    match tokio::time::timeout(timeout, cmd.output()).await {
        Ok(Ok(output)) => Ok(output),
        Ok(Err(source)) => Err(SubprocessError::Spawn {
            description: description.to_string(),
            source,
        }),
        Err(_) => Err(SubprocessError::TimedOut {
            description: description.to_string(),
            timeout,
        }),
    }
}

#[cfg(test)]
#[path = "subprocess_tests.rs"]
mod tests;
