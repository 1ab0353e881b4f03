// SPDX-License-Identifier: MIT

//! The engine's narrow view of a workspace (spec §6). `ferretbot-engine`
//! depends only on bus/registry/checks, so it cannot reach up to
//! `ferretbot-collab`'s richer `Workspace` trait; this is the small port the
//! engine actually needs for `system_*` steps. `ferretbot-daemon` adapts the
//! collaborator's workspace implementation to this trait when wiring the
//! engine up.

use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum WorkspaceError {
    #[error("path '{0}' escapes the workspace root")]
    PathEscape(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

#[async_trait]
pub trait Workspace: Send + Sync {
    async fn write_text_file(&self, path: &str, content: &str) -> Result<(), WorkspaceError>;
    async fn ensure_text_file(&self, path: &str, content: &str) -> Result<(), WorkspaceError>;
    async fn remove_path(&self, path: &str) -> Result<(), WorkspaceError>;
    async fn exists(&self, path: &str) -> bool;
    async fn read_text_file(&self, path: &str) -> Result<String, WorkspaceError>;
}
