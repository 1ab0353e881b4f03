// SPDX-License-Identifier: MIT

//! Path-guarded filesystem `Workspace` (spec §6). Every path handed to a
//! tool or a `system_*` step is resolved against a fixed root and rejected
//! if it would step outside it — no direct teacher counterpart does path
//! containment (`oj-core::workspace` is an identifier/lifecycle type, not
//! file I/O), so this is written fresh in the crate's own idiom.

use std::path::{Component, Path, PathBuf};

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

/// A workspace rooted at a fixed directory on the local filesystem.
pub struct LocalWorkspace {
    root: PathBuf,
}

impl LocalWorkspace {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve `path` against the root. Absolute paths and any `..`
    /// component are rejected rather than normalized away.
    fn resolve(&self, path: &str) -> Result<PathBuf, WorkspaceError> {
        let candidate = Path::new(path);
        if candidate.is_absolute() {
            return Err(WorkspaceError::PathEscape(path.to_string()));
        }
        let mut resolved = self.root.clone();
        for component in candidate.components() {
            match component {
                Component::Normal(part) => resolved.push(part),
                Component::CurDir => {}
                Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                    return Err(WorkspaceError::PathEscape(path.to_string()));
                }
            }
        }
        Ok(resolved)
    }
}

#[async_trait]
impl Workspace for LocalWorkspace {
    async fn write_text_file(&self, path: &str, content: &str) -> Result<(), WorkspaceError> {
        let full = self.resolve(path)?;
        if let Some(parent) = full.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&full, content).await?;
        Ok(())
    }

    async fn ensure_text_file(&self, path: &str, content: &str) -> Result<(), WorkspaceError> {
        let full = self.resolve(path)?;
        if tokio::fs::try_exists(&full).await.unwrap_or(false) {
            return Ok(());
        }
        self.write_text_file(path, content).await
    }

    async fn remove_path(&self, path: &str) -> Result<(), WorkspaceError> {
        let full = self.resolve(path)?;
        match tokio::fs::metadata(&full).await {
            Ok(meta) if meta.is_dir() => tokio::fs::remove_dir_all(&full).await?,
            Ok(_) => tokio::fs::remove_file(&full).await?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        Ok(())
    }

    async fn exists(&self, path: &str) -> bool {
        match self.resolve(path) {
            Ok(full) => tokio::fs::try_exists(&full).await.unwrap_or(false),
            Err(_) => false,
        }
    }

    async fn read_text_file(&self, path: &str) -> Result<String, WorkspaceError> {
        let full = self.resolve(path)?;
        Ok(tokio::fs::read_to_string(&full).await?)
    }
}

#[cfg(test)]
#[path = "workspace_tests.rs"]
mod tests;
