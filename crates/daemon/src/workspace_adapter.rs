// SPDX-License-Identifier: MIT

//! Adapts `ferretbot-collab`'s richer `Workspace` (the one tools and the
//! agent loop use) to `ferretbot-engine`'s narrower `Workspace` (the one
//! `system_*` steps use). The two traits are structurally identical but
//! kept distinct so `ferretbot-engine` never depends on `ferretbot-collab`;
//! this daemon is the one place that has to see both.

use std::sync::Arc;

use async_trait::async_trait;

use ferretbot_collab::{Workspace as CollabWorkspace, WorkspaceError as CollabWorkspaceError};
use ferretbot_engine::{Workspace as EngineWorkspace, WorkspaceError as EngineWorkspaceError};

pub struct EngineWorkspaceAdapter {
    inner: Arc<dyn CollabWorkspace>,
}

impl EngineWorkspaceAdapter {
    pub fn new(inner: Arc<dyn CollabWorkspace>) -> Self {
        Self { inner }
    }
}

fn convert_error(error: CollabWorkspaceError) -> EngineWorkspaceError {
    match error {
        CollabWorkspaceError::PathEscape(path) => EngineWorkspaceError::PathEscape(path),
        CollabWorkspaceError::Io(io) => EngineWorkspaceError::Io(io),
    }
}

#[async_trait]
impl EngineWorkspace for EngineWorkspaceAdapter {
    async fn write_text_file(&self, path: &str, content: &str) -> Result<(), EngineWorkspaceError> {
        self.inner.write_text_file(path, content).await.map_err(convert_error)
    }

    async fn ensure_text_file(&self, path: &str, content: &str) -> Result<(), EngineWorkspaceError> {
        self.inner.ensure_text_file(path, content).await.map_err(convert_error)
    }

    async fn remove_path(&self, path: &str) -> Result<(), EngineWorkspaceError> {
        self.inner.remove_path(path).await.map_err(convert_error)
    }

    async fn exists(&self, path: &str) -> bool {
        self.inner.exists(path).await
    }

    async fn read_text_file(&self, path: &str) -> Result<String, EngineWorkspaceError> {
        self.inner.read_text_file(path).await.map_err(convert_error)
    }
}

#[cfg(test)]
#[path = "workspace_adapter_tests.rs"]
mod tests;
