// SPDX-License-Identifier: MIT

#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! ferretbot-registry: the immutable store of workflow definitions keyed by
//! `(id, version)`, plus discovery of `workflow.yaml` files on disk.

mod loader;
mod semver;
mod workflow;

pub use workflow::{
    CheckSpec, InputType, OnFail, StepKind, ValidationError, WorkflowDefinition,
    WorkflowDefinitionFile, WorkflowInput, WorkflowStep, RECOGNIZED_CHECK_KINDS,
};

use std::collections::HashMap;
use std::path::Path;

use parking_lot::RwLock;

/// A lightweight summary used by `list()` and IPC responses.
#[derive(Debug, Clone)]
pub struct WorkflowSummary {
    pub id: String,
    pub version: String,
    pub name: String,
}

#[derive(Default)]
struct Store {
    by_id: HashMap<String, HashMap<String, WorkflowDefinition>>,
}

/// The registry of known workflow definitions. Cheaply clonable; wraps an
/// `Arc<RwLock<..>>` internally so multiple owners (engine, IPC gateway, CLI
/// glue) can share one source of truth.
#[derive(Clone, Default)]
pub struct WorkflowRegistry {
    store: std::sync::Arc<RwLock<Store>>,
}

impl WorkflowRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a validated definition. Fails on duplicate `(id, version)`.
    pub fn register(&self, definition: WorkflowDefinition) -> Result<(), ValidationError> {
        let mut store = self.store.write();
        let versions = store.by_id.entry(definition.id.clone()).or_default();
        if versions.contains_key(&definition.version) {
            return Err(ValidationError::DuplicateVersion {
                id: definition.id,
                version: definition.version,
            });
        }
        tracing::info!(id = %definition.id, version = %definition.version, "registered workflow");
        versions.insert(definition.version.clone(), definition);
        Ok(())
    }

    /// Look up a workflow. Without a version, returns the highest by the
    /// semver-like comparator.
    pub fn get(&self, id: &str, version: Option<&str>) -> Option<WorkflowDefinition> {
        let store = self.store.read();
        let versions = store.by_id.get(id)?;
        match version {
            Some(v) => versions.get(v).cloned(),
            None => versions
                .values()
                .max_by(|a, b| semver::compare_versions(&a.version, &b.version))
                .cloned(),
        }
    }

    pub fn has(&self, id: &str) -> bool {
        self.store.read().by_id.contains_key(id)
    }

    pub fn list(&self) -> Vec<WorkflowSummary> {
        let store = self.store.read();
        let mut out: Vec<WorkflowSummary> = store
            .by_id
            .values()
            .flat_map(|versions| versions.values())
            .map(|def| WorkflowSummary { id: def.id.clone(), version: def.version.clone(), name: def.name.clone() })
            .collect();
        out.sort_by(|a, b| a.id.cmp(&b.id).then_with(|| a.version.cmp(&b.version)));
        out
    }

    /// Load and register every `workflow.yaml` under `base_dir`. Returns the
    /// number of workflows registered. A single malformed file aborts the
    /// whole call with its error, matching §6's "rejected at load."
    pub fn load_all(&self, base_dir: &Path) -> Result<usize, LoadError> {
        let files = loader::collect_workflow_files(base_dir)?;
        let mut count = 0;
        for path in files {
            let content = std::fs::read_to_string(&path)?;
            let file: WorkflowDefinitionFile = serde_yaml::from_str(&content)
                .map_err(|e| LoadError::Parse { path: path.clone(), source: e })?;
            let dir = path.parent().map(Path::to_path_buf).unwrap_or_else(|| base_dir.to_path_buf());
            let definition = WorkflowDefinition::from_file(file, dir)?;
            self.register(definition)?;
            count += 1;
        }
        Ok(count)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("failed to parse {path}: {source}")]
    Parse { path: std::path::PathBuf, source: serde_yaml::Error },
    #[error(transparent)]
    Validation(#[from] ValidationError),
}

#[cfg(test)]
#[path = "lib_tests.rs"]
mod tests;
