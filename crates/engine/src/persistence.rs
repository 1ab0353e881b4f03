// SPDX-License-Identifier: MIT

//! Atomic `run-<id>.json` persistence (spec §4.3), following the same
//! write-tmp-then-rename idiom the teacher uses for breadcrumb files.

use std::path::{Path, PathBuf};

use crate::run::Run;

pub fn run_path(storage_dir: &Path, run_id: u64) -> PathBuf {
    storage_dir.join(format!("run-{run_id}.json"))
}

/// Write `run`'s full JSON snapshot, replacing any previous snapshot for
/// the same id atomically. Creates `storage_dir` lazily if missing.
pub fn persist_run(storage_dir: &Path, run: &Run) -> std::io::Result<()> {
    std::fs::create_dir_all(storage_dir)?;
    let path = run_path(storage_dir, run.id);
    let tmp_path = path.with_extension("json.tmp");
    let json = serde_json::to_string_pretty(run).map_err(std::io::Error::other)?;
    std::fs::write(&tmp_path, json.as_bytes())?;
    std::fs::rename(&tmp_path, &path)?;
    Ok(())
}

/// Scan `storage_dir` for `run-<id>.json` snapshots and deserialize every
/// one that parses. Corrupt files are skipped with a warning, never fatal.
pub fn recover_runs(storage_dir: &Path) -> Vec<Run> {
    let mut runs = Vec::new();
    let entries = match std::fs::read_dir(storage_dir) {
        Ok(entries) => entries,
        Err(_) => return runs,
    };
    for entry in entries.flatten() {
        let path = entry.path();
        let name = match path.file_name().and_then(|n| n.to_str()) {
            Some(n) => n.to_string(),
            None => continue,
        };
        if !name.starts_with("run-") || !name.ends_with(".json") {
            continue;
        }
        match std::fs::read_to_string(&path) {
            Ok(content) => match serde_json::from_str::<Run>(&content) {
                Ok(run) => runs.push(run),
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "skipping corrupt run snapshot");
                }
            },
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "failed to read run snapshot");
            }
        }
    }
    runs
}

#[cfg(test)]
#[path = "persistence_tests.rs"]
mod tests;
