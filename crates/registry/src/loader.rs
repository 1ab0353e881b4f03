// SPDX-License-Identifier: MIT

//! Discovery of `workflow.yaml` files under a base directory, one level of
//! project subdirectories deep.

use std::path::{Path, PathBuf};

/// Recursively collect `workflow.yaml` paths under `base_dir`.
pub fn collect_workflow_files(base_dir: &Path) -> std::io::Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    if !base_dir.exists() {
        return Ok(files);
    }
    let mut stack = vec![base_dir.to_path_buf()];
    while let Some(current) = stack.pop() {
        for entry in std::fs::read_dir(&current)?.flatten() {
            let path = entry.path();
            if path.is_dir() {
                stack.push(path);
            } else if path.file_name().and_then(|n| n.to_str()) == Some("workflow.yaml") {
                files.push(path);
            }
        }
    }
    files.sort();
    Ok(files)
}

#[cfg(test)]
#[path = "loader_tests.rs"]
mod tests;
