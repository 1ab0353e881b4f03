// SPDX-License-Identifier: MIT

//! Directory-based `SkillLoader` (spec §6). Grounded on `oj-runbook`'s
//! file-discovery conventions (`find.rs`): a recursive stack-based directory
//! walk that skips unreadable files with a `tracing::warn!` rather than
//! aborting, and a leading-comment convention for metadata instead of a
//! separate sidecar file.

use std::path::{Path, PathBuf};

use async_trait::async_trait;

/// What a step needs skill content for: the step id (for logging) and the
/// tool names / free-form tags to match skill files against.
#[derive(Debug, Clone, Default)]
pub struct SkillRequest {
    pub step_id: String,
    pub tool_names: Vec<String>,
    pub tags: Vec<String>,
}

/// The matched skill content, concatenated in filename order, and the names
/// of the skill files that contributed to it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SkillBundle {
    pub content: Option<String>,
    pub skill_names: Vec<String>,
}

#[async_trait]
pub trait SkillLoader: Send + Sync {
    async fn load_skills_for_step(&self, req: SkillRequest) -> SkillBundle;
}

/// Loads `.md` skill files from a directory tree. Each file's first line may
/// declare `<!-- tags: a, b -->`; a skill matches a request if any requested
/// tool name or tag appears in its declared tags, or in its filename stem
/// when it declares no tags at all.
pub struct DirectorySkillLoader {
    root: PathBuf,
}

impl DirectorySkillLoader {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn collect_skill_files(&self) -> Vec<PathBuf> {
        let mut files = Vec::new();
        let mut stack = vec![self.root.clone()];
        while let Some(current) = stack.pop() {
            let entries = match std::fs::read_dir(&current) {
                Ok(entries) => entries,
                Err(e) => {
                    tracing::warn!(path = %current.display(), error = %e, "skipping unreadable skill directory");
                    continue;
                }
            };
            for entry in entries.flatten() {
                let path = entry.path();
                if path.is_dir() {
                    stack.push(path);
                } else if path.extension().and_then(|e| e.to_str()) == Some("md") {
                    files.push(path);
                }
            }
        }
        files.sort();
        files
    }
}

fn declared_tags(content: &str) -> Vec<String> {
    let first_line = content.lines().next().unwrap_or("").trim();
    let Some(inner) = first_line
        .strip_prefix("<!-- tags:")
        .and_then(|rest| rest.strip_suffix("-->"))
    else {
        return Vec::new();
    };
    inner.split(',').map(|t| t.trim().to_lowercase()).filter(|t| !t.is_empty()).collect()
}

fn matches(path: &Path, tags: &[String], wanted: &[String]) -> bool {
    if wanted.is_empty() {
        return false;
    }
    if !tags.is_empty() {
        return tags.iter().any(|tag| wanted.iter().any(|w| w.eq_ignore_ascii_case(tag)));
    }
    let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or("").to_lowercase();
    wanted.iter().any(|w| stem.contains(&w.to_lowercase()))
}

#[async_trait]
impl SkillLoader for DirectorySkillLoader {
    async fn load_skills_for_step(&self, req: SkillRequest) -> SkillBundle {
        let wanted: Vec<String> = req.tool_names.iter().chain(req.tags.iter()).cloned().collect();
        let mut sections = Vec::new();
        let mut names = Vec::new();

        for path in self.collect_skill_files() {
            let content = match std::fs::read_to_string(&path) {
                Ok(c) => c,
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "skipping unreadable skill file");
                    continue;
                }
            };
            let tags = declared_tags(&content);
            if !matches(&path, &tags, &wanted) {
                continue;
            }
            let name = path.file_stem().and_then(|s| s.to_str()).unwrap_or("skill").to_string();
            sections.push(content);
            names.push(name);
        }

        if sections.is_empty() {
            tracing::debug!(step_id = %req.step_id, "no skills matched");
            return SkillBundle::default();
        }

        SkillBundle {
            content: Some(sections.join("\n\n---\n\n")),
            skill_names: names,
        }
    }
}

#[cfg(test)]
#[path = "skills_tests.rs"]
mod tests;
