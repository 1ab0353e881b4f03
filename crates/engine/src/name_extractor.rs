// SPDX-License-Identifier: MIT

//! The `I am X` / `you are Y` name-parsing heuristic used by the
//! wait-for-input gate (spec §4.3, open question in §9). Deliberately kept
//! behind a trait: the heuristic is fragile and the spec asks that an
//! implementer treat it as a pluggable strategy rather than grow it ad hoc.

/// Extracts a candidate name from free-text input, when the step's prompt
/// is asking for one.
pub trait NameExtractor: Send + Sync {
    /// Returns `Some(name)` if `text` contains a recognizable
    /// self-introduction pattern, else `None`.
    fn extract(&self, text: &str) -> Option<String>;

    /// Resolve a free-text reply to a `wait_for_input` step whose prompt is
    /// asking for a name. Tries the self-introduction pattern first; failing
    /// that, accepts the reply verbatim only if it reads as a single
    /// non-conversational token rather than a throwaway greeting, per
    /// spec.md §8 scenario 5 ("hello" leaves the gate open, "Morgan"
    /// resolves it).
    fn resolve_name_reply(&self, text: &str) -> Option<String> {
        if let Some(name) = self.extract(text) {
            return Some(name);
        }
        let trimmed = text.trim();
        if trimmed.is_empty() || trimmed.contains(char::is_whitespace) {
            return None;
        }
        if GREETING_STOPWORDS.contains(&trimmed.to_lowercase().as_str()) {
            return None;
        }
        Some(trimmed.to_string())
    }
}

const GREETING_STOPWORDS: &[&str] =
    &["hello", "hi", "hey", "yo", "greetings", "hiya", "sup", "howdy"];

/// The heuristic named in spec.md: look for `I am X` or `you are Y`
/// (case-insensitive), preferring whichever occurs first, and take the
/// remainder of that clause up to the next sentence boundary as the name.
#[derive(Debug, Default, Clone, Copy)]
pub struct HeuristicNameExtractor;

const PATTERNS: &[&str] = &["i am ", "you are "];

impl NameExtractor for HeuristicNameExtractor {
    fn extract(&self, text: &str) -> Option<String> {
        let lower = text.to_lowercase();
        let mut best: Option<(usize, &str)> = None;
        for pattern in PATTERNS {
            if let Some(idx) = lower.find(pattern) {
                if best.map(|(best_idx, _)| idx < best_idx).unwrap_or(true) {
                    best = Some((idx, pattern));
                }
            }
        }
        let (idx, pattern) = best?;
        let start = idx + pattern.len();
        let remainder = &text[start.min(text.len())..];
        let clause = remainder
            .split(|c: char| matches!(c, '.' | ',' | '!' | '?' | '\n'))
            .next()
            .unwrap_or("")
            .trim();
        if clause.is_empty() {
            None
        } else {
            Some(clause.to_string())
        }
    }
}

#[cfg(test)]
#[path = "name_extractor_tests.rs"]
mod tests;
