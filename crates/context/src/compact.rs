// SPDX-License-Identifier: MIT

//! Continuation compaction (spec §4.5): when a model truncates mid-turn and
//! the agent loop continues, trim the message history back under budget
//! before the next call, preserving what matters most (system/tool messages,
//! the last two turns) and summarizing what gets dropped.

use crate::config::ContextConfig;
use crate::message::{Message, Role};
use crate::tokens::{estimate_messages_tokens, estimate_tokens};

const KEEP_IF_POSSIBLE_COUNT: usize = 8;
const SUMMARY_SNIPPET_CHARS: usize = 80;
const SUMMARY_MAX_SNIPPETS: usize = 6;
const SUMMARY_SHRINK_FLOOR: usize = 16;
const CONTINUATION_GROWTH: f64 = 1.8;

#[derive(Debug, Clone)]
pub struct CompactRequest {
    pub messages: Vec<Message>,
    /// True on the first continuation of a step; later continuations cap
    /// their output target to the previous completion's size.
    pub is_first_continuation: bool,
    pub last_completion_tokens: Option<u32>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CompactResult {
    pub messages: Vec<Message>,
    pub continuation_output_target: u32,
}

/// Compact an over-long message history and derive the next continuation's
/// output token target.
pub fn compact(request: &CompactRequest, config: &ContextConfig) -> CompactResult {
    let cpt = config.chars_per_token;
    let margin = config.safety_margin;
    let input_budget = config.input_budget();

    let n = request.messages.len();
    let last_two_start = n.saturating_sub(2);
    let must_keep: Vec<bool> = request
        .messages
        .iter()
        .enumerate()
        .map(|(i, m)| matches!(m.role, Role::System | Role::Tool) || i >= last_two_start)
        .collect();

    let remaining_idx: Vec<usize> = (0..n).filter(|&i| !must_keep[i]).collect();
    let split = remaining_idx.len().saturating_sub(KEEP_IF_POSSIBLE_COUNT);
    let evict_first: Vec<usize> = remaining_idx[..split].to_vec();
    let keep_if_possible: Vec<usize> = remaining_idx[split..].to_vec();

    let mut dropped: Vec<bool> = vec![false; n];

    let within_budget = |dropped: &[bool], messages: &[Message]| {
        let kept: Vec<Message> = messages
            .iter()
            .enumerate()
            .filter(|(i, _)| !dropped[*i])
            .map(|(_, m)| m.clone())
            .collect();
        estimate_messages_tokens(&kept, cpt, margin) <= input_budget
    };

    'evict: for pass in [&evict_first, &keep_if_possible] {
        if within_budget(&dropped, &request.messages) {
            break 'evict;
        }
        for &idx in pass.iter() {
            if within_budget(&dropped, &request.messages) {
                break 'evict;
            }
            dropped[idx] = true;
        }
    }

    let dropped_snippets: Vec<String> = request
        .messages
        .iter()
        .enumerate()
        .filter(|(i, _)| dropped[*i])
        .map(|(_, m)| snippet(&m.content, SUMMARY_SNIPPET_CHARS))
        .collect();

    let mut kept: Vec<Message> = request
        .messages
        .iter()
        .enumerate()
        .filter(|(i, _)| !dropped[*i])
        .map(|(_, m)| m.clone())
        .collect();

    if !dropped_snippets.is_empty() {
        let tail: Vec<&String> =
            dropped_snippets.iter().rev().take(SUMMARY_MAX_SNIPPETS).collect::<Vec<_>>();
        let tail: Vec<&String> = tail.into_iter().rev().collect();
        let mut summary_text =
            format!("Earlier context (condensed):\n{}", tail.iter().map(|s| format!("- {s}")).collect::<Vec<_>>().join("\n"));

        // Shrink by 20% per round until the whole history fits, or the
        // summary itself is down to its floor.
        while summary_text.chars().count() > SUMMARY_SHRINK_FLOOR {
            let mut probe = kept.clone();
            insert_summary(&mut probe, &summary_text);
            if estimate_messages_tokens(&probe, cpt, margin) <= input_budget {
                break;
            }
            let target_len = (summary_text.chars().count() as f64 * 0.8).floor() as usize;
            let target_len = target_len.max(SUMMARY_SHRINK_FLOOR);
            if target_len >= summary_text.chars().count() {
                break;
            }
            summary_text = snippet(&summary_text, target_len);
        }

        insert_summary(&mut kept, &summary_text);
    }

    let available_output = (config.context_limit as i64
        - estimate_messages_tokens(&kept, cpt, margin) as i64
        - config.completion_safety_buffer as i64)
        .max(1) as u32;

    let continuation_output_target = if request.is_first_continuation {
        available_output
    } else {
        match request.last_completion_tokens {
            Some(last) => {
                let capped = ((last as f64) * CONTINUATION_GROWTH).ceil() as u32;
                available_output.min(capped)
            }
            None => available_output,
        }
    };

    CompactResult { messages: kept, continuation_output_target }
}

fn insert_summary(messages: &mut Vec<Message>, summary_text: &str) {
    let insert_at = messages
        .iter()
        .rposition(|m| m.role == Role::System)
        .map(|pos| pos + 1)
        .unwrap_or(0);
    messages.insert(insert_at, Message::system(summary_text.to_string()));
}

fn snippet(text: &str, max_chars: usize) -> String {
    let char_count = text.chars().count();
    if char_count <= max_chars {
        return text.to_string();
    }
    if max_chars <= 3 {
        return "...".chars().take(max_chars).collect();
    }
    let kept: String = text.chars().take(max_chars - 3).collect();
    format!("{kept}...")
}

/// Exposed for callers that want `build_messages`-style usage numbers
/// without going through the full assembler (e.g. the agent loop reporting
/// actual usage after a completion).
pub fn estimate(text: &str, config: &ContextConfig) -> u32 {
    estimate_tokens(text, config.chars_per_token, config.safety_margin)
}

#[cfg(test)]
#[path = "compact_tests.rs"]
mod tests;
