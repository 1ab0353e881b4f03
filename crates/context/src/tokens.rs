// SPDX-License-Identifier: MIT

//! Token estimation (spec §4.5): `ceil((chars / charsPerToken) * safetyMargin)`.
//! There is no real tokenizer in this crate — providers that can count tokens
//! exactly do so through their own `count_tokens`; this is the budgeting
//! fallback used everywhere else.

use crate::message::Message;

/// Estimate the token cost of a string under the given ratios.
pub fn estimate_tokens(text: &str, chars_per_token: f64, safety_margin: f64) -> u32 {
    if text.is_empty() {
        return 0;
    }
    let chars = text.chars().count() as f64;
    (chars / chars_per_token * safety_margin).ceil() as u32
}

/// Estimate the total token cost of a message sequence.
pub fn estimate_messages_tokens(
    messages: &[Message],
    chars_per_token: f64,
    safety_margin: f64,
) -> u32 {
    messages.iter().map(|m| estimate_tokens(&m.content, chars_per_token, safety_margin)).sum()
}

/// Invert the estimation formula: the largest character count whose
/// estimated token cost does not exceed `token_budget`.
pub fn chars_for_token_budget(token_budget: u32, chars_per_token: f64, safety_margin: f64) -> usize {
    if token_budget == 0 {
        return 0;
    }
    ((token_budget as f64) * chars_per_token / safety_margin).floor().max(0.0) as usize
}

/// Truncate `text` to fit within `token_budget` tokens, appending a `...`
/// sentinel when truncation actually occurs.
pub fn truncate_to_budget(
    text: &str,
    token_budget: u32,
    chars_per_token: f64,
    safety_margin: f64,
) -> String {
    if estimate_tokens(text, chars_per_token, safety_margin) <= token_budget {
        return text.to_string();
    }
    let char_budget = chars_for_token_budget(token_budget, chars_per_token, safety_margin);
    if char_budget <= 3 {
        return "...".chars().take(char_budget).collect();
    }
    let keep = char_budget - 3;
    let truncated: String = text.chars().take(keep).collect();
    format!("{truncated}...")
}

#[cfg(test)]
#[path = "tokens_tests.rs"]
mod tests;
