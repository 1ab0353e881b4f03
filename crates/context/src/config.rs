// SPDX-License-Identifier: MIT

//! Budget configuration (spec §4.5). All knobs have documented defaults so a
//! caller that passes `ContextConfig::default()` gets spec-compliant
//! behavior; operators can tune individual fields (e.g. for a tokenizer with
//! a different average chars-per-token ratio) without a code change.

/// Relative share of the input budget each fixed layer gets by default.
/// Weights need not sum to exactly 1.0 — whatever they total to is what the
/// default (non-override) allocation distributes across `input_budget`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LayerWeights {
    pub system: f64,
    pub step: f64,
    pub skills: f64,
    pub prior: f64,
    pub conversation: f64,
}

impl Default for LayerWeights {
    fn default() -> Self {
        Self { system: 0.15, step: 0.20, skills: 0.15, prior: 0.20, conversation: 0.30 }
    }
}

/// Explicit per-layer token budgets a caller may supply instead of the
/// config's default weights. Any layer left `None` falls back to its
/// weighted share of `input_budget`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LayerBudgets {
    pub system: Option<u32>,
    pub step: Option<u32>,
    pub skills: Option<u32>,
    pub prior: Option<u32>,
    pub conversation: Option<u32>,
}

/// Budget and estimation configuration for a [`crate::ContextAssembler`].
#[derive(Debug, Clone, PartialEq)]
pub struct ContextConfig {
    /// Total model context window, in estimated tokens. Default 32000.
    pub context_limit: u32,
    /// Tokens reserved for the model's own output, clamped to `[256, 4096]`.
    /// Defaults to `ceil(context_limit * 0.15)`.
    pub output_reserve: u32,
    /// Extra slack subtracted from `max_output_tokens` beyond the input
    /// usage, so a slightly-off estimate can never push the model past its
    /// real window. Default 32.
    pub completion_safety_buffer: u32,
    /// Average characters per token used by [`crate::estimate_tokens`].
    /// Default 4.0.
    pub chars_per_token: f64,
    /// Multiplier applied on top of the raw chars/token estimate to keep a
    /// margin against undercounting. Default 1.1.
    pub safety_margin: f64,
    /// Default per-layer weights, applied when a request doesn't supply an
    /// explicit [`LayerBudgets`] override for a given layer.
    pub layer_weights: LayerWeights,
    /// Minimum token budget preserved for the system layer, so even a very
    /// small `context_limit` still renders a usable system prompt (the
    /// "message sequence begins with a rendered system prompt" guarantee).
    pub minimum_system_tokens: u32,
}

const MIN_OUTPUT_RESERVE: u32 = 256;
const MAX_OUTPUT_RESERVE: u32 = 4096;

impl ContextConfig {
    /// Build a config with the spec's default `context_limit` and a derived
    /// `output_reserve`.
    pub fn with_context_limit(context_limit: u32) -> Self {
        let mut config = Self { context_limit, ..Self::default() };
        config.output_reserve = Self::default_output_reserve(context_limit);
        config
    }

    pub fn default_output_reserve(context_limit: u32) -> u32 {
        let raw = (context_limit as f64 * 0.15).ceil() as u32;
        raw.clamp(MIN_OUTPUT_RESERVE, MAX_OUTPUT_RESERVE)
    }

    /// Tokens available for input content after the output reserve.
    pub fn input_budget(&self) -> u32 {
        self.context_limit.saturating_sub(self.output_reserve)
    }
}

impl Default for ContextConfig {
    fn default() -> Self {
        let context_limit = 32_000;
        Self {
            context_limit,
            output_reserve: Self::default_output_reserve(context_limit),
            completion_safety_buffer: 32,
            chars_per_token: 4.0,
            safety_margin: 1.1,
            layer_weights: LayerWeights::default(),
            minimum_system_tokens: 32,
        }
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
