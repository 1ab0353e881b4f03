// SPDX-License-Identifier: MIT

//! `ContextAssembler::build_messages` (spec §4.5): layered, token-budgeted
//! prompt construction.

use std::collections::HashMap;

use crate::config::{ContextConfig, LayerBudgets};
use crate::message::{Message, Role};
use crate::tokens::{estimate_tokens, truncate_to_budget};

/// One turn of prior conversation, oldest-first as stored by the caller's
/// `SessionMemory`; the assembler itself walks them newest-first when
/// filling the conversation layer.
#[derive(Debug, Clone, PartialEq)]
pub struct ConversationTurn {
    pub role: Role,
    pub content: String,
}

/// Everything needed to build one model-ready message sequence.
#[derive(Debug, Clone, Default)]
pub struct BuildMessagesRequest {
    pub system_prompt: String,
    pub step_instruction: Option<String>,
    pub tool_schemas: Vec<String>,
    pub skill_content: Option<String>,
    pub prior_compressed: Option<String>,
    pub conversation_summary: Option<String>,
    pub conversation: Vec<ConversationTurn>,
    pub user_input: Option<String>,
    pub layer_budgets: LayerBudgets,
}

/// Per-layer token accounting. A plain map rather than a fixed struct so the
/// `user_input` bucket (which rides along with, but isn't itself a weighted
/// layer) can be recorded without a special case at the call site.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TokenUsage {
    pub layers: HashMap<String, u32>,
    pub used_input_tokens: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Assembled {
    pub messages: Vec<Message>,
    pub token_usage: TokenUsage,
    pub max_output_tokens: u32,
}

#[derive(Debug, Clone)]
pub struct ContextAssembler {
    config: ContextConfig,
}

struct LayerPlan {
    name: &'static str,
    budget: u32,
}

impl ContextAssembler {
    pub fn new(config: ContextConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ContextConfig {
        &self.config
    }

    /// Resolve the token budget for each of the four fixed layers, honoring
    /// explicit overrides and scaling proportionally (with the rounding
    /// remainder handed to earlier layers) if the total would exceed
    /// `input_budget`.
    fn layer_plans(&self, overrides: &LayerBudgets, input_budget: u32) -> Vec<LayerPlan> {
        let w = &self.config.layer_weights;
        let budget_f = input_budget as f64;
        let mut raw: Vec<(&'static str, f64)> = vec![
            ("system", overrides.system.map(|v| v as f64).unwrap_or(w.system * budget_f)),
            ("step", overrides.step.map(|v| v as f64).unwrap_or(w.step * budget_f)),
            ("skills", overrides.skills.map(|v| v as f64).unwrap_or(w.skills * budget_f)),
            ("prior", overrides.prior.map(|v| v as f64).unwrap_or(w.prior * budget_f)),
        ];

        let total: f64 = raw.iter().map(|(_, v)| *v).sum();
        if total > budget_f && total > 0.0 {
            let scale = budget_f / total;
            for (_, v) in raw.iter_mut() {
                *v *= scale;
            }
        }

        // Floor every layer, then hand the leftover remainder (from
        // flooring) to the layers in order so the sum matches exactly —
        // deterministic rather than left for the caller to notice a gap.
        let mut plans: Vec<LayerPlan> =
            raw.iter().map(|(name, v)| LayerPlan { name, budget: v.floor().max(0.0) as u32 }).collect();
        let floored_sum: u32 = plans.iter().map(|p| p.budget).sum();
        let target = total.min(budget_f).round() as u32;
        let mut remainder = target.saturating_sub(floored_sum);
        let mut i = 0;
        while remainder > 0 && !plans.is_empty() {
            plans[i % plans.len()].budget += 1;
            remainder -= 1;
            i += 1;
        }

        // Guarantee the system layer can always render at least a short
        // prompt, even under a tiny context_limit (scenario 6's "message
        // sequence begins with the rendered system prompt").
        if plans[0].budget < self.config.minimum_system_tokens {
            plans[0].budget = self.config.minimum_system_tokens.min(input_budget);
        }

        plans
    }

    /// Build the budgeted message sequence for one request.
    pub fn build_messages(&self, request: &BuildMessagesRequest) -> Assembled {
        let input_budget = self.config.input_budget();
        let cpt = self.config.chars_per_token;
        let margin = self.config.safety_margin;

        let plans = self.layer_plans(&request.layer_budgets, input_budget);
        let mut remaining = input_budget;
        let mut layers: HashMap<String, u32> = HashMap::new();
        let mut messages = Vec::new();

        for plan in &plans {
            let slice = plan.budget.min(remaining);
            let raw_content = match plan.name {
                "system" => Some(request.system_prompt.clone()),
                "step" => request.step_instruction.as_ref().map(|instruction| {
                    render_step_layer(instruction, &request.tool_schemas)
                }),
                "skills" => request.skill_content.as_ref().map(|s| format!("Skill content:\n{s}")),
                "prior" => render_prior_layer(
                    request.prior_compressed.as_deref(),
                    request.conversation_summary.as_deref(),
                ),
                _ => None,
            };

            let Some(content) = raw_content else {
                layers.insert(plan.name.to_string(), 0);
                continue;
            };
            if content.is_empty() {
                layers.insert(plan.name.to_string(), 0);
                continue;
            }

            let truncated = truncate_to_budget(&content, slice, cpt, margin);
            let used = estimate_tokens(&truncated, cpt, margin);
            layers.insert(plan.name.to_string(), used);
            remaining = remaining.saturating_sub(used.min(slice));
            messages.push(Message::system(truncated));
        }

        // Conversation gets whatever's left of the input budget, filled
        // newest-to-oldest then reversed back to chronological order.
        let conversation_override = request.layer_budgets.conversation;
        let conversation_weighted =
            (self.config.layer_weights.conversation * input_budget as f64).round() as u32;
        let conversation_budget = conversation_override.unwrap_or(conversation_weighted).min(remaining);

        let mut selected: Vec<&ConversationTurn> = Vec::new();
        let mut used_conversation = 0u32;
        for turn in request.conversation.iter().rev() {
            let cost = estimate_tokens(&turn.content, cpt, margin);
            if used_conversation + cost > conversation_budget {
                break;
            }
            used_conversation += cost;
            selected.push(turn);
        }
        selected.reverse();
        for turn in &selected {
            messages.push(Message::new(turn.role, turn.content.clone()));
        }
        layers.insert("conversation".to_string(), used_conversation);
        remaining = remaining.saturating_sub(used_conversation);

        // The live user input is never dropped for budget reasons — it's
        // the thing the whole request exists to answer — but it still
        // counts toward usedInputTokens so the layer-sum invariant holds.
        let user_input_tokens = match request.user_input.as_deref() {
            Some(text) if !text.is_empty() => {
                messages.push(Message::user(text));
                estimate_tokens(text, cpt, margin)
            }
            _ => 0,
        };
        layers.insert("user_input".to_string(), user_input_tokens);
        let _ = remaining.saturating_sub(user_input_tokens);

        let used_input_tokens: u32 = layers.values().sum();
        let max_output_tokens = (self.config.context_limit as i64
            - used_input_tokens as i64
            - self.config.completion_safety_buffer as i64)
            .max(1) as u32;

        Assembled {
            messages,
            token_usage: TokenUsage { layers, used_input_tokens },
            max_output_tokens,
        }
    }
}

fn render_step_layer(instruction: &str, tool_schemas: &[String]) -> String {
    if tool_schemas.is_empty() {
        instruction.to_string()
    } else {
        format!("{instruction}\n\nAvailable tools:\n{}", tool_schemas.join("\n"))
    }
}

fn render_prior_layer(prior_compressed: Option<&str>, conversation_summary: Option<&str>) -> Option<String> {
    match (prior_compressed, conversation_summary) {
        (None, None) => None,
        (Some(p), None) => Some(p.to_string()),
        (None, Some(s)) => Some(s.to_string()),
        (Some(p), Some(s)) => Some(format!("{p}\n\n{s}")),
    }
}

#[cfg(test)]
#[path = "assembler_tests.rs"]
mod tests;
