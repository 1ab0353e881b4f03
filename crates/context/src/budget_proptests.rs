use proptest::prelude::*;

use crate::assembler::{BuildMessagesRequest, ContextAssembler, ConversationTurn};
use crate::config::{ContextConfig, LayerBudgets};
use crate::message::Role;

proptest! {
    /// Scaling never pushes usedInputTokens above input_budget, regardless
    /// of how oversubscribed the explicit layer overrides are.
    #[test]
    fn scaling_never_exceeds_input_budget(
        context_limit in 500u32..20_000,
        output_reserve in 100u32..2000,
        sys_over in 0u32..5000,
        step_over in 0u32..5000,
        skills_over in 0u32..5000,
        prior_over in 0u32..5000,
        text_len in 0usize..3000,
    ) {
        let mut config = ContextConfig::with_context_limit(context_limit);
        config.output_reserve = output_reserve.min(context_limit.saturating_sub(1)).max(1);
        let assembler = ContextAssembler::new(config.clone());

        let filler = "a".repeat(text_len);
        let request = BuildMessagesRequest {
            system_prompt: filler.clone(),
            step_instruction: Some(filler.clone()),
            skill_content: Some(filler.clone()),
            prior_compressed: Some(filler.clone()),
            conversation: vec![ConversationTurn { role: Role::User, content: filler.clone() }],
            user_input: Some(filler),
            layer_budgets: LayerBudgets {
                system: Some(sys_over),
                step: Some(step_over),
                skills: Some(skills_over),
                prior: Some(prior_over),
                conversation: None,
            },
        };

        let assembled = assembler.build_messages(&request);
        prop_assert!(assembled.token_usage.used_input_tokens <= config.input_budget() + config.minimum_system_tokens);
        prop_assert!(
            assembled.token_usage.used_input_tokens + assembled.max_output_tokens + config.completion_safety_buffer
                <= config.context_limit + config.minimum_system_tokens
        );
    }
}
