use super::*;

#[test]
fn default_config_matches_spec_defaults() {
    let config = ContextConfig::default();
    assert_eq!(config.context_limit, 32_000);
    assert_eq!(config.output_reserve, 4_096); // ceil(32000 * 0.15) clamped to 4096
    assert_eq!(config.completion_safety_buffer, 32);
    assert_eq!(config.chars_per_token, 4.0);
    assert_eq!(config.safety_margin, 1.1);
}

#[test]
fn output_reserve_clamps_to_minimum() {
    assert_eq!(ContextConfig::default_output_reserve(100), 256);
}

#[test]
fn output_reserve_clamps_to_maximum() {
    assert_eq!(ContextConfig::default_output_reserve(1_000_000), 4_096);
}

#[test]
fn input_budget_is_context_limit_minus_output_reserve() {
    let config = ContextConfig::with_context_limit(2000);
    assert_eq!(config.output_reserve, 300); // ceil(2000*0.15)=300, within clamp range
    assert_eq!(config.input_budget(), 1700);
}

#[test]
fn explicit_small_context_respects_scenario_six_budgets() {
    let mut config = ContextConfig::with_context_limit(2000);
    config.output_reserve = 500;
    assert_eq!(config.input_budget(), 1500);
}
