use super::*;
use crate::config::ContextConfig;
use crate::message::{Message, Role};

fn tiny_config() -> ContextConfig {
    let mut config = ContextConfig::with_context_limit(400);
    config.output_reserve = 256;
    config
}

#[test]
fn keeps_system_tool_and_last_two_even_under_pressure() {
    let config = tiny_config();
    let mut messages = vec![Message::system("system prompt")];
    for i in 0..20 {
        messages.push(Message::user(format!("user turn {i} {}", "padding ".repeat(20))));
    }
    messages.push(Message::tool("tool result"));
    messages.push(Message::assistant("final assistant reply"));

    let request =
        CompactRequest { messages: messages.clone(), is_first_continuation: true, last_completion_tokens: None };
    let result = compact(&request, &config);

    let last_two = &messages[messages.len() - 2..];
    for m in last_two {
        assert!(result.messages.contains(m), "last two messages must survive compaction");
    }
    assert!(result.messages.iter().any(|m| m.role == Role::Tool), "tool message must survive");
}

#[test]
fn synthesized_summary_is_inserted_after_last_system_message() {
    let config = tiny_config();
    let mut messages = vec![Message::system("system prompt")];
    for i in 0..30 {
        messages.push(Message::user(format!("turn {i} {}", "x".repeat(50))));
    }
    messages.push(Message::assistant("final reply"));

    let request =
        CompactRequest { messages, is_first_continuation: true, last_completion_tokens: None };
    let result = compact(&request, &config);

    let last_system_idx = result.messages.iter().rposition(|m| m.role == Role::System).unwrap();
    assert!(result.messages[last_system_idx].content.contains("Earlier context"));
}

#[test]
fn continuation_target_uncapped_on_first_continuation() {
    let config = tiny_config();
    let messages = vec![Message::system("s"), Message::user("hi"), Message::assistant("ok")];
    let request =
        CompactRequest { messages, is_first_continuation: true, last_completion_tokens: Some(10) };
    let result = compact(&request, &config);
    assert!(result.continuation_output_target > 0);
}

#[test]
fn continuation_target_capped_on_later_continuation() {
    let config = tiny_config();
    let messages = vec![Message::system("s"), Message::user("hi"), Message::assistant("ok")];
    let request =
        CompactRequest { messages, is_first_continuation: false, last_completion_tokens: Some(10) };
    let result = compact(&request, &config);
    // ceil(10 * 1.8) = 18
    assert!(result.continuation_output_target <= 18);
}

#[test]
fn no_dropped_messages_means_no_summary_inserted() {
    let config = ContextConfig::with_context_limit(32_000);
    let messages = vec![Message::system("s"), Message::user("hi"), Message::assistant("ok")];
    let request =
        CompactRequest { messages, is_first_continuation: true, last_completion_tokens: None };
    let result = compact(&request, &config);
    assert!(!result.messages.iter().any(|m| m.content.contains("Earlier context")));
}
