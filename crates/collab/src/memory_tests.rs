// SPDX-License-Identifier: MIT

use super::*;

#[tokio::test]
async fn unknown_session_returns_empty_context() {
    let memory = InMemorySessionMemory::default();
    let ctx = memory.collect_conversation("s1", 1000).await;
    assert_eq!(ctx, ConversationContext::default());
}

#[tokio::test]
async fn recorded_turns_come_back_in_order() {
    let memory = InMemorySessionMemory::default();
    memory.record_turn("s1", Role::User, "hi".to_string()).await;
    memory.record_turn("s1", Role::Assistant, "hello".to_string()).await;

    let ctx = memory.collect_conversation("s1", 10_000).await;
    assert_eq!(ctx.turns.len(), 2);
    assert_eq!(ctx.turns[0].content, "hi");
    assert_eq!(ctx.turns[1].content, "hello");
}

#[tokio::test]
async fn sessions_are_isolated() {
    let memory = InMemorySessionMemory::default();
    memory.record_turn("s1", Role::User, "for s1".to_string()).await;
    memory.record_turn("s2", Role::User, "for s2".to_string()).await;

    let ctx1 = memory.collect_conversation("s1", 10_000).await;
    assert_eq!(ctx1.turns.len(), 1);
    assert_eq!(ctx1.turns[0].content, "for s1");
}

#[tokio::test]
async fn a_tiny_token_limit_keeps_only_the_most_recent_turn() {
    let memory = InMemorySessionMemory::default();
    memory.record_turn("s1", Role::User, "a".repeat(400)).await;
    memory.record_turn("s1", Role::Assistant, "b".repeat(400)).await;

    let ctx = memory.collect_conversation("s1", 50).await;
    assert_eq!(ctx.turns.len(), 1);
    assert!(ctx.turns[0].content.starts_with('b'));
}

#[tokio::test]
async fn exceeding_the_ring_buffer_drops_the_oldest_turn_and_sets_a_summary() {
    let memory = InMemorySessionMemory::new(2);
    memory.record_turn("s1", Role::User, "first".to_string()).await;
    memory.record_turn("s1", Role::Assistant, "second".to_string()).await;
    memory.record_turn("s1", Role::User, "third".to_string()).await;

    let ctx = memory.collect_conversation("s1", 10_000).await;
    assert_eq!(ctx.turns.len(), 2);
    assert_eq!(ctx.turns[0].content, "second");
    assert_eq!(ctx.turns[1].content, "third");
    assert!(ctx.summary.is_some());
}
