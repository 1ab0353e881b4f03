// SPDX-License-Identifier: MIT

//! In-memory `SessionMemory` (spec §6). Original to this crate — no teacher
//! or pack counterpart keeps a rolling per-session transcript — built in the
//! `parking_lot::Mutex<HashMap<...>>` shared-state idiom used throughout
//! `oj-daemon` for its in-process tables.

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::Mutex;

use ferretbot_context::{ConversationTurn, Role};

/// A session's conversation, newest-appended, ready to feed into
/// `ContextAssembler::build_messages` as `conversation` plus an optional
/// `conversation_summary` once it's been compacted.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConversationContext {
    pub turns: Vec<ConversationTurn>,
    pub summary: Option<String>,
}

#[async_trait]
pub trait SessionMemory: Send + Sync {
    async fn collect_conversation(&self, session_id: &str, token_limit: usize) -> ConversationContext;

    /// Record one turn of conversation. Not part of spec §6's trait (the
    /// spec only reads memory back out), but `SessionMemory` needs some way
    /// to be filled in the first place, so `ferretbot-daemon`'s agent loop
    /// calls this after every `Provider::chat_completion` round.
    async fn record_turn(&self, session_id: &str, role: Role, content: String);
}

struct SessionLog {
    turns: Vec<ConversationTurn>,
    summary: Option<String>,
}

/// Bounded ring buffer of turns per session. Once a session exceeds
/// `max_turns_per_session`, the oldest turn is dropped and folded into a
/// one-line summary placeholder rather than silently discarded, so a caller
/// reading back `summary` at least knows compaction happened.
pub struct InMemorySessionMemory {
    sessions: Mutex<HashMap<String, SessionLog>>,
    max_turns_per_session: usize,
}

impl InMemorySessionMemory {
    pub fn new(max_turns_per_session: usize) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            max_turns_per_session: max_turns_per_session.max(1),
        }
    }
}

impl Default for InMemorySessionMemory {
    fn default() -> Self {
        Self::new(200)
    }
}

#[async_trait]
impl SessionMemory for InMemorySessionMemory {
    async fn collect_conversation(&self, session_id: &str, token_limit: usize) -> ConversationContext {
        let sessions = self.sessions.lock();
        let Some(log) = sessions.get(session_id) else {
            return ConversationContext::default();
        };

        // Token accounting here mirrors `ferretbot-context`'s own
        // char-per-token estimate rather than importing it, since that
        // estimate is an internal detail of the assembler's budget module.
        const CHARS_PER_TOKEN: usize = 4;
        let mut selected = Vec::new();
        let mut used_tokens = 0usize;
        for turn in log.turns.iter().rev() {
            let cost = (turn.content.len() / CHARS_PER_TOKEN).max(1);
            if used_tokens + cost > token_limit && !selected.is_empty() {
                break;
            }
            used_tokens += cost;
            selected.push(turn.clone());
        }
        selected.reverse();

        ConversationContext {
            turns: selected,
            summary: log.summary.clone(),
        }
    }

    async fn record_turn(&self, session_id: &str, role: Role, content: String) {
        let mut sessions = self.sessions.lock();
        let log = sessions.entry(session_id.to_string()).or_insert_with(|| SessionLog {
            turns: Vec::new(),
            summary: None,
        });
        log.turns.push(ConversationTurn { role, content });
        if log.turns.len() > self.max_turns_per_session {
            log.turns.remove(0);
            log.summary = Some(format!(
                "{} earlier turn(s) in this session were dropped to stay within the in-memory ring buffer",
                log.turns.len().saturating_sub(self.max_turns_per_session) + 1
            ));
        }
    }
}

#[cfg(test)]
#[path = "memory_tests.rs"]
mod tests;
