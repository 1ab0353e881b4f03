// SPDX-License-Identifier: MIT

//! The event envelope shape shared by the bus, IPC gateway, and every
//! subscriber (spec §3).
//!
//! Producers build a [`PartialEnvelope`] naming only what they know; the bus
//! fills in `channel`, `session_id`, and `timestamp_ms` defaults on `emit`
//! so no handler has to special-case a missing field.

use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const DEFAULT_CHANNEL: &str = "system";
pub const DEFAULT_SESSION_ID: &str = "default";

/// A fully-resolved event, as delivered to subscribers and over IPC.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Envelope {
    pub r#type: String,
    pub content: Value,
    #[serde(default = "default_channel")]
    pub channel: String,
    #[serde(default = "default_session_id")]
    pub session_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
    pub timestamp_ms: u64,
}

fn default_channel() -> String {
    DEFAULT_CHANNEL.to_string()
}

fn default_session_id() -> String {
    DEFAULT_SESSION_ID.to_string()
}

impl Envelope {
    pub fn new(r#type: impl Into<String>, content: Value, timestamp_ms: u64) -> Self {
        Self {
            r#type: r#type.into(),
            content,
            channel: default_channel(),
            session_id: default_session_id(),
            client_id: None,
            timestamp_ms,
        }
    }
}

/// What a producer supplies before the bus stamps in defaults.
#[derive(Debug, Clone, Default)]
pub struct PartialEnvelope {
    pub r#type: String,
    pub content: Value,
    pub channel: Option<String>,
    pub session_id: Option<String>,
    pub client_id: Option<String>,
}

impl PartialEnvelope {
    pub fn new(r#type: impl Into<String>, content: Value) -> Self {
        Self {
            r#type: r#type.into(),
            content,
            channel: None,
            session_id: None,
            client_id: None,
        }
    }

    pub fn channel(mut self, channel: impl Into<String>) -> Self {
        self.channel = Some(channel.into());
        self
    }

    pub fn session_id(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    pub fn client_id(mut self, client_id: impl Into<String>) -> Self {
        self.client_id = Some(client_id.into());
        self
    }

    /// Resolve into a full [`Envelope`], filling defaults and stamping the time.
    pub fn into_envelope(self, timestamp_ms: u64) -> Envelope {
        Envelope {
            r#type: self.r#type,
            content: self.content,
            channel: self.channel.unwrap_or_else(default_channel),
            session_id: self.session_id.unwrap_or_else(default_session_id),
            client_id: self.client_id,
            timestamp_ms,
        }
    }
}

#[cfg(test)]
#[path = "envelope_tests.rs"]
mod tests;
