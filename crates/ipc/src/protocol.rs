// SPDX-License-Identifier: MIT

//! Inbound wire shape (spec §6): `{type, content, clientId?}`. The gateway
//! builds this from whatever JSON a client line contains; a line that
//! fails to parse, or parses but lacks a string `type`, never becomes an
//! [`InboundLine`] — see [`parse_inbound_line`].

use serde_json::Value;

#[derive(Debug, Clone)]
pub struct InboundLine {
    pub r#type: String,
    pub content: Value,
}

/// Parse one newline-delimited JSON line into an [`InboundLine`]. Returns
/// `None` for a parse failure or a missing/non-string `type` — the gateway
/// discards both rather than closing the connection (spec §4.6).
pub fn parse_inbound_line(line: &str) -> Option<InboundLine> {
    let value: Value = serde_json::from_str(line).ok()?;
    let r#type = value.get("type")?.as_str()?.to_string();
    let content = value.get("content").cloned().unwrap_or(Value::Null);
    Some(InboundLine { r#type, content })
}

#[cfg(test)]
#[path = "protocol_tests.rs"]
mod tests;
