// SPDX-License-Identifier: MIT

use super::*;
use serde_json::json;

#[test]
fn partial_envelope_fills_defaults_on_resolve() {
    let partial = PartialEnvelope::new("workflow_step_started", json!({"stepId": "s1"}));
    let env = partial.into_envelope(42);

    assert_eq!(env.channel, DEFAULT_CHANNEL);
    assert_eq!(env.session_id, DEFAULT_SESSION_ID);
    assert_eq!(env.client_id, None);
    assert_eq!(env.timestamp_ms, 42);
}

#[test]
fn partial_envelope_preserves_explicit_fields() {
    let partial = PartialEnvelope::new("chat_message", json!({"text": "hi"}))
        .channel("chat")
        .session_id("sess-1")
        .client_id("client-abc");
    let env = partial.into_envelope(7);

    assert_eq!(env.channel, "chat");
    assert_eq!(env.session_id, "sess-1");
    assert_eq!(env.client_id.as_deref(), Some("client-abc"));
}

#[test]
fn envelope_round_trips_through_json() {
    let env = Envelope::new("system_hello", json!({"clientId": "c1"}), 100);
    let encoded = serde_json::to_string(&env).expect("serialize");
    let decoded: Envelope = serde_json::from_str(&encoded).expect("deserialize");
    assert_eq!(env, decoded);
}

#[test]
fn envelope_deserializes_missing_channel_and_session_as_defaults() {
    let raw = r#"{"type":"ping","content":{},"timestamp_ms":1}"#;
    let env: Envelope = serde_json::from_str(raw).expect("deserialize");
    assert_eq!(env.channel, DEFAULT_CHANNEL);
    assert_eq!(env.session_id, DEFAULT_SESSION_ID);
    assert_eq!(env.client_id, None);
}

#[test]
fn envelope_omits_client_id_when_none_on_serialize() {
    let env = Envelope::new("ping", json!({}), 1);
    let encoded = serde_json::to_string(&env).expect("serialize");
    assert!(!encoded.contains("client_id"));
}
