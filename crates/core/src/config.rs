// SPDX-License-Identifier: MIT

//! Centralized environment variable access, shared by the daemon and CLI.
//!
//! Every getter returns a typed value with a documented default. A
//! malformed value is logged and ignored rather than causing a panic or
//! a hard error — a bad env var should never keep the daemon from starting.

use std::path::PathBuf;
use std::time::Duration;

/// State directory: `FERRETBOT_STATE_DIR` > `XDG_STATE_HOME/ferretbot` >
/// `~/.local/state/ferretbot`.
pub fn state_dir() -> Option<PathBuf> {
    if let Ok(dir) = std::env::var("FERRETBOT_STATE_DIR") {
        return Some(PathBuf::from(dir));
    }
    if let Ok(xdg) = std::env::var("XDG_STATE_HOME") {
        return Some(PathBuf::from(xdg).join("ferretbot"));
    }
    std::env::var("HOME")
        .ok()
        .map(|home| PathBuf::from(home).join(".local/state/ferretbot"))
}

/// Unix socket path: `FERRETBOT_SOCKET` > `<state_dir>/ferretbot.sock`.
pub fn socket_path() -> Option<PathBuf> {
    if let Ok(path) = std::env::var("FERRETBOT_SOCKET") {
        return Some(PathBuf::from(path));
    }
    state_dir().map(|dir| dir.join("ferretbot.sock"))
}

/// TCP port for remote connections. When set, the daemon listens on this
/// port alongside the Unix socket.
pub fn tcp_port() -> Option<u16> {
    match std::env::var("FERRETBOT_TCP_PORT") {
        Ok(raw) => match raw.parse::<u16>() {
            Ok(port) => Some(port),
            Err(_) => {
                tracing::warn!(value = %raw, "FERRETBOT_TCP_PORT is not a valid port, ignoring");
                None
            }
        },
        Err(_) => None,
    }
}

/// IPC client idle timeout, default 5s.
pub fn ipc_timeout() -> Duration {
    parse_ms_env("FERRETBOT_IPC_TIMEOUT_MS").unwrap_or(Duration::from_millis(5000))
}

/// Context assembler input token budget override.
pub fn context_limit() -> Option<u32> {
    parse_u32_env("FERRETBOT_CONTEXT_LIMIT")
}

/// Context assembler output reserve override.
pub fn output_reserve() -> Option<u32> {
    parse_u32_env("FERRETBOT_OUTPUT_RESERVE")
}

/// Base URL of the HTTP `Provider` implementation.
pub fn provider_url() -> Option<String> {
    std::env::var("FERRETBOT_PROVIDER_URL").ok().filter(|s| !s.is_empty())
}

/// API key for the HTTP `Provider` implementation.
pub fn provider_api_key() -> Option<String> {
    std::env::var("FERRETBOT_PROVIDER_API_KEY")
        .ok()
        .filter(|s| !s.is_empty())
}

fn parse_ms_env(name: &str) -> Option<Duration> {
    match std::env::var(name) {
        Ok(raw) => match raw.parse::<u64>() {
            Ok(ms) => Some(Duration::from_millis(ms)),
            Err(_) => {
                tracing::warn!(%name, value = %raw, "not a valid integer, ignoring");
                None
            }
        },
        Err(_) => None,
    }
}

fn parse_u32_env(name: &str) -> Option<u32> {
    match std::env::var(name) {
        Ok(raw) => match raw.parse::<u32>() {
            Ok(v) => Some(v),
            Err(_) => {
                tracing::warn!(%name, value = %raw, "not a valid integer, ignoring");
                None
            }
        },
        Err(_) => None,
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
