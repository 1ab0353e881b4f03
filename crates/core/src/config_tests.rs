// SPDX-License-Identifier: MIT

use super::*;
use parking_lot::Mutex;

// Environment variables are process-global; serialize tests that touch them
// so parallel test threads don't stomp on each other.
static ENV_LOCK: Mutex<()> = Mutex::new(());

fn with_env<F: FnOnce()>(vars: &[(&str, Option<&str>)], f: F) {
    let _guard = ENV_LOCK.lock();
    let previous: Vec<(&str, Option<String>)> =
        vars.iter().map(|(k, _)| (*k, std::env::var(k).ok())).collect();

    for (k, v) in vars {
        match v {
            Some(val) => std::env::set_var(k, val),
            None => std::env::remove_var(k),
        }
    }

    f();

    for (k, v) in previous {
        match v {
            Some(val) => std::env::set_var(k, val),
            None => std::env::remove_var(k),
        }
    }
}

#[test]
fn state_dir_prefers_explicit_override() {
    with_env(
        &[
            ("FERRETBOT_STATE_DIR", Some("/tmp/explicit-state")),
            ("XDG_STATE_HOME", Some("/tmp/xdg")),
        ],
        || {
            assert_eq!(state_dir(), Some(PathBuf::from("/tmp/explicit-state")));
        },
    );
}

#[test]
fn state_dir_falls_back_to_xdg() {
    with_env(
        &[("FERRETBOT_STATE_DIR", None), ("XDG_STATE_HOME", Some("/tmp/xdg"))],
        || {
            assert_eq!(state_dir(), Some(PathBuf::from("/tmp/xdg/ferretbot")));
        },
    );
}

#[test]
fn socket_path_derives_from_state_dir() {
    with_env(
        &[
            ("FERRETBOT_SOCKET", None),
            ("FERRETBOT_STATE_DIR", Some("/tmp/explicit-state")),
        ],
        || {
            assert_eq!(
                socket_path(),
                Some(PathBuf::from("/tmp/explicit-state/ferretbot.sock"))
            );
        },
    );
}

#[test]
fn socket_path_prefers_explicit_override() {
    with_env(&[("FERRETBOT_SOCKET", Some("/tmp/custom.sock"))], || {
        assert_eq!(socket_path(), Some(PathBuf::from("/tmp/custom.sock")));
    });
}

#[test]
fn tcp_port_parses_valid_value() {
    with_env(&[("FERRETBOT_TCP_PORT", Some("9901"))], || {
        assert_eq!(tcp_port(), Some(9901));
    });
}

#[test]
fn tcp_port_falls_back_to_none_on_malformed_value() {
    with_env(&[("FERRETBOT_TCP_PORT", Some("not-a-port"))], || {
        assert_eq!(tcp_port(), None);
    });
}

#[test]
fn tcp_port_is_none_when_unset() {
    with_env(&[("FERRETBOT_TCP_PORT", None)], || {
        assert_eq!(tcp_port(), None);
    });
}

#[test]
fn ipc_timeout_defaults_to_five_seconds() {
    with_env(&[("FERRETBOT_IPC_TIMEOUT_MS", None)], || {
        assert_eq!(ipc_timeout(), Duration::from_millis(5000));
    });
}

#[test]
fn ipc_timeout_honors_override() {
    with_env(&[("FERRETBOT_IPC_TIMEOUT_MS", Some("1500"))], || {
        assert_eq!(ipc_timeout(), Duration::from_millis(1500));
    });
}

#[test]
fn context_limit_and_output_reserve_parse_when_set() {
    with_env(
        &[
            ("FERRETBOT_CONTEXT_LIMIT", Some("8000")),
            ("FERRETBOT_OUTPUT_RESERVE", Some("512")),
        ],
        || {
            assert_eq!(context_limit(), Some(8000));
            assert_eq!(output_reserve(), Some(512));
        },
    );
}

#[test]
fn provider_url_and_key_filter_empty_strings() {
    with_env(
        &[("FERRETBOT_PROVIDER_URL", Some("")), ("FERRETBOT_PROVIDER_API_KEY", Some(""))],
        || {
            assert_eq!(provider_url(), None);
            assert_eq!(provider_api_key(), None);
        },
    );
}

#[test]
fn provider_url_and_key_pass_through_when_set() {
    with_env(
        &[
            ("FERRETBOT_PROVIDER_URL", Some("https://example.test")),
            ("FERRETBOT_PROVIDER_API_KEY", Some("secret")),
        ],
        || {
            assert_eq!(provider_url(), Some("https://example.test".to_string()));
            assert_eq!(provider_api_key(), Some("secret".to_string()));
        },
    );
}
