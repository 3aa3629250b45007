//! Tests for the full validation pipeline.

use super::*;
use crate::schema::*;

#[test]
fn default_config_validates() {
    let config = ChameleonConfig::default();
    assert!(validate(&config).is_ok());
}

#[test]
fn catches_bad_sessions_path() {
    let mut config = ChameleonConfig::default();
    config.store.sessions_path = "chat/sessions".into();
    let err = validate(&config).unwrap_err().to_string();
    assert!(err.contains("store.sessions_path"));
}

#[test]
fn catches_empty_sessions_path() {
    let mut config = ChameleonConfig::default();
    config.store.sessions_path = String::new();
    let err = validate(&config).unwrap_err().to_string();
    assert!(err.contains("store.sessions_path"));
}

#[test]
fn catches_candidate_limit_zero() {
    let mut config = ChameleonConfig::default();
    config.matchmaking.candidate_limit = 0;
    let err = validate(&config).unwrap_err().to_string();
    assert!(err.contains("matchmaking.candidate_limit"));
}

#[test]
fn catches_typing_timeout_too_short() {
    let mut config = ChameleonConfig::default();
    config.typing.timeout_ms = 100;
    let err = validate(&config).unwrap_err().to_string();
    assert!(err.contains("typing.timeout_ms"));
}

#[test]
fn catches_retry_base_above_max() {
    let mut config = ChameleonConfig::default();
    config.retry.base_delay_ms = 5000;
    config.retry.max_delay_ms = 1000;
    let err = validate(&config).unwrap_err().to_string();
    assert!(err.contains("exceeds retry.max_delay_ms"));
}

#[test]
fn catches_lease_too_short() {
    let mut config = ChameleonConfig::default();
    config.presence.lease_secs = 1;
    let err = validate(&config).unwrap_err().to_string();
    assert!(err.contains("presence.lease_secs"));
}

#[test]
fn catches_empty_log_level() {
    let mut config = ChameleonConfig::default();
    config.logging.level = "  ".into();
    let err = validate(&config).unwrap_err().to_string();
    assert!(err.contains("logging.level"));
}

#[test]
fn collects_multiple_errors() {
    let mut config = ChameleonConfig::default();
    config.sim.clients = 1;
    config.janitor.closed_grace_secs = 1;
    let err = validate(&config).unwrap_err().to_string();
    assert!(err.contains("sim.clients"));
    assert!(err.contains("janitor.closed_grace_secs"));
}
