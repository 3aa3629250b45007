//! Tests for TOML config loading, creation, and path resolution.

use super::*;
use std::path::Path;

#[test]
fn load_from_nonexistent_returns_file_not_found() {
    let result = load_from_path(Path::new("/tmp/nonexistent_chameleon_config.toml"));
    let err = result.unwrap_err();
    assert!(matches!(err, chameleon_common::ConfigError::FileNotFound(_)));
}

#[test]
fn load_valid_partial_toml() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(
        &path,
        r#"
[matchmaking]
candidate_limit = 10

[typing]
timeout_ms = 1500
"#,
    )
    .unwrap();

    let config = load_from_path(&path).unwrap();
    assert_eq!(config.matchmaking.candidate_limit, 10);
    assert_eq!(config.typing.timeout_ms, 1500);
    // Defaults preserved
    assert!(config.matchmaking.cleanup_stale_self_sessions);
    assert_eq!(config.store.sessions_path, "sessions");
}

#[test]
fn load_invalid_toml_returns_parse_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(&path, "this is not valid toml {{{").unwrap();

    let err = load_from_path(&path).unwrap_err();
    assert!(matches!(err, chameleon_common::ConfigError::ParseError(_)));
}

#[test]
fn load_config_with_invalid_values_is_returned_as_parsed() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(
        &path,
        r#"
[typing]
timeout_ms = 10
"#,
    )
    .unwrap();

    let config = load_from_path(&path).unwrap();
    assert_eq!(config.typing.timeout_ms, 10);
}

#[test]
fn create_and_load_default_config() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("chameleon").join("config.toml");

    assert!(create_default_config(&path).unwrap());
    assert!(path.exists());

    let config = load_from_path(&path).unwrap();
    assert_eq!(config.typing.timeout_ms, 3000);
    assert_eq!(config.store.sessions_path, "sessions");
}

#[test]
fn default_config_toml_is_valid() {
    use super::template::default_config_toml;
    use crate::schema::ChameleonConfig;

    let config: ChameleonConfig = toml::from_str(&default_config_toml()).unwrap();
    assert!(crate::validation::validate(&config).is_ok());
}

#[test]
fn default_config_path_is_reasonable() {
    if std::env::var_os(CONFIG_PATH_ENV).is_some() {
        return;
    }
    if let Ok(path) = default_config_path() {
        let path_str = path.to_string_lossy();
        assert!(path_str.contains("chameleon"));
        assert!(path_str.ends_with("config.toml"));
    }
}

#[test]
fn create_default_config_keeps_existing_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(&path, "[typing]\ntimeout_ms = 4000\n").unwrap();

    assert!(!create_default_config(&path).unwrap());
    let config = load_from_path(&path).unwrap();
    assert_eq!(config.typing.timeout_ms, 4000);
}

#[test]
fn parse_error_names_the_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("broken.toml");
    std::fs::write(&path, "[typing]\ntimeout_ms = \"soon\"\n").unwrap();

    let err = load_from_path(&path).unwrap_err();
    assert!(err.to_string().contains("broken.toml"));
}
