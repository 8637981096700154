//! Tests for TOML config loading and path resolution.

use super::*;
use crate::ModelBackend;
use std::path::Path;

#[test]
fn load_from_nonexistent_returns_file_not_found() {
    let result = load_from_path(Path::new("/tmp/nonexistent_parley_config.toml"));
    let err = result.unwrap_err();
    assert!(matches!(err, parley_common::ConfigError::FileNotFound(_)));
}

#[test]
fn load_valid_partial_toml() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(
        &path,
        r#"
[session]
history_dir = "/var/lib/parley"
max_messages = 12

[model]
backend = "local"
path = "/models/tiny.gguf"
"#,
    )
    .unwrap();

    let config = load_from_path(&path).unwrap();
    assert_eq!(config.session.history_dir, Path::new("/var/lib/parley"));
    assert_eq!(config.session.max_messages, 12);
    assert_eq!(config.model.backend, ModelBackend::Local);
    assert_eq!(
        config.model.path.as_deref(),
        Some(Path::new("/models/tiny.gguf"))
    );
    // Defaults preserved
    assert!(config.session.auto_trim);
    assert_eq!(config.streaming.chunk_size, 50);
    assert_eq!(config.model.threads, 4);
}

#[test]
fn load_invalid_toml_returns_parse_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(&path, "this is not valid toml {{{").unwrap();

    let err = load_from_path(&path).unwrap_err();
    assert!(matches!(err, parley_common::ConfigError::ParseError(_)));
}

#[test]
fn load_wrong_type_returns_parse_error() {
    let err = parse_toml("[streaming]\nchunk_size = \"big\"\n").unwrap_err();
    assert!(err.to_string().contains("failed to parse TOML"));
}

#[test]
fn empty_document_yields_defaults() {
    let config = parse_toml("").unwrap();
    assert_eq!(config.session.max_messages, 40);
    assert_eq!(config.session.max_file_bytes, 2 * 1024 * 1024);
    assert!(!config.streaming.enabled);
    assert_eq!(config.generation.max_tokens, 256);
    assert_eq!(config.generation.complete_max_tokens, 128);
}

#[test]
fn default_config_path_ends_with_parley() {
    if let Ok(path) = default_config_path() {
        assert!(path.ends_with("parley/config.toml"));
    }
}
