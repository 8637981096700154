//! Environment-variable overrides.
//!
//! Variables are looked up through a caller-supplied function so tests can
//! feed a fixed map instead of mutating the process environment. Empty
//! values count as unset.

use crate::schema::ParleyConfig;
use parley_common::ConfigError;
use std::path::PathBuf;
use std::str::FromStr;

/// Interpret the usual truthy spellings; anything else is `false`.
pub fn parse_bool(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

fn parse_num<T>(key: &str, value: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e| ConfigError::ParseError(format!("{key}={value:?}: {e}")))
}

/// Apply every recognised override on top of `config`.
pub fn apply_env_overrides<F>(config: &mut ParleyConfig, lookup: F) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

    if let Some(v) = get("SESSION_HISTORY_DIR") {
        config.session.history_dir = PathBuf::from(v);
    }
    if let Some(v) = get("SESSION_MAX_MESSAGES") {
        config.session.max_messages = parse_num("SESSION_MAX_MESSAGES", &v)?;
    }
    if let Some(v) = get("SESSION_MAX_FILE_BYTES") {
        config.session.max_file_bytes = parse_num("SESSION_MAX_FILE_BYTES", &v)?;
    }
    if let Some(v) = get("SESSION_AUTO_TRIM") {
        config.session.auto_trim = parse_bool(&v);
    }

    if let Some(v) = get("STREAMING_ENABLED") {
        config.streaming.enabled = parse_bool(&v);
    }
    if let Some(v) = get("STREAMING_CHUNK_SIZE") {
        config.streaming.chunk_size = parse_num("STREAMING_CHUNK_SIZE", &v)?;
    }

    if let Some(v) = get("MODEL_BACKEND") {
        config.model.backend = v
            .parse()
            .map_err(|e: String| ConfigError::ParseError(format!("MODEL_BACKEND: {e}")))?;
    }
    if let Some(v) = get("MODEL_PATH") {
        config.model.path = Some(PathBuf::from(v));
    }
    if let Some(v) = get("LLAMA_SERVER_URL") {
        config.model.server_url = v;
    }
    if let Some(v) = get("CONTEXT_SIZE") {
        config.model.context_size = parse_num("CONTEXT_SIZE", &v)?;
    }
    if let Some(v) = get("N_THREADS") {
        config.model.threads = parse_num("N_THREADS", &v)?;
    }
    if let Some(v) = get("N_GPU_LAYERS") {
        config.model.gpu_layers = parse_num("N_GPU_LAYERS", &v)?;
    }

    Ok(())
}
