//! Parley configuration system.
//!
//! Configuration is read once at process start. Sources, lowest priority
//! first: built-in defaults, an optional TOML file, then environment
//! variables (the same names the tool server has always honoured, e.g.
//! `MODEL_PATH`, `SESSION_MAX_MESSAGES`). All sections use serde defaults
//! so partial files work out of the box.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use parley_config::{load_config, config_to_json};
//!
//! let config = load_config(None).expect("failed to load config");
//! println!("{}", config_to_json(&config));
//! ```

pub mod env;
pub mod schema;
pub mod toml_loader;
pub mod validation;

pub use env::{apply_env_overrides, parse_bool};
pub use schema::{
    GenerationConfig, LogLevel, LoggingConfig, ModelBackend, ModelConfig, ParleyConfig,
    SessionConfig, StreamingConfig,
};

use parley_common::ConfigError;
use std::path::Path;

/// Load config from `path` (or the platform default location), apply
/// environment overrides from the process environment, and validate.
pub fn load_config(path: Option<&Path>) -> Result<ParleyConfig, ConfigError> {
    let mut config = match path {
        Some(path) => toml_loader::load_from_path(path)?,
        None => toml_loader::load_default()?,
    };

    apply_env_overrides(&mut config, |key| std::env::var(key).ok())?;
    validation::validate(&config)?;
    Ok(config)
}

/// Serialize a config to a pretty-printed JSON string.
pub fn config_to_json(config: &ParleyConfig) -> String {
    serde_json::to_string_pretty(config)
        .unwrap_or_else(|e| format!("{{\"error\": \"failed to serialize config: {e}\"}}"))
}
