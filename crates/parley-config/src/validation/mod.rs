//! Full configuration validation.
//!
//! Every range problem is collected into a single `ConfigError` so a
//! misconfigured deployment sees all of them at once.

mod helpers;

#[cfg(test)]
mod tests;

use crate::schema::ParleyConfig;
use parley_common::ConfigError;

use helpers::{validate_range, validate_range_f32};

/// Run all validations on a config, collecting all errors.
pub fn validate(config: &ParleyConfig) -> Result<(), ConfigError> {
    let mut errors: Vec<String> = Vec::new();

    validate_session(&mut errors, config);
    validate_streaming(&mut errors, config);
    validate_model(&mut errors, config);
    validate_generation(&mut errors, config);

    if errors.is_empty() {
        Ok(())
    } else {
        Err(ConfigError::ValidationError(errors.join("; ")))
    }
}

fn validate_session(errors: &mut Vec<String>, config: &ParleyConfig) {
    validate_range(
        errors,
        "session.max_messages",
        config.session.max_messages,
        1,
        100_000,
    );
    validate_range(
        errors,
        "session.max_file_bytes",
        config.session.max_file_bytes,
        1,
        u64::MAX,
    );
    if config.session.history_dir.as_os_str().is_empty() {
        errors.push("session.history_dir must not be empty".to_string());
    }
}

fn validate_streaming(errors: &mut Vec<String>, config: &ParleyConfig) {
    validate_range(
        errors,
        "streaming.chunk_size",
        config.streaming.chunk_size,
        1,
        1_000_000,
    );
}

fn validate_model(errors: &mut Vec<String>, config: &ParleyConfig) {
    validate_range(
        errors,
        "model.context_size",
        config.model.context_size,
        16,
        1_048_576,
    );
    validate_range(errors, "model.threads", config.model.threads, 1, 1024);
    validate_range(errors, "model.gpu_layers", config.model.gpu_layers, 0, 1024);
}

fn validate_generation(errors: &mut Vec<String>, config: &ParleyConfig) {
    validate_range(
        errors,
        "generation.max_tokens",
        config.generation.max_tokens,
        1,
        1_048_576,
    );
    validate_range(
        errors,
        "generation.complete_max_tokens",
        config.generation.complete_max_tokens,
        1,
        1_048_576,
    );
    validate_range_f32(
        errors,
        "generation.temperature",
        config.generation.temperature,
        0.0,
        2.0,
    );
    validate_range_f32(errors, "generation.top_p", config.generation.top_p, 0.0, 1.0);
}
