use super::*;

#[test]
fn default_config_is_valid() {
    assert!(validate(&ParleyConfig::default()).is_ok());
}

#[test]
fn zero_max_messages_is_rejected() {
    let mut config = ParleyConfig::default();
    config.session.max_messages = 0;
    let err = validate(&config).unwrap_err();
    assert!(err.to_string().contains("session.max_messages = 0"));
}

#[test]
fn zero_chunk_size_is_rejected() {
    let mut config = ParleyConfig::default();
    config.streaming.chunk_size = 0;
    let err = validate(&config).unwrap_err();
    assert!(err.to_string().contains("streaming.chunk_size"));
}

#[test]
fn errors_are_collected() {
    let mut config = ParleyConfig::default();
    config.session.max_file_bytes = 0;
    config.model.threads = 0;
    config.generation.top_p = 1.5;
    let msg = validate(&config).unwrap_err().to_string();
    assert!(msg.contains("session.max_file_bytes"));
    assert!(msg.contains("model.threads"));
    assert!(msg.contains("generation.top_p"));
    assert_eq!(msg.matches("; ").count(), 2);
}

#[test]
fn nan_temperature_is_rejected() {
    let mut config = ParleyConfig::default();
    config.generation.temperature = f32::NAN;
    assert!(validate(&config).is_err());
}

#[test]
fn empty_history_dir_is_rejected() {
    let mut config = ParleyConfig::default();
    config.session.history_dir = std::path::PathBuf::new();
    assert!(validate(&config).is_err());
}
