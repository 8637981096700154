use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("config file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("config parse error: {0}")]
    ParseError(String),

    #[error("config validation error: {0}")]
    ValidationError(String),

    #[error("model not configured: {0}")]
    ModelNotConfigured(String),
}

#[derive(Debug, thiserror::Error)]
pub enum ParleyError {
    #[error("session not found: {0}")]
    NotFound(String),

    #[error("session id collision: {0}")]
    Conflict(String),

    #[error("{0}")]
    Validation(String),

    #[error("persistence error at {path}: {reason}")]
    Persistence { path: PathBuf, reason: String },

    #[error("inference error: {0}")]
    Inference(String),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl ParleyError {
    /// Wrap an I/O or serialization failure on a persisted artifact.
    pub fn persistence(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Self::Persistence {
            path: path.into(),
            reason: reason.to_string(),
        }
    }
}
