//! Conversation core for Parley.
//!
//! Provides:
//! - A durable session store (JSON index + one JSONL log per session)
//! - History reconstruction and plain-text prompt assembly
//! - A generation aggregator that turns completions or token deltas into
//!   ordered chunks plus one canonical text
//! - The session lifecycle manager tying it all together
//! - Inference engines behind a single exclusively-locked handle

pub mod aggregator;
pub mod engine;
pub mod history;
pub mod lifecycle;
pub mod prompt;
pub mod store;
pub mod streaming;

#[cfg(test)]
pub(crate) mod test_support;

use async_trait::async_trait;
use parley_common::ParleyError;
use serde::{Deserialize, Deserializer, Serialize};

pub use aggregator::{ChunkAggregator, ChunkSink, Generation, Generator};
pub use engine::{engine_from_config, LlamaServerEngine, ModelHandle};
pub use history::build_history;
pub use lifecycle::{SamplingOverrides, SessionManager};
pub use prompt::Turn;
pub use store::{Event, Metadata, SessionRecord, SessionStatus, SessionStore};

/// An inference backend. Either returns a whole completion or reports text
/// deltas in order through `on_delta`.
///
/// Engines are stateful and not safe for concurrent generations, hence
/// `&mut self`; share them through [`ModelHandle`].
#[async_trait]
pub trait InferenceEngine: Send {
    async fn complete(&mut self, request: &GenerationRequest) -> Result<String, AiError>;

    async fn stream(
        &mut self,
        request: &GenerationRequest,
        on_delta: &mut (dyn for<'a> FnMut(&'a str) + Send),
    ) -> Result<(), AiError>;
}

/// One generation call as seen by an engine.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    pub prompt: String,
    pub max_tokens: u32,
    pub temperature: f32,
    pub top_p: f32,
    pub stop: Vec<String>,
}

/// Conversation role. Unrecognized labels read back as `User`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    User,
    Assistant,
    System,
}

impl Role {
    /// Lenient parse: anything unrecognized is `User`.
    pub fn from_label(label: &str) -> Self {
        Self::parse_known(label).unwrap_or(Self::User)
    }

    /// Strict parse of the three known labels.
    pub fn parse_known(label: &str) -> Option<Self> {
        match label {
            "user" => Some(Self::User),
            "system" => Some(Self::System),
            "assistant" => Some(Self::Assistant),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
            Self::System => "system",
        }
    }

    /// Speaker prefix used by the plain-text prompt template.
    pub fn prompt_prefix(&self) -> &'static str {
        match self {
            Self::User => "User",
            Self::Assistant => "Assistant",
            Self::System => "System",
        }
    }
}

impl<'de> Deserialize<'de> for Role {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let label = String::deserialize(deserializer)?;
        Ok(Self::from_label(&label))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AiError {
    #[error("API error: {0}")]
    ApiError(String),
    #[error("Network error: {0}")]
    NetworkError(String),
    #[error("Parse error: {0}")]
    ParseError(String),
    #[error("Model error: {0}")]
    ModelError(String),
}

impl From<AiError> for ParleyError {
    fn from(err: AiError) -> Self {
        ParleyError::Inference(err.to_string())
    }
}
