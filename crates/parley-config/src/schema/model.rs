//! Inference backend and sampling defaults.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// Which inference engine serves generations.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
#[derive(Default)]
pub enum ModelBackend {
    /// A llama.cpp server reachable over HTTP.
    #[default]
    Server,
    /// A GGUF model loaded in-process (requires the `llama` feature).
    Local,
}

impl fmt::Display for ModelBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Server => write!(f, "server"),
            Self::Local => write!(f, "local"),
        }
    }
}

impl FromStr for ModelBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "server" => Ok(Self::Server),
            "local" => Ok(Self::Local),
            other => Err(format!("unknown model backend '{other}'")),
        }
    }
}

/// Model location and runtime parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    pub backend: ModelBackend,
    /// GGUF file for the local backend.
    pub path: Option<PathBuf>,
    /// Base URL of the llama.cpp server for the server backend.
    pub server_url: String,
    pub context_size: u32,
    pub threads: u32,
    /// Layers offloaded to the accelerator (0 = CPU only).
    pub gpu_layers: u32,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            backend: ModelBackend::Server,
            path: None,
            server_url: "http://127.0.0.1:8080".to_string(),
            context_size: 2048,
            threads: 4,
            gpu_layers: 0,
        }
    }
}

/// Per-call defaults used when a tool invocation omits a parameter.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    pub max_tokens: u32,
    /// `complete` historically defaults to a shorter budget.
    pub complete_max_tokens: u32,
    pub temperature: f32,
    pub top_p: f32,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            max_tokens: 256,
            complete_max_tokens: 128,
            temperature: 0.7,
            top_p: 0.9,
        }
    }
}
