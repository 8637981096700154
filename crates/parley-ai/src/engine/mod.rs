//! Inference engines and the shared model handle.

mod llama_server;
#[cfg(feature = "llama")]
mod local;
pub mod stop;

pub use llama_server::LlamaServerEngine;
#[cfg(feature = "llama")]
pub use local::LocalLlamaEngine;

use parley_common::{ConfigError, ParleyError};
use parley_config::{ModelBackend, ModelConfig};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::{Mutex, MutexGuard};
use tracing::info;

use crate::InferenceEngine;

/// The one loaded model, shared by every tool call.
///
/// Engines are not reentrant: `lock` hands out exclusive access and
/// concurrent callers wait their turn.
#[derive(Clone)]
pub struct ModelHandle {
    engine: Arc<Mutex<Box<dyn InferenceEngine>>>,
}

impl ModelHandle {
    pub fn new(engine: impl InferenceEngine + 'static) -> Self {
        Self::from_boxed(Box::new(engine))
    }

    pub fn from_boxed(engine: Box<dyn InferenceEngine>) -> Self {
        Self {
            engine: Arc::new(Mutex::new(engine)),
        }
    }

    pub async fn lock(&self) -> MutexGuard<'_, Box<dyn InferenceEngine>> {
        self.engine.lock().await
    }
}

/// Build the engine selected by `config`.
///
/// Misconfiguration is reported as `ConfigError::ModelNotConfigured` so the
/// caller can refuse to start.
pub fn engine_from_config(config: &ModelConfig) -> Result<ModelHandle, ParleyError> {
    match config.backend {
        ModelBackend::Server => {
            let url = config.server_url.trim();
            if url.is_empty() {
                return Err(not_configured("LLAMA_SERVER_URL is empty"));
            }
            reqwest::Url::parse(url)
                .map_err(|e| not_configured(format!("invalid LLAMA_SERVER_URL {url:?}: {e}")))?;
            let engine = LlamaServerEngine::new(url)?;
            info!(url = %engine.base_url(), "using llama.cpp server");
            Ok(ModelHandle::new(engine))
        }
        ModelBackend::Local => {
            let path = config
                .path
                .as_deref()
                .filter(|p| !p.as_os_str().is_empty())
                .ok_or_else(|| not_configured("MODEL_PATH is not set"))?;
            if !path.is_file() {
                return Err(not_configured(format!(
                    "model file not found: {}",
                    path.display()
                )));
            }
            load_local(config, path)
        }
    }
}

#[cfg(feature = "llama")]
fn load_local(config: &ModelConfig, path: &Path) -> Result<ModelHandle, ParleyError> {
    Ok(ModelHandle::new(LocalLlamaEngine::load(config, path)?))
}

#[cfg(not(feature = "llama"))]
fn load_local(_config: &ModelConfig, path: &Path) -> Result<ModelHandle, ParleyError> {
    Err(not_configured(format!(
        "cannot load {}: built without the `llama` feature",
        path.display()
    )))
}

fn not_configured(reason: impl Into<String>) -> ParleyError {
    ConfigError::ModelNotConfigured(reason.into()).into()
}
