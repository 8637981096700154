//! Configuration schema types for Parley.
//!
//! All structs use `serde(default)` so partial configs work correctly.

mod model;
mod session;
mod system;

pub use model::*;
pub use session::*;
pub use system::*;

use serde::{Deserialize, Serialize};

/// Root configuration for Parley.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
#[derive(Default)]
pub struct ParleyConfig {
    pub session: SessionConfig,
    pub streaming: StreamingConfig,
    pub model: ModelConfig,
    pub generation: GenerationConfig,
    pub logging: LoggingConfig,
}
