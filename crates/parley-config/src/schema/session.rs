//! Session history and streaming output configuration.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Default ceiling on a session log's serialized size (~2 MiB).
pub const DEFAULT_MAX_FILE_BYTES: u64 = 2 * 1024 * 1024;

/// Where and how conversation history is stored.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Directory holding `sessions_index.json` and one `<id>.jsonl` per session.
    pub history_dir: PathBuf,
    /// Most recent messages kept per session and fed back as context.
    pub max_messages: usize,
    /// Upper bound on a session log's size in bytes.
    pub max_file_bytes: u64,
    /// Trim logs after every append.
    pub auto_trim: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            history_dir: default_history_dir(),
            max_messages: 40,
            max_file_bytes: DEFAULT_MAX_FILE_BYTES,
            auto_trim: true,
        }
    }
}

fn default_history_dir() -> PathBuf {
    dirs::data_local_dir()
        .map(|dir| dir.join("parley").join("history"))
        .unwrap_or_else(|| PathBuf::from("history"))
}

/// Incremental output configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamingConfig {
    pub enabled: bool,
    /// Target chunk length in characters.
    pub chunk_size: usize,
}

impl Default for StreamingConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            chunk_size: 50,
        }
    }
}
