//! The session index: one JSON document mapping session ids to records.

use chrono::{DateTime, Utc};
use parley_common::{ParleyError, SessionId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use tokio::io::AsyncWriteExt;
use tracing::warn;

/// Free-form caller metadata attached at session start.
pub type Metadata = serde_json::Map<String, serde_json::Value>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    #[default]
    Active,
    Closed,
}

/// Per-session bookkeeping kept in the index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub created_at: DateTime<Utc>,
    pub last_used_at: DateTime<Utc>,
    #[serde(default)]
    pub message_count: u64,
    #[serde(default)]
    pub bytes: u64,
    #[serde(default)]
    pub status: SessionStatus,
    #[serde(default)]
    pub metadata: Metadata,
}

impl SessionRecord {
    pub fn new(now: DateTime<Utc>, metadata: Metadata) -> Self {
        Self {
            created_at: now,
            last_used_at: now,
            message_count: 0,
            bytes: 0,
            status: SessionStatus::Active,
            metadata,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct SessionIndex {
    pub sessions: BTreeMap<SessionId, SessionRecord>,
    /// Entries that did not parse, kept verbatim so a save does not erase
    /// them. A parsed record under the same key replaces the raw entry.
    unparsed: BTreeMap<String, serde_json::Value>,
}

impl SessionIndex {
    /// Parse an index document.
    ///
    /// Blank input is an empty index. Input that is not JSON, or has no
    /// `sessions` object, is an error. Individual entries that fail to parse
    /// are set aside with a warning so one bad record does not hide the rest.
    pub fn parse(raw: &str) -> Result<Self, String> {
        if raw.trim().is_empty() {
            return Ok(Self::default());
        }
        let value: serde_json::Value = serde_json::from_str(raw).map_err(|e| e.to_string())?;
        let Some(entries) = value.get("sessions").and_then(|s| s.as_object()) else {
            return Err("missing \"sessions\" object".into());
        };

        let mut index = Self::default();
        for (key, entry) in entries {
            let id: SessionId = match key.parse() {
                Ok(id) => id,
                Err(e) => {
                    warn!(key = %key, "skipping index entry: {e}");
                    index.unparsed.insert(key.clone(), entry.clone());
                    continue;
                }
            };
            match serde_json::from_value::<SessionRecord>(entry.clone()) {
                Ok(record) => {
                    index.sessions.insert(id, record);
                }
                Err(e) => {
                    warn!(session = %id, "skipping index entry: {e}");
                    index.unparsed.insert(key.clone(), entry.clone());
                }
            }
        }
        Ok(index)
    }

    /// Whether `id` has an entry, readable or not.
    pub fn contains(&self, id: &SessionId) -> bool {
        self.sessions.contains_key(id) || self.unparsed.contains_key(id.as_str())
    }

    fn to_document(&self) -> Result<serde_json::Value, serde_json::Error> {
        let mut sessions = serde_json::Map::new();
        for (key, entry) in &self.unparsed {
            sessions.insert(key.clone(), entry.clone());
        }
        for (id, record) in &self.sessions {
            sessions.insert(id.to_string(), serde_json::to_value(record)?);
        }
        Ok(serde_json::json!({ "sessions": sessions }))
    }

    /// Read the index at `path`. Never fails: missing or corrupt files read
    /// as empty.
    pub async fn load(path: &Path) -> Self {
        match tokio::fs::read_to_string(path).await {
            Ok(raw) => Self::parse(&raw).unwrap_or_else(|reason| {
                warn!(path = %path.display(), "session index is invalid, treating as empty: {reason}");
                Self::default()
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Self::default(),
            Err(e) => {
                warn!(path = %path.display(), "session index is unreadable, treating as empty: {e}");
                Self::default()
            }
        }
    }

    /// Replace the index at `path` atomically (temp file, fsync, rename).
    pub async fn save(&self, path: &Path) -> Result<(), ParleyError> {
        let content = self
            .to_document()
            .and_then(|document| serde_json::to_string_pretty(&document))
            .map_err(|e| ParleyError::persistence(path, e.to_string()))?;
        write_atomic(path, content.as_bytes()).await
    }
}

/// Sibling temp path used for atomic replacement.
pub(crate) fn temp_path(path: &Path) -> std::path::PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    path.with_file_name(format!(".{name}.tmp"))
}

/// Write `content` to a temp file next to `path`, sync it, then rename over
/// `path`. Readers observe either the old or the new file, never a mix.
pub(crate) async fn write_atomic(path: &Path, content: &[u8]) -> Result<(), ParleyError> {
    let tmp = temp_path(path);
    let fail = |e: std::io::Error| ParleyError::persistence(path, e.to_string());

    let mut file = tokio::fs::File::create(&tmp).await.map_err(fail)?;
    file.write_all(content).await.map_err(fail)?;
    file.sync_all().await.map_err(fail)?;
    drop(file);

    if let Err(e) = tokio::fs::rename(&tmp, path).await {
        let _ = tokio::fs::remove_file(&tmp).await;
        return Err(fail(e));
    }
    Ok(())
}
