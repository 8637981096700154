//! Durable session storage.
//!
//! Layout under the history directory:
//! - `sessions_index.json`: `{"sessions": {id: record}}`
//! - `<id>.jsonl`: the session's events, one JSON object per line
//!
//! Every index change is a load-modify-save under one store-wide lock, and
//! index saves replace the file atomically. Appends to a single session are
//! serialized by a per-session lock so append, trim and the counter update
//! happen as one step.

mod index;
mod log;


pub use index::{Metadata, SessionRecord, SessionStatus};
pub use log::{Event, LogStats, TrimLimits};

use chrono::Utc;
use parley_common::{ParleyError, SessionId};
use parley_config::SessionConfig;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex as StdMutex};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::Role;
use index::SessionIndex;

pub const INDEX_FILE_NAME: &str = "sessions_index.json";

/// File-backed store of sessions and their event logs.
pub struct SessionStore {
    dir: PathBuf,
    index_path: PathBuf,
    limits: TrimLimits,
    auto_trim: bool,
    index_lock: Mutex<()>,
    session_locks: StdMutex<HashMap<SessionId, Arc<Mutex<()>>>>,
}

impl SessionStore {
    /// Open (and create if needed) the store described by `config`.
    pub async fn open(config: &SessionConfig) -> Result<Self, ParleyError> {
        let store = Self::new(config);
        store.ensure_layout().await?;
        info!(dir = %store.dir.display(), "session store ready");
        Ok(store)
    }

    /// Build a store without touching the filesystem.
    pub fn new(config: &SessionConfig) -> Self {
        Self {
            index_path: config.history_dir.join(INDEX_FILE_NAME),
            dir: config.history_dir.clone(),
            limits: TrimLimits {
                max_messages: config.max_messages,
                max_file_bytes: config.max_file_bytes,
            },
            auto_trim: config.auto_trim,
            index_lock: Mutex::new(()),
            session_locks: StdMutex::new(HashMap::new()),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn log_path(&self, id: &SessionId) -> PathBuf {
        self.dir.join(format!("{id}.jsonl"))
    }

    /// Register a new session under a freshly minted id.
    pub async fn create_session(&self, metadata: Metadata) -> Result<SessionId, ParleyError> {
        let id = SessionId::new();
        self.create_session_with_id(id.clone(), metadata).await?;
        Ok(id)
    }

    /// Register a new session under `id`; fails with `Conflict` if the id is
    /// indexed or its log already exists.
    pub async fn create_session_with_id(
        &self,
        id: SessionId,
        metadata: Metadata,
    ) -> Result<SessionRecord, ParleyError> {
        let _index_guard = self.index_lock.lock().await;
        self.ensure_layout().await?;

        let mut index = SessionIndex::load(&self.index_path).await;
        if index.contains(&id) {
            return Err(ParleyError::Conflict(id.to_string()));
        }

        let path = self.log_path(&id);
        match tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await
        {
            Ok(_) => {}
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                return Err(ParleyError::Conflict(id.to_string()));
            }
            Err(e) => return Err(ParleyError::persistence(&path, e.to_string())),
        }

        let record = SessionRecord::new(Utc::now(), metadata);
        index.sessions.insert(id.clone(), record.clone());
        index.save(&self.index_path).await?;
        info!(session = %id, "session created");
        Ok(record)
    }

    /// Append one event to a session's log.
    pub async fn append_event(
        &self,
        id: &SessionId,
        role: Role,
        content: &str,
    ) -> Result<Event, ParleyError> {
        let mut events = self.append_events(id, &[(role, content)]).await?;
        events
            .pop()
            .ok_or_else(|| ParleyError::persistence(self.log_path(id), "no event written"))
    }

    /// Append several events to a session's log in one write, then trim and
    /// update the index once.
    ///
    /// Appending to an id the index does not know creates a minimal record
    /// for it.
    pub async fn append_events(
        &self,
        id: &SessionId,
        events: &[(Role, &str)],
    ) -> Result<Vec<Event>, ParleyError> {
        let session_lock = self.session_lock(id);
        let _session_guard = session_lock.lock().await;
        self.ensure_dir().await?;

        let path = self.log_path(id);
        let events: Vec<Event> = events
            .iter()
            .map(|(role, content)| Event::now(*role, *content))
            .collect();
        let Some(last_used_at) = events.last().map(|e| e.timestamp) else {
            return Ok(Vec::new());
        };

        let lines = events
            .iter()
            .map(serde_json::to_string)
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| ParleyError::persistence(&path, e.to_string()))?;
        log::append_lines(&path, &lines).await?;

        let trimmed = if self.auto_trim {
            match log::trim(&path, self.limits).await {
                Ok(stats) => Some(stats),
                Err(e) => {
                    warn!(session = %id, "trim skipped: {e}");
                    None
                }
            }
        } else {
            None
        };
        let size = log::file_size(&path).await;

        let _index_guard = self.index_lock.lock().await;
        let mut index = SessionIndex::load(&self.index_path).await;
        let record = index.sessions.entry(id.clone()).or_insert_with(|| {
            info!(session = %id, "appending to unindexed session, adding record");
            SessionRecord::new(last_used_at, Metadata::new())
        });
        record.last_used_at = last_used_at;
        match trimmed {
            Some(stats) => {
                record.message_count = stats.message_count;
                record.bytes = stats.bytes;
            }
            None => {
                record.message_count += events.len() as u64;
                record.bytes = size;
            }
        }
        index.save(&self.index_path).await?;
        debug!(session = %id, appended = events.len(), "events appended");
        Ok(events)
    }

    /// The newest `limit` events of a session, oldest first.
    pub async fn load_recent_events(&self, id: &SessionId, limit: usize) -> Vec<Event> {
        if limit == 0 {
            return Vec::new();
        }
        let session_lock = self.session_lock(id);
        let _session_guard = session_lock.lock().await;
        log::read_recent(&self.log_path(id), limit).await
    }

    /// Close a session, optionally deleting its log.
    ///
    /// Returns `false` when the id is not indexed; nothing is written in
    /// that case. A failed log deletion is logged and the session is still
    /// marked closed.
    pub async fn end_session(&self, id: &SessionId, delete: bool) -> Result<bool, ParleyError> {
        let session_lock = self.session_lock(id);
        let _session_guard = session_lock.lock().await;
        let _index_guard = self.index_lock.lock().await;

        let mut index = SessionIndex::load(&self.index_path).await;
        let Some(record) = index.sessions.get_mut(id) else {
            return Ok(false);
        };
        record.status = SessionStatus::Closed;
        record.last_used_at = Utc::now();

        if delete {
            let path = self.log_path(id);
            match tokio::fs::remove_file(&path).await {
                Ok(()) => {
                    record.message_count = 0;
                    record.bytes = 0;
                }
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    record.message_count = 0;
                    record.bytes = 0;
                }
                Err(e) => warn!(session = %id, "could not delete session log: {e}"),
            }
        }

        index.save(&self.index_path).await?;
        info!(session = %id, deleted = delete, "session ended");
        Ok(true)
    }

    /// Index record for one session.
    pub async fn session(&self, id: &SessionId) -> Option<SessionRecord> {
        let _index_guard = self.index_lock.lock().await;
        SessionIndex::load(&self.index_path)
            .await
            .sessions
            .remove(id)
    }

    /// All indexed sessions, ordered by id.
    pub async fn list_sessions(&self) -> Vec<(SessionId, SessionRecord)> {
        let _index_guard = self.index_lock.lock().await;
        SessionIndex::load(&self.index_path)
            .await
            .sessions
            .into_iter()
            .collect()
    }

    /// Lock serializing work on one session.
    ///
    /// Entries held only by the map are idle and are dropped here, so the
    /// map stays as large as the number of sessions in use.
    fn session_lock(&self, id: &SessionId) -> Arc<Mutex<()>> {
        let mut locks = self
            .session_locks
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        locks.retain(|held, lock| held == id || Arc::strong_count(lock) > 1);
        Arc::clone(locks.entry(id.clone()).or_default())
    }

    #[cfg(test)]
    fn tracked_locks(&self) -> usize {
        self.session_locks
            .lock()
            .map(|locks| locks.len())
            .unwrap_or_default()
    }

    async fn ensure_dir(&self) -> Result<(), ParleyError> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| ParleyError::persistence(&self.dir, e.to_string()))
    }

    /// Create the directory and an empty index if they are missing.
    async fn ensure_layout(&self) -> Result<(), ParleyError> {
        self.ensure_dir().await?;
        if !tokio::fs::try_exists(&self.index_path).await.unwrap_or(false) {
            SessionIndex::default().save(&self.index_path).await?;
        }
        Ok(())
    }
}
