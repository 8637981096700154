//! Session lifecycle: `nonexistent -> active -> closed`.
//!
//! `start` creates a session and records a system event, `continue_session`
//! runs one user/assistant exchange against the stored history, and `end`
//! closes (and optionally deletes) it. The stateless tools live in
//! `stateless.rs` and share the same model and sampling defaults.

mod stateless;


use parley_common::{ParleyError, SessionId};
use parley_config::GenerationConfig;
use std::sync::Arc;
use tracing::{debug, info};

use crate::aggregator::{ChunkSink, Generation, Generator};
use crate::history::build_history;
use crate::prompt::{continuation_prompt, conversation_stops};
use crate::store::{Metadata, SessionStatus, SessionStore};
use crate::{GenerationRequest, Role};

/// Per-call sampling parameters; unset fields fall back to configured
/// defaults.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SamplingOverrides {
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
    pub top_p: Option<f32>,
}

pub struct SessionManager {
    store: Arc<SessionStore>,
    generator: Generator,
    defaults: GenerationConfig,
    max_history: usize,
}

impl SessionManager {
    pub fn new(
        store: Arc<SessionStore>,
        generator: Generator,
        defaults: GenerationConfig,
        max_history: usize,
    ) -> Self {
        Self {
            store,
            generator,
            defaults,
            max_history,
        }
    }

    pub fn store(&self) -> &Arc<SessionStore> {
        &self.store
    }

    /// Create a session and persist its opening system event.
    ///
    /// Both steps run in one detached task, so a caller that stops waiting
    /// cannot leave a session with an empty log.
    pub async fn start(&self, metadata: Option<Metadata>) -> Result<SessionId, ParleyError> {
        let metadata = metadata.unwrap_or_default();
        let opening = if metadata.is_empty() {
            "Session started.".to_string()
        } else {
            let encoded = serde_json::to_string(&metadata)
                .map_err(|e| ParleyError::Validation(format!("metadata is not serializable: {e}")))?;
            format!("Session started with metadata: {encoded}")
        };

        let store = Arc::clone(&self.store);
        let id = self
            .persist(async move {
                let id = store.create_session(metadata).await?;
                store.append_event(&id, Role::System, &opening).await?;
                Ok(id)
            })
            .await?;
        info!(session = %id, "session started");
        Ok(id)
    }

    pub async fn continue_session(
        &self,
        session_id: &str,
        message: &str,
        overrides: SamplingOverrides,
    ) -> Result<Generation, ParleyError> {
        self.continue_session_with_sink(session_id, message, overrides, None)
            .await
    }

    /// Run one exchange: load history, generate, then persist the user
    /// message and the reply.
    ///
    /// Nothing is persisted if generation fails. Once generation succeeds
    /// the two events are written by a detached task, so a caller that
    /// stops waiting cannot leave only one of them behind.
    pub async fn continue_session_with_sink(
        &self,
        session_id: &str,
        message: &str,
        overrides: SamplingOverrides,
        sink: Option<ChunkSink>,
    ) -> Result<Generation, ParleyError> {
        let id = parse_session_id(session_id)?;
        if message.is_empty() {
            return Err(ParleyError::Validation("message is required".into()));
        }
        if let Some(record) = self.store.session(&id).await {
            if record.status == SessionStatus::Closed {
                return Err(ParleyError::Validation(format!("session {id} is closed")));
            }
        }

        let events = self.store.load_recent_events(&id, self.max_history).await;
        let history = build_history(&events, self.max_history);
        let request = GenerationRequest {
            prompt: continuation_prompt(&history, message),
            stop: conversation_stops(),
            ..self.request(overrides, self.defaults.max_tokens)
        };
        debug!(session = %id, history = history.len(), "continuing session");

        let generation = self
            .generator
            .generate(&request, sink)
            .await?
            .trimmed_for_conversation();

        let store = Arc::clone(&self.store);
        let user = message.to_string();
        let reply = generation.text.clone();
        self.persist(async move {
            store
                .append_events(&id, &[(Role::User, user.as_str()), (Role::Assistant, reply.as_str())])
                .await
                .map(|_| ())
        })
        .await?;

        Ok(generation)
    }

    /// Close a session. Unknown ids are `NotFound`.
    pub async fn end(&self, session_id: &str, delete: bool) -> Result<(), ParleyError> {
        let id = parse_session_id(session_id)?;
        if self.store.end_session(&id, delete).await? {
            Ok(())
        } else {
            Err(ParleyError::NotFound(id.to_string()))
        }
    }

    /// Run a store write to completion on its own task and wait for it.
    async fn persist<T, F>(&self, write: F) -> Result<T, ParleyError>
    where
        T: Send + 'static,
        F: std::future::Future<Output = Result<T, ParleyError>> + Send + 'static,
    {
        tokio::spawn(write).await.map_err(|e| {
            ParleyError::persistence(self.store.dir(), format!("persist task failed: {e}"))
        })?
    }

    fn request(&self, overrides: SamplingOverrides, default_max_tokens: u32) -> GenerationRequest {
        GenerationRequest {
            prompt: String::new(),
            max_tokens: overrides.max_tokens.unwrap_or(default_max_tokens),
            temperature: overrides.temperature.unwrap_or(self.defaults.temperature),
            top_p: overrides.top_p.unwrap_or(self.defaults.top_p),
            stop: Vec::new(),
        }
    }
}

fn parse_session_id(raw: &str) -> Result<SessionId, ParleyError> {
    if raw.is_empty() {
        return Err(ParleyError::Validation("session_id is required".into()));
    }
    raw.parse()
}
