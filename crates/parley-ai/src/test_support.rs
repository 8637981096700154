//! Scripted in-memory engine for tests.

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::{AiError, GenerationRequest, InferenceEngine};

/// Replays a fixed list of deltas. `complete` returns their concatenation.
pub(crate) struct ScriptedEngine {
    deltas: Vec<String>,
    fail_after: Option<usize>,
    delay: Option<Duration>,
    requests: Arc<Mutex<Vec<GenerationRequest>>>,
    active: Arc<AtomicUsize>,
    peak: Arc<AtomicUsize>,
}

impl ScriptedEngine {
    pub fn completion(text: &str) -> Self {
        Self::deltas(&[text])
    }

    pub fn deltas(deltas: &[&str]) -> Self {
        Self {
            deltas: deltas.iter().map(|d| d.to_string()).collect(),
            fail_after: None,
            delay: None,
            requests: Arc::default(),
            active: Arc::default(),
            peak: Arc::default(),
        }
    }

    /// Stream `n` deltas, then fail. Completions fail outright.
    pub fn fail_after(mut self, n: usize) -> Self {
        self.fail_after = Some(n);
        self
    }

    pub fn failing() -> Self {
        Self::completion("unused").fail_after(0)
    }

    /// Sleep before completing (and between deltas).
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn requests(&self) -> Arc<Mutex<Vec<GenerationRequest>>> {
        Arc::clone(&self.requests)
    }

    /// Highest number of generations observed running at once.
    pub fn peak_concurrency(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.peak)
    }

    fn enter(&self, request: &GenerationRequest) {
        self.requests.lock().unwrap().push(request.clone());
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
    }

    fn leave(&self) {
        self.active.fetch_sub(1, Ordering::SeqCst);
    }

    async fn pause(&self) {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
    }

    fn failure() -> AiError {
        AiError::ModelError("scripted failure".into())
    }
}

#[async_trait]
impl InferenceEngine for ScriptedEngine {
    async fn complete(&mut self, request: &GenerationRequest) -> Result<String, AiError> {
        self.enter(request);
        self.pause().await;
        self.leave();
        if self.fail_after.is_some() {
            return Err(Self::failure());
        }
        Ok(self.deltas.concat())
    }

    async fn stream(
        &mut self,
        request: &GenerationRequest,
        on_delta: &mut (dyn for<'a> FnMut(&'a str) + Send),
    ) -> Result<(), AiError> {
        self.enter(request);
        for (i, delta) in self.deltas.iter().enumerate() {
            if self.fail_after == Some(i) {
                self.leave();
                return Err(Self::failure());
            }
            self.pause().await;
            on_delta(delta);
        }
        self.leave();
        if self.fail_after.is_some_and(|n| n >= self.deltas.len()) {
            return Err(Self::failure());
        }
        Ok(())
    }
}
