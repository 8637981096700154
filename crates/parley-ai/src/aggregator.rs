//! Turn engine output into ordered chunks plus one canonical text.
//!
//! Non-streaming generations yield exactly one chunk. Streaming
//! generations buffer deltas and cut a chunk each time the buffer reaches
//! `chunk_size` characters; whatever is left at end-of-stream becomes the
//! last chunk. The canonical text is always the concatenation of the
//! chunks, and there is always at least one chunk.

use parley_config::StreamingConfig;
use tokio::sync::mpsc;
use tracing::debug;

use crate::engine::ModelHandle;
use crate::{AiError, GenerationRequest};

/// Receives chunks as they are cut.
pub type ChunkSink = mpsc::UnboundedSender<String>;

/// Output of one generation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Generation {
    pub chunks: Vec<String>,
    pub text: String,
}

impl Generation {
    /// A non-streamed result: one chunk equal to the whole text.
    pub fn single(text: String) -> Self {
        Self {
            chunks: vec![text.clone()],
            text,
        }
    }

    /// Conversation post-processing: trim the canonical text and the first
    /// chunk. Later chunks are returned as generated.
    pub fn trimmed_for_conversation(mut self) -> Self {
        self.text = self.text.trim().to_string();
        if let Some(first) = self.chunks.first_mut() {
            *first = first.trim().to_string();
        }
        self
    }
}

/// Rolling buffer that cuts streamed deltas into chunks.
pub struct ChunkAggregator {
    chunk_size: usize,
    buffer: String,
    buffered_chars: usize,
    chunks: Vec<String>,
    sink: Option<ChunkSink>,
}

impl ChunkAggregator {
    pub fn new(chunk_size: usize) -> Self {
        Self {
            chunk_size: chunk_size.max(1),
            buffer: String::new(),
            buffered_chars: 0,
            chunks: Vec::new(),
            sink: None,
        }
    }

    pub fn with_sink(mut self, sink: Option<ChunkSink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn push(&mut self, delta: &str) {
        if delta.is_empty() {
            return;
        }
        self.buffer.push_str(delta);
        self.buffered_chars += delta.chars().count();
        if self.buffered_chars >= self.chunk_size {
            self.cut();
        }
    }

    /// Flush the buffer and return the finished generation.
    pub fn finish(mut self) -> Generation {
        if !self.buffer.is_empty() || self.chunks.is_empty() {
            self.cut();
        }
        let text = self.chunks.concat();
        Generation {
            chunks: self.chunks,
            text,
        }
    }

    fn cut(&mut self) {
        let chunk = std::mem::take(&mut self.buffer);
        self.buffered_chars = 0;
        self.deliver(&chunk);
        self.chunks.push(chunk);
    }

    fn deliver(&mut self, chunk: &str) {
        if let Some(sink) = &self.sink {
            if sink.send(chunk.to_string()).is_err() {
                debug!("chunk receiver dropped, continuing without delivery");
                self.sink = None;
            }
        }
    }
}

/// Runs generation requests against the shared model.
#[derive(Clone)]
pub struct Generator {
    model: ModelHandle,
    streaming: bool,
    chunk_size: usize,
}

impl Generator {
    pub fn new(model: ModelHandle, streaming: &StreamingConfig) -> Self {
        Self {
            model,
            streaming: streaming.enabled,
            chunk_size: streaming.chunk_size,
        }
    }

    pub fn is_streaming(&self) -> bool {
        self.streaming
    }

    /// Generate one completion, waiting for the model if another call holds
    /// it. Chunks are also sent to `sink` as they are produced.
    ///
    /// On failure no final chunk is produced and nothing is returned.
    pub async fn generate(
        &self,
        request: &GenerationRequest,
        sink: Option<ChunkSink>,
    ) -> Result<Generation, AiError> {
        let mut engine = self.model.lock().await;

        if !self.streaming {
            let text = engine.complete(request).await?;
            if let Some(sink) = &sink {
                let _ = sink.send(text.clone());
            }
            return Ok(Generation::single(text));
        }

        let mut aggregator = ChunkAggregator::new(self.chunk_size).with_sink(sink);
        engine
            .stream(request, &mut |delta: &str| aggregator.push(delta))
            .await?;
        let generation = aggregator.finish();
        debug!(chunks = generation.chunks.len(), "streamed generation finished");
        Ok(generation)
    }
}
