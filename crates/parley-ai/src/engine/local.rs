//! In-process GGUF inference through llama.cpp.

use async_trait::async_trait;
use llama_cpp_2::context::params::LlamaContextParams;
use llama_cpp_2::context::LlamaContext;
use llama_cpp_2::llama_backend::LlamaBackend;
use llama_cpp_2::llama_batch::LlamaBatch;
use llama_cpp_2::model::params::LlamaModelParams;
use llama_cpp_2::model::{AddBos, LlamaModel};
use llama_cpp_2::sampling::LlamaSampler;
use llama_cpp_2::token::LlamaToken;
use parley_config::ModelConfig;
use std::num::NonZeroU32;
use std::path::Path;
use tracing::{debug, info};

use super::stop::StopScanner;
use crate::{AiError, GenerationRequest, InferenceEngine};

/// A GGUF model loaded once at startup.
pub struct LocalLlamaEngine {
    backend: LlamaBackend,
    model: LlamaModel,
    context_size: u32,
    threads: i32,
    seed: u32,
}

impl LocalLlamaEngine {
    pub fn load(config: &ModelConfig, path: &Path) -> Result<Self, AiError> {
        info!(path = %path.display(), gpu_layers = config.gpu_layers, "loading model");

        let backend = LlamaBackend::init()
            .map_err(|e| AiError::ModelError(format!("failed to initialise llama.cpp: {e}")))?;
        let params = LlamaModelParams::default().with_n_gpu_layers(config.gpu_layers);
        let model = LlamaModel::load_from_file(&backend, path, &params)
            .map_err(|e| AiError::ModelError(format!("failed to load model: {e}")))?;

        Ok(Self {
            backend,
            model,
            context_size: config.context_size,
            threads: i32::try_from(config.threads).unwrap_or(i32::MAX),
            seed: 0,
        })
    }

    fn new_context(&self) -> Result<LlamaContext<'_>, AiError> {
        let params = LlamaContextParams::default()
            .with_n_ctx(NonZeroU32::new(self.context_size))
            .with_n_threads(self.threads)
            .with_n_threads_batch(self.threads);
        self.model
            .new_context(&self.backend, params)
            .map_err(|e| AiError::ModelError(format!("failed to create context: {e}")))
    }

    fn sampler(&self, request: &GenerationRequest) -> LlamaSampler {
        if request.temperature <= 0.0 {
            return LlamaSampler::greedy();
        }
        LlamaSampler::chain_simple([
            LlamaSampler::top_p(request.top_p, 1),
            LlamaSampler::temp(request.temperature),
            LlamaSampler::dist(self.seed),
        ])
    }

    /// Prefill the prompt, then decode until end-of-generation, a stop
    /// sequence, or `max_tokens`. Text is reported piecewise through
    /// `on_text`.
    fn run(
        &self,
        request: &GenerationRequest,
        on_text: &mut dyn FnMut(&str),
    ) -> Result<(), AiError> {
        let tokens = self
            .model
            .str_to_token(&request.prompt, AddBos::Always)
            .map_err(|e| AiError::ModelError(format!("failed to tokenize prompt: {e}")))?;

        let context_size = self.context_size as usize;
        if tokens.len() >= context_size {
            return Err(AiError::ModelError(format!(
                "prompt is {} tokens, context holds {context_size}",
                tokens.len()
            )));
        }
        let budget = (request.max_tokens as usize).min(context_size - tokens.len());

        let mut ctx = self.new_context()?;
        let n_batch = (ctx.n_batch() as usize).max(1);
        for chunk in tokens.chunks(n_batch) {
            decode(&mut ctx, chunk)?;
        }

        let mut sampler = self.sampler(request);
        let mut decoder = encoding_rs::UTF_8.new_decoder();
        let mut scanner = StopScanner::new(&request.stop);
        let mut generated = 0usize;

        for _ in 0..budget {
            let token = sampler.sample(&ctx, -1);
            sampler.accept(token);
            if self.model.is_eog_token(token) {
                break;
            }
            generated += 1;

            let piece = self
                .model
                .token_to_piece(token, &mut decoder, true, None)
                .map_err(|e| AiError::ModelError(format!("failed to decode token: {e}")))?;
            if let Some(text) = scanner.push(&piece) {
                on_text(&text);
            }
            if scanner.is_stopped() {
                break;
            }

            decode(&mut ctx, &[token])?;
        }

        if let Some(text) = scanner.finish() {
            on_text(&text);
        }
        debug!(prompt_tokens = tokens.len(), generated, "local generation finished");
        Ok(())
    }
}

fn decode(ctx: &mut LlamaContext<'_>, tokens: &[LlamaToken]) -> Result<(), AiError> {
    let mut batch = LlamaBatch::get_one(tokens)
        .map_err(|e| AiError::ModelError(format!("failed to create batch: {e}")))?;
    ctx.decode(&mut batch)
        .map_err(|e| AiError::ModelError(format!("decode failed: {e}")))
}

#[async_trait]
impl InferenceEngine for LocalLlamaEngine {
    async fn complete(&mut self, request: &GenerationRequest) -> Result<String, AiError> {
        let mut text = String::new();
        tokio::task::block_in_place(|| self.run(request, &mut |piece: &str| text.push_str(piece)))?;
        Ok(text)
    }

    async fn stream(
        &mut self,
        request: &GenerationRequest,
        on_delta: &mut (dyn for<'a> FnMut(&'a str) + Send),
    ) -> Result<(), AiError> {
        tokio::task::block_in_place(|| self.run(request, &mut |piece: &str| on_delta(piece)))
    }
}
