//! Tools that generate without touching session history.

use parley_common::ParleyError;

use super::{SamplingOverrides, SessionManager};
use crate::aggregator::Generation;
use crate::prompt::{chat_prompt, conversation_stops, Turn};
use crate::GenerationRequest;

impl SessionManager {
    /// Free-form generation from a raw prompt.
    pub async fn generate_text(
        &self,
        prompt: &str,
        overrides: SamplingOverrides,
    ) -> Result<Generation, ParleyError> {
        if prompt.is_empty() {
            return Err(ParleyError::Validation("prompt is required".into()));
        }
        let request = GenerationRequest {
            prompt: prompt.to_string(),
            ..self.request(overrides, self.defaults.max_tokens)
        };
        Ok(self.generator.generate(&request, None).await?)
    }

    /// One assistant reply to a caller-supplied conversation.
    pub async fn chat(
        &self,
        messages: &[Turn],
        overrides: SamplingOverrides,
    ) -> Result<Generation, ParleyError> {
        if messages.is_empty() {
            return Err(ParleyError::Validation("messages is required".into()));
        }
        let request = GenerationRequest {
            prompt: chat_prompt(messages),
            stop: conversation_stops(),
            ..self.request(overrides, self.defaults.max_tokens)
        };
        Ok(self
            .generator
            .generate(&request, None)
            .await?
            .trimmed_for_conversation())
    }

    /// Continue a piece of text.
    pub async fn complete(
        &self,
        text: &str,
        overrides: SamplingOverrides,
    ) -> Result<Generation, ParleyError> {
        if text.is_empty() {
            return Err(ParleyError::Validation("text is required".into()));
        }
        let request = GenerationRequest {
            prompt: text.to_string(),
            ..self.request(overrides, self.defaults.complete_max_tokens)
        };
        Ok(self.generator.generate(&request, None).await?)
    }
}
