//! InferenceEngine implementation for LlamaServerEngine (complete + streaming).

use async_trait::async_trait;
use tracing::debug;

use crate::streaming::{parse_sse_stream, SseEvent};
use crate::{AiError, GenerationRequest, InferenceEngine};

use super::client::LlamaServerEngine;

impl LlamaServerEngine {
    async fn post(
        &self,
        request: &GenerationRequest,
        stream: bool,
    ) -> Result<reqwest::Response, AiError> {
        let body = self.build_request_body(request, stream);

        let response = self
            .http
            .post(self.completion_url())
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| AiError::NetworkError(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let text = text.chars().take(200).collect::<String>();
            return Err(AiError::ApiError(format!("HTTP {status}: {text}")));
        }
        Ok(response)
    }
}

#[async_trait]
impl InferenceEngine for LlamaServerEngine {
    async fn complete(&mut self, request: &GenerationRequest) -> Result<String, AiError> {
        debug!(url = %self.base_url, max_tokens = request.max_tokens, "llama server request");

        let response = self.post(request, false).await?;
        let json: serde_json::Value = response
            .json()
            .await
            .map_err(|e| AiError::ParseError(e.to_string()))?;

        self.parse_response(json)
    }

    async fn stream(
        &mut self,
        request: &GenerationRequest,
        on_delta: &mut (dyn for<'a> FnMut(&'a str) + Send),
    ) -> Result<(), AiError> {
        debug!(url = %self.base_url, max_tokens = request.max_tokens, "llama server streaming request");

        let response = self.post(request, true).await?;
        let mut finished = false;

        parse_sse_stream(response, |event: SseEvent| {
            if finished {
                return Ok(());
            }
            let delta = self.parse_stream_event(&event.data)?;
            if !delta.content.is_empty() {
                on_delta(&delta.content);
            }
            finished = delta.stop;
            Ok(())
        })
        .await
    }
}
