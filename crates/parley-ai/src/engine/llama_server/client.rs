//! llama.cpp server client struct, request building, and response parsing.

use crate::{AiError, GenerationRequest};

pub(crate) const COMPLETION_PATH: &str = "/completion";

/// Engine backed by a running llama.cpp server.
pub struct LlamaServerEngine {
    pub(crate) base_url: String,
    pub(crate) http: reqwest::Client,
}

/// One decoded streaming event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct StreamDelta {
    pub content: String,
    pub stop: bool,
}

impl LlamaServerEngine {
    pub fn new(base_url: &str) -> Result<Self, AiError> {
        let http = reqwest::Client::builder()
            .connect_timeout(std::time::Duration::from_secs(10))
            .build()
            .map_err(|e| AiError::NetworkError(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub(crate) fn completion_url(&self) -> String {
        format!("{}{COMPLETION_PATH}", self.base_url)
    }

    /// Build the JSON body for `/completion`.
    pub(crate) fn build_request_body(
        &self,
        request: &GenerationRequest,
        stream: bool,
    ) -> serde_json::Value {
        serde_json::json!({
            "prompt": request.prompt,
            "n_predict": request.max_tokens,
            "temperature": request.temperature,
            "top_p": request.top_p,
            "stop": request.stop,
            "stream": stream,
            "cache_prompt": true,
        })
    }

    /// Parse a non-streaming response.
    pub(crate) fn parse_response(&self, json: serde_json::Value) -> Result<String, AiError> {
        if let Some(message) = error_message(&json) {
            return Err(AiError::ApiError(message));
        }
        json["content"]
            .as_str()
            .map(String::from)
            .ok_or_else(|| AiError::ParseError("response has no \"content\" field".into()))
    }

    /// Parse one SSE `data:` payload.
    pub(crate) fn parse_stream_event(&self, data: &str) -> Result<StreamDelta, AiError> {
        let json: serde_json::Value =
            serde_json::from_str(data).map_err(|e| AiError::ParseError(e.to_string()))?;
        if let Some(message) = error_message(&json) {
            return Err(AiError::ApiError(message));
        }
        Ok(StreamDelta {
            content: json["content"].as_str().unwrap_or_default().to_string(),
            stop: json["stop"].as_bool().unwrap_or(false),
        })
    }
}

fn error_message(json: &serde_json::Value) -> Option<String> {
    let error = json.get("error")?;
    Some(
        error["message"]
            .as_str()
            .map(String::from)
            .unwrap_or_else(|| error.to_string()),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine() -> LlamaServerEngine {
        LlamaServerEngine::new("http://127.0.0.1:8080/").unwrap()
    }

    fn request(stop: &[&str]) -> GenerationRequest {
        GenerationRequest {
            prompt: "User: hi\nAssistant:".into(),
            max_tokens: 64,
            temperature: 0.5,
            top_p: 0.9,
            stop: stop.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn completion_url_drops_trailing_slash() {
        assert_eq!(engine().completion_url(), "http://127.0.0.1:8080/completion");
    }

    #[test]
    fn request_body_maps_fields() {
        let body = engine().build_request_body(&request(&["User:", "System:"]), true);
        assert_eq!(body["prompt"], "User: hi\nAssistant:");
        assert_eq!(body["n_predict"], 64);
        assert_eq!(body["temperature"], 0.5);
        assert_eq!(body["stop"], serde_json::json!(["User:", "System:"]));
        assert_eq!(body["stream"], true);
    }

    #[test]
    fn request_body_without_stops() {
        let body = engine().build_request_body(&request(&[]), false);
        assert_eq!(body["stop"], serde_json::json!([]));
        assert_eq!(body["stream"], false);
    }

    #[test]
    fn parses_completion_response() {
        let json = serde_json::json!({"content": " Hello!", "stop": true, "tokens_predicted": 3});
        assert_eq!(engine().parse_response(json).unwrap(), " Hello!");
    }

    #[test]
    fn missing_content_is_parse_error() {
        let err = engine().parse_response(serde_json::json!({"stop": true})).unwrap_err();
        assert!(matches!(err, AiError::ParseError(_)));
    }

    #[test]
    fn server_error_is_api_error() {
        let json = serde_json::json!({"error": {"code": 500, "message": "context overflow"}});
        let err = engine().parse_response(json).unwrap_err();
        assert!(matches!(err, AiError::ApiError(ref m) if m == "context overflow"));
    }

    #[test]
    fn parses_stream_events() {
        let engine = engine();
        assert_eq!(
            engine.parse_stream_event(r#"{"content":"Hel","stop":false}"#).unwrap(),
            StreamDelta {
                content: "Hel".into(),
                stop: false
            }
        );
        let last = engine
            .parse_stream_event(r#"{"content":"","stop":true,"timings":{}}"#)
            .unwrap();
        assert!(last.stop);
        assert!(engine.parse_stream_event("not json").is_err());
    }
}
