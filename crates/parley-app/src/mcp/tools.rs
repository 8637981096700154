//! The six Parley tools.

use parley_ai::{Generation, Metadata, Role, SamplingOverrides, Turn};
use parley_common::ParleyError;
use rmcp::{handler::server::wrapper::Parameters, model::*, schemars, tool, tool_router};
use tracing::warn;

use crate::mcp::server::ParleyMcpServer;

#[derive(Debug, Default, serde::Deserialize, schemars::JsonSchema)]
pub struct GenerateTextParams {
    /// The prompt to generate text from.
    pub prompt: String,
    /// Maximum number of tokens to generate (default 256).
    pub max_tokens: Option<u32>,
    /// Sampling temperature, 0.0 to 2.0 (default 0.7).
    pub temperature: Option<f32>,
    /// Nucleus sampling parameter (default 0.9).
    pub top_p: Option<f32>,
}

#[derive(Debug, Clone, serde::Deserialize, schemars::JsonSchema)]
pub struct ChatMessage {
    /// `system`, `user` or `assistant` (default `user`).
    pub role: Option<String>,
    pub content: Option<String>,
}

#[derive(Debug, Default, serde::Deserialize, schemars::JsonSchema)]
pub struct ChatParams {
    /// Conversation so far, oldest first.
    pub messages: Vec<ChatMessage>,
    /// Maximum number of tokens to generate (default 256).
    pub max_tokens: Option<u32>,
    /// Sampling temperature (default 0.7).
    pub temperature: Option<f32>,
}

#[derive(Debug, Default, serde::Deserialize, schemars::JsonSchema)]
pub struct CompleteParams {
    /// Text to continue.
    pub text: String,
    /// Maximum number of tokens to generate (default 128).
    pub max_tokens: Option<u32>,
    /// Sampling temperature (default 0.7).
    pub temperature: Option<f32>,
}

#[derive(Debug, Default, serde::Deserialize, schemars::JsonSchema)]
pub struct StartSessionParams {
    /// Optional metadata stored with the session (e.g. user id).
    pub metadata: Option<Metadata>,
}

#[derive(Debug, Default, serde::Deserialize, schemars::JsonSchema)]
pub struct ContinueSessionParams {
    /// Session id returned by start_session.
    pub session_id: String,
    /// The user's next message.
    pub message: String,
    /// Maximum number of tokens to generate (default 256).
    pub max_tokens: Option<u32>,
    /// Sampling temperature (default 0.7).
    pub temperature: Option<f32>,
    /// Nucleus sampling parameter (default 0.9).
    pub top_p: Option<f32>,
}

#[derive(Debug, Default, serde::Deserialize, schemars::JsonSchema)]
pub struct EndSessionParams {
    /// The session id to end.
    pub session_id: String,
    /// Also delete the stored history (default false).
    pub delete: Option<bool>,
}

#[tool_router(vis = "pub(crate)")]
impl ParleyMcpServer {
    #[tool(description = "Generates text from a prompt using the local model")]
    pub async fn generate_text(
        &self,
        Parameters(params): Parameters<GenerateTextParams>,
    ) -> Result<CallToolResult, ErrorData> {
        Ok(self.generate_text_impl(params).await)
    }

    #[tool(description = "Replies to a conversation given as a list of role/content messages")]
    pub async fn chat(
        &self,
        Parameters(params): Parameters<ChatParams>,
    ) -> Result<CallToolResult, ErrorData> {
        Ok(self.chat_impl(params).await)
    }

    #[tool(description = "Continues a piece of text")]
    pub async fn complete(
        &self,
        Parameters(params): Parameters<CompleteParams>,
    ) -> Result<CallToolResult, ErrorData> {
        Ok(self.complete_impl(params).await)
    }

    #[tool(description = "Starts a new conversation session with persistent history")]
    pub async fn start_session(
        &self,
        Parameters(params): Parameters<StartSessionParams>,
    ) -> Result<CallToolResult, ErrorData> {
        Ok(self.start_session_impl(params).await)
    }

    #[tool(description = "Sends a message in an existing session and returns the reply")]
    pub async fn continue_session(
        &self,
        Parameters(params): Parameters<ContinueSessionParams>,
    ) -> Result<CallToolResult, ErrorData> {
        Ok(self.continue_session_impl(params).await)
    }

    #[tool(description = "Marks a conversation session as ended and optionally deletes its history")]
    pub async fn end_session(
        &self,
        Parameters(params): Parameters<EndSessionParams>,
    ) -> Result<CallToolResult, ErrorData> {
        Ok(self.end_session_impl(params).await)
    }
}

impl ParleyMcpServer {
    pub async fn generate_text_impl(&self, params: GenerateTextParams) -> CallToolResult {
        let overrides = SamplingOverrides {
            max_tokens: params.max_tokens,
            temperature: params.temperature,
            top_p: params.top_p,
        };
        generation_result(self.manager.generate_text(&params.prompt, overrides).await)
    }

    pub async fn chat_impl(&self, params: ChatParams) -> CallToolResult {
        let overrides = SamplingOverrides {
            max_tokens: params.max_tokens,
            temperature: params.temperature,
            top_p: None,
        };
        let turns = chat_turns(&params.messages);
        if !params.messages.is_empty() && turns.is_empty() {
            return error_result(&ParleyError::Validation(
                "messages must have role system, user or assistant".into(),
            ));
        }
        let result = self.manager.chat(&turns, overrides).await;
        generation_result(result)
    }

    pub async fn complete_impl(&self, params: CompleteParams) -> CallToolResult {
        let overrides = SamplingOverrides {
            max_tokens: params.max_tokens,
            temperature: params.temperature,
            top_p: None,
        };
        generation_result(self.manager.complete(&params.text, overrides).await)
    }

    pub async fn start_session_impl(&self, params: StartSessionParams) -> CallToolResult {
        match self.manager.start(params.metadata).await {
            Ok(id) => CallToolResult::success(vec![Content::text(format!(
                "Session started.\n\nsession_id: {id}\n\n\
                 Use the continue_session tool with this session_id to continue the conversation."
            ))]),
            Err(e) => error_result(&e),
        }
    }

    pub async fn continue_session_impl(&self, params: ContinueSessionParams) -> CallToolResult {
        let overrides = SamplingOverrides {
            max_tokens: params.max_tokens,
            temperature: params.temperature,
            top_p: params.top_p,
        };
        generation_result(
            self.manager
                .continue_session(&params.session_id, &params.message, overrides)
                .await,
        )
    }

    pub async fn end_session_impl(&self, params: EndSessionParams) -> CallToolResult {
        let delete = params.delete.unwrap_or(false);
        match self.manager.end(&params.session_id, delete).await {
            Ok(()) => {
                let action = if delete {
                    "and deleted"
                } else {
                    "and marked as closed"
                };
                CallToolResult::success(vec![Content::text(format!(
                    "Session {} has been ended {action}.",
                    params.session_id
                ))])
            }
            Err(e) => error_result(&e),
        }
    }
}

/// Known-role messages as prompt turns; other roles are left out.
fn chat_turns(messages: &[ChatMessage]) -> Vec<Turn> {
    messages
        .iter()
        .filter_map(|message| {
            let role = match message.role.as_deref() {
                None => Role::User,
                Some(label) => Role::parse_known(label)?,
            };
            Some(Turn::new(role, message.content.clone().unwrap_or_default()))
        })
        .collect()
}

fn generation_result(result: Result<Generation, ParleyError>) -> CallToolResult {
    match result {
        Ok(generation) => {
            CallToolResult::success(generation.chunks.into_iter().map(Content::text).collect())
        }
        Err(e) => error_result(&e),
    }
}

fn error_result(err: &ParleyError) -> CallToolResult {
    warn!("tool call failed: {err}");
    CallToolResult::error(vec![Content::text(format!("Error: {err}"))])
}
