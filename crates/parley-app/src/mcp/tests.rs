use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use parley_ai::{
    AiError, GenerationRequest, Generator, InferenceEngine, ModelHandle, SessionManager,
    SessionStore,
};
use parley_config::{GenerationConfig, SessionConfig, StreamingConfig};
use rmcp::model::{CallToolResult, ProtocolVersion, RawContent};
use rmcp::ServerHandler;
use tempfile::TempDir;

use super::tools::*;
use super::ParleyMcpServer;

/// Replies with a fixed text and remembers each prompt.
struct FixedReply {
    reply: String,
    prompts: Arc<Mutex<Vec<String>>>,
}

#[async_trait]
impl InferenceEngine for FixedReply {
    async fn complete(&mut self, request: &GenerationRequest) -> Result<String, AiError> {
        self.prompts.lock().unwrap().push(request.prompt.clone());
        Ok(self.reply.clone())
    }

    async fn stream(
        &mut self,
        request: &GenerationRequest,
        on_delta: &mut (dyn for<'a> FnMut(&'a str) + Send),
    ) -> Result<(), AiError> {
        self.prompts.lock().unwrap().push(request.prompt.clone());
        for ch in self.reply.chars() {
            on_delta(&ch.to_string());
        }
        Ok(())
    }
}

struct Fixture {
    dir: TempDir,
    server: ParleyMcpServer,
    prompts: Arc<Mutex<Vec<String>>>,
}

async fn fixture_with(reply: &str, streaming: StreamingConfig) -> Fixture {
    let dir = tempfile::tempdir().unwrap();
    let session = SessionConfig {
        history_dir: dir.path().join("history"),
        ..SessionConfig::default()
    };
    let store = Arc::new(SessionStore::open(&session).await.unwrap());
    let prompts = Arc::new(Mutex::new(Vec::new()));
    let engine = FixedReply {
        reply: reply.to_string(),
        prompts: Arc::clone(&prompts),
    };
    let generator = Generator::new(ModelHandle::new(engine), &streaming);
    let manager = SessionManager::new(
        store,
        generator,
        GenerationConfig::default(),
        session.max_messages,
    );
    Fixture {
        dir,
        server: ParleyMcpServer::new(Arc::new(manager)),
        prompts,
    }
}

async fn fixture(reply: &str) -> Fixture {
    fixture_with(reply, StreamingConfig::default()).await
}

fn texts(result: &CallToolResult) -> Vec<String> {
    result
        .content
        .iter()
        .map(|content| match &content.raw {
            RawContent::Text(text) => text.text.clone(),
            _ => panic!("Expected text content"),
        })
        .collect()
}

fn is_error(result: &CallToolResult) -> bool {
    result.is_error == Some(true)
}

fn session_id_from(result: &CallToolResult) -> String {
    let text = &texts(result)[0];
    text.lines()
        .find_map(|line| line.strip_prefix("session_id: "))
        .expect("session id line")
        .to_string()
}

#[tokio::test]
async fn server_info_advertises_tools() {
    let f = fixture("x").await;
    let info = f.server.get_info();
    assert!(info.capabilities.tools.is_some());
    assert_eq!(info.server_info.name, "parley");
    assert_eq!(info.server_info.version, env!("CARGO_PKG_VERSION"));
    assert_eq!(info.protocol_version, ProtocolVersion::V_2024_11_05);
    assert!(info.instructions.unwrap().contains("start_session"));
}

#[tokio::test]
async fn generate_text_returns_completion() {
    let f = fixture("Once upon a time").await;
    let result = f
        .server
        .generate_text_impl(GenerateTextParams {
            prompt: "Tell a story".into(),
            ..Default::default()
        })
        .await;

    assert!(!is_error(&result));
    assert_eq!(texts(&result), vec!["Once upon a time"]);
    assert_eq!(f.prompts.lock().unwrap().as_slice(), &["Tell a story".to_string()]);
}

#[tokio::test]
async fn empty_prompt_is_an_error_result() {
    let f = fixture("x").await;
    let result = f.server.generate_text_impl(GenerateTextParams::default()).await;
    assert!(is_error(&result));
    assert_eq!(texts(&result), vec!["Error: prompt is required"]);
}

#[tokio::test]
async fn streaming_returns_several_fragments() {
    let streaming = StreamingConfig {
        enabled: true,
        chunk_size: 2,
    };
    let f = fixture_with("abc", streaming).await;
    let result = f
        .server
        .complete_impl(CompleteParams {
            text: "x".into(),
            ..Default::default()
        })
        .await;
    assert_eq!(texts(&result), vec!["ab", "c"]);
}

#[tokio::test]
async fn chat_skips_unknown_roles() {
    let f = fixture(" Sure. ").await;
    let result = f
        .server
        .chat_impl(ChatParams {
            messages: vec![
                ChatMessage {
                    role: Some("system".into()),
                    content: Some("be brief".into()),
                },
                ChatMessage {
                    role: Some("tool".into()),
                    content: Some("ignored".into()),
                },
                ChatMessage {
                    role: None,
                    content: Some("help?".into()),
                },
            ],
            ..Default::default()
        })
        .await;

    assert_eq!(texts(&result), vec!["Sure."]);
    assert_eq!(
        f.prompts.lock().unwrap().last().unwrap(),
        "System: be brief\nUser: help?\nAssistant:"
    );
}

#[tokio::test]
async fn chat_without_messages_is_an_error() {
    let f = fixture("x").await;
    let result = f.server.chat_impl(ChatParams::default()).await;
    assert_eq!(texts(&result), vec!["Error: messages is required"]);
}

#[tokio::test]
async fn session_round_trip() {
    let f = fixture("Hello!").await;

    let started = f
        .server
        .start_session_impl(StartSessionParams::default())
        .await;
    assert!(!is_error(&started));
    assert!(texts(&started)[0].starts_with("Session started.\n\nsession_id: "));
    let session_id = session_id_from(&started);
    assert_eq!(session_id.len(), 32);

    let reply = f
        .server
        .continue_session_impl(ContinueSessionParams {
            session_id: session_id.clone(),
            message: "hi".into(),
            ..Default::default()
        })
        .await;
    assert_eq!(texts(&reply), vec!["Hello!"]);
    assert_eq!(
        f.prompts.lock().unwrap().last().unwrap(),
        "System: Session started.\nUser: hi\nAssistant:"
    );

    let log = f.dir.path().join("history").join(format!("{session_id}.jsonl"));
    assert_eq!(std::fs::read_to_string(&log).unwrap().lines().count(), 3);

    let ended = f
        .server
        .end_session_impl(EndSessionParams {
            session_id: session_id.clone(),
            delete: Some(true),
        })
        .await;
    assert_eq!(
        texts(&ended),
        vec![format!("Session {session_id} has been ended and deleted.")]
    );
    assert!(!log.exists());
}

#[tokio::test]
async fn end_without_delete_marks_closed() {
    let f = fixture("x").await;
    let started = f
        .server
        .start_session_impl(StartSessionParams::default())
        .await;
    let session_id = session_id_from(&started);

    let ended = f
        .server
        .end_session_impl(EndSessionParams {
            session_id: session_id.clone(),
            delete: None,
        })
        .await;
    assert_eq!(
        texts(&ended),
        vec![format!("Session {session_id} has been ended and marked as closed.")]
    );
}

#[tokio::test]
async fn end_unknown_session_reports_not_found() {
    let f = fixture("x").await;
    let result = f
        .server
        .end_session_impl(EndSessionParams {
            session_id: "unknown-id".into(),
            delete: Some(true),
        })
        .await;
    assert!(is_error(&result));
    assert_eq!(texts(&result), vec!["Error: session not found: unknown-id"]);
}

#[tokio::test]
async fn continue_requires_message() {
    let f = fixture("x").await;
    let result = f
        .server
        .continue_session_impl(ContinueSessionParams {
            session_id: "abc".into(),
            ..Default::default()
        })
        .await;
    assert_eq!(texts(&result), vec!["Error: message is required"]);

    let result = f
        .server
        .continue_session_impl(ContinueSessionParams {
            message: "hi".into(),
            ..Default::default()
        })
        .await;
    assert_eq!(texts(&result), vec!["Error: session_id is required"]);
}

#[tokio::test]
async fn start_session_with_metadata() {
    let f = fixture("x").await;
    let metadata: parley_ai::Metadata =
        serde_json::from_str(r#"{"user": "ada", "topic": "llamas"}"#).unwrap();
    let started = f
        .server
        .start_session_impl(StartSessionParams {
            metadata: Some(metadata),
        })
        .await;
    let session_id = session_id_from(&started);

    let log = f.dir.path().join("history").join(format!("{session_id}.jsonl"));
    let first_line = std::fs::read_to_string(&log).unwrap();
    let event: serde_json::Value = serde_json::from_str(first_line.lines().next().unwrap()).unwrap();
    assert_eq!(event["role"], "system");
    assert!(event["content"]
        .as_str()
        .unwrap()
        .starts_with("Session started with metadata: {"));
}

#[test]
fn tool_params_deserialize_from_protocol_arguments() {
    let params: ContinueSessionParams = serde_json::from_value(serde_json::json!({
        "session_id": "abc",
        "message": "hi",
        "max_tokens": 32
    }))
    .unwrap();
    assert_eq!(params.max_tokens, Some(32));
    assert!(params.temperature.is_none());

    let bad: Result<StartSessionParams, _> =
        serde_json::from_value(serde_json::json!({"metadata": "not an object"}));
    assert!(bad.is_err());
}
