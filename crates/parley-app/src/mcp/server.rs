//! MCP `ServerHandler` for Parley.
//!
//! - `ParleyMcpServer` declares the tools capability and routes calls.
//! - Tool implementations live in `crate::mcp::tools` and are registered
//!   through `rmcp`'s `#[tool_router]`.
//!
//! Tool failures are reported as error results whose text starts with
//! `Error:`; they never terminate the server.

use std::sync::Arc;

use parley_ai::SessionManager;
use rmcp::{handler::server::router::tool::ToolRouter, model::*, tool_handler, ServerHandler};

const INSTRUCTIONS: &str = "Parley runs a local language model. Use generate_text, chat or \
complete for one-off generations. For a conversation with memory, call start_session, pass \
the returned session_id to continue_session for each message, and call end_session when done.";

#[derive(Clone)]
pub struct ParleyMcpServer {
    pub(crate) manager: Arc<SessionManager>,
    tool_router: ToolRouter<ParleyMcpServer>,
}

impl ParleyMcpServer {
    pub fn new(manager: Arc<SessionManager>) -> Self {
        Self {
            manager,
            tool_router: Self::tool_router(),
        }
    }
}

#[tool_handler]
impl ServerHandler for ParleyMcpServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo::new(ServerCapabilities::builder().enable_tools().build())
            .with_protocol_version(ProtocolVersion::V_2024_11_05)
            .with_server_info(Implementation::new("parley", env!("CARGO_PKG_VERSION")))
            .with_instructions(INSTRUCTIONS)
    }
}
