//! Plain-text prompt templates.
//!
//! Every turn renders as `<Speaker>: <content>` on its own line. Prompts
//! that expect a reply end with a bare `Assistant:` cue, and conversation
//! prompts stop generation at the next speaker label.

use crate::Role;

/// Stop sequences for prompts built from a conversation.
pub const CONVERSATION_STOPS: [&str; 2] = ["User:", "System:"];

/// One speaker turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Turn {
    pub role: Role,
    pub content: String,
}

impl Turn {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    pub fn render(&self) -> String {
        format!("{}: {}", self.role.prompt_prefix(), self.content)
    }
}

pub fn conversation_stops() -> Vec<String> {
    CONVERSATION_STOPS.iter().map(|s| s.to_string()).collect()
}

/// Prompt for the next assistant reply in a stored session.
pub fn continuation_prompt(history: &[Turn], message: &str) -> String {
    let mut lines: Vec<String> = history.iter().map(Turn::render).collect();
    lines.push(Turn::new(Role::User, message).render());
    lines.push(format!("{}:", Role::Assistant.prompt_prefix()));
    lines.join("\n")
}

/// Prompt for a one-shot chat over caller-supplied messages.
pub fn chat_prompt(messages: &[Turn]) -> String {
    let mut prompt = messages
        .iter()
        .map(Turn::render)
        .collect::<Vec<_>>()
        .join("\n");
    prompt.push_str("\nAssistant:");
    prompt
}
