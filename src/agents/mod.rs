//! Chat agent adapters.
//!
//! Each adapter turns a user message into an assistant reply. Adapters never
//! fail outward: missing configuration or upstream errors degrade to an
//! apologetic reply so the chat UI needs no special error handling.

mod hosted;
mod toolcall;

pub use hosted::HostedAgent;
pub use toolcall::ToolCallAgent;

use async_trait::async_trait;
use serde::Serialize;

use crate::llm::Role;

/// Reply produced by a chat agent.
#[derive(Debug, Clone, Serialize)]
pub struct ChatReply {
    pub role: Role,
    pub content: String,
}

impl ChatReply {
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// A conversational agent reachable through the chat endpoint.
#[async_trait]
pub trait ChatAgent: Send + Sync {
    /// Process a user message and return the assistant's reply.
    ///
    /// `session_id` is an opaque caller token; adapters that keep
    /// conversation state use it to resume a prior conversation.
    async fn process_message(&self, message: &str, session_id: Option<&str>) -> ChatReply;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reply_serializes_with_assistant_role() {
        let reply = ChatReply::assistant("Done.");
        let json = serde_json::to_value(&reply).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"role": "assistant", "content": "Done."})
        );
    }
}
