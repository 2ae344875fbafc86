//! Hosted agent adapter.
//!
//! Proxies user messages to a hosted agent service speaking the
//! threads/messages/runs REST protocol. The agent's tools run on the
//! service side; this adapter only relays text. One thread is created
//! lazily per process, so the conversation continues across requests
//! regardless of any session id the caller supplies.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tokio::sync::Mutex;

use super::{ChatAgent, ChatReply};
use crate::config::{Config, FoundryConfig};

const API_VERSION: &str = "2025-05-01";

/// Poll interval and bound for waiting on a run.
const POLL_INTERVAL: Duration = Duration::from_millis(500);
const MAX_POLLS: usize = 120;

const UNCONFIGURED_REPLY: &str =
    "The hosted agent is not properly configured. Please check your settings.";
const ERROR_REPLY: &str = "I apologize, but I encountered an error processing your request.";

/// Chat agent backed by a remote agent service.
pub struct HostedAgent {
    http: Client,
    config: Option<FoundryConfig>,
    thread_id: Mutex<Option<String>>,
}

enum RunOutcome {
    Completed(Option<String>),
    Failed(String),
    Other(String),
}

impl HostedAgent {
    pub fn new(config: Option<FoundryConfig>) -> Self {
        if config.is_none() {
            tracing::warn!(
                "Hosted agent configuration missing. Set AZURE_AI_FOUNDRY_PROJECT_ENDPOINT, \
                 AZURE_AI_FOUNDRY_AGENT_ID and AZURE_AI_FOUNDRY_API_KEY"
            );
        }
        Self {
            http: Client::new(),
            config,
            thread_id: Mutex::new(None),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.foundry.clone())
    }

    fn url(config: &FoundryConfig, path: &str) -> String {
        format!(
            "{}/{}?api-version={}",
            config.endpoint.trim_end_matches('/'),
            path,
            API_VERSION
        )
    }

    async fn post_json<T: serde::de::DeserializeOwned>(
        &self,
        config: &FoundryConfig,
        path: &str,
        body: serde_json::Value,
    ) -> anyhow::Result<T> {
        let response = self
            .http
            .post(Self::url(config, path))
            .bearer_auth(&config.api_key)
            .json(&body)
            .send()
            .await?;
        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            anyhow::bail!("agent service returned {}: {}", status, text);
        }
        Ok(serde_json::from_str(&text)?)
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        config: &FoundryConfig,
        path: &str,
    ) -> anyhow::Result<T> {
        let response = self
            .http
            .get(Self::url(config, path))
            .bearer_auth(&config.api_key)
            .send()
            .await?;
        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            anyhow::bail!("agent service returned {}: {}", status, text);
        }
        Ok(serde_json::from_str(&text)?)
    }

    /// Thread for this process, created on first use.
    async fn ensure_thread(&self, config: &FoundryConfig) -> anyhow::Result<String> {
        let mut guard = self.thread_id.lock().await;
        if let Some(id) = guard.as_ref() {
            return Ok(id.clone());
        }
        let thread: ThreadResponse = self
            .post_json(config, "threads", serde_json::json!({}))
            .await?;
        tracing::info!("Created agent thread: {}", thread.id);
        *guard = Some(thread.id.clone());
        Ok(thread.id)
    }

    async fn run_once(&self, config: &FoundryConfig, message: &str) -> anyhow::Result<RunOutcome> {
        let thread_id = self.ensure_thread(config).await?;

        let _: serde_json::Value = self
            .post_json(
                config,
                &format!("threads/{}/messages", thread_id),
                serde_json::json!({"role": "user", "content": message}),
            )
            .await?;

        let run: RunResponse = self
            .post_json(
                config,
                &format!("threads/{}/runs", thread_id),
                serde_json::json!({"assistant_id": config.agent_id}),
            )
            .await?;

        let run = self.wait_for_run(config, &thread_id, run).await?;
        tracing::debug!("Run finished with status: {}", run.status);

        match run.status.as_str() {
            "completed" => {
                let messages: MessageList = self
                    .get_json(
                        config,
                        &format!("threads/{}/messages", thread_id),
                    )
                    .await?;
                Ok(RunOutcome::Completed(extract_assistant_text(&messages)))
            }
            "failed" => Ok(RunOutcome::Failed(
                run.last_error
                    .map(|e| e.to_string())
                    .unwrap_or_else(|| "unknown".to_string()),
            )),
            other => Ok(RunOutcome::Other(other.to_string())),
        }
    }

    async fn wait_for_run(
        &self,
        config: &FoundryConfig,
        thread_id: &str,
        mut run: RunResponse,
    ) -> anyhow::Result<RunResponse> {
        let mut polls = 0;
        while matches!(run.status.as_str(), "queued" | "in_progress" | "cancelling") {
            if polls >= MAX_POLLS {
                anyhow::bail!("run {} did not finish in time", run.id);
            }
            polls += 1;
            tokio::time::sleep(POLL_INTERVAL).await;
            run = self
                .get_json(config, &format!("threads/{}/runs/{}", thread_id, run.id))
                .await?;
        }
        Ok(run)
    }
}

#[async_trait]
impl ChatAgent for HostedAgent {
    async fn process_message(&self, message: &str, _session_id: Option<&str>) -> ChatReply {
        let Some(config) = &self.config else {
            return ChatReply::assistant(UNCONFIGURED_REPLY);
        };

        match self.run_once(config, message).await {
            Ok(RunOutcome::Completed(Some(text))) => ChatReply::assistant(text),
            Ok(RunOutcome::Completed(None)) => {
                ChatReply::assistant("I processed your request but couldn't find a response.")
            }
            Ok(RunOutcome::Failed(detail)) => {
                tracing::error!("Hosted agent run failed: {}", detail);
                ChatReply::assistant(
                    "I encountered an error processing your request. Please try again.",
                )
            }
            Ok(RunOutcome::Other(status)) => ChatReply::assistant(format!(
                "I encountered an issue processing your request. Status: {}",
                status
            )),
            Err(e) => {
                tracing::error!("Hosted agent request failed: {}", e);
                ChatReply::assistant(ERROR_REPLY)
            }
        }
    }
}

/// Newest assistant message's text, concatenated across its text parts.
fn extract_assistant_text(messages: &MessageList) -> Option<String> {
    let message = messages.data.iter().find(|m| m.role == "assistant")?;
    let text: String = message
        .content
        .iter()
        .filter_map(|part| part.text.as_ref().map(|t| t.value.as_str()))
        .collect();
    if text.is_empty() {
        Some("I received your message but couldn't generate a response.".to_string())
    } else {
        Some(text)
    }
}

#[derive(Debug, Deserialize)]
struct ThreadResponse {
    id: String,
}

#[derive(Debug, Deserialize)]
struct RunResponse {
    id: String,
    status: String,
    #[serde(default)]
    last_error: Option<serde_json::Value>,
}

/// Message list as returned by the service, newest first.
#[derive(Debug, Deserialize)]
struct MessageList {
    data: Vec<ThreadMessage>,
}

#[derive(Debug, Deserialize)]
struct ThreadMessage {
    role: String,
    #[serde(default)]
    content: Vec<MessageContentItem>,
}

#[derive(Debug, Deserialize)]
struct MessageContentItem {
    #[serde(default)]
    text: Option<TextContent>,
}

#[derive(Debug, Deserialize)]
struct TextContent {
    value: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::Role;

    #[tokio::test]
    async fn unconfigured_agent_degrades_instead_of_failing() {
        let agent = HostedAgent::new(None);
        let reply = agent.process_message("hello", Some("ignored")).await;
        assert!(matches!(reply.role, Role::Assistant));
        assert!(reply.content.contains("not properly configured"));
    }

    #[test]
    fn extracts_newest_assistant_text() {
        let list: MessageList = serde_json::from_value(serde_json::json!({
            "data": [
                {"role": "assistant", "content": [
                    {"type": "text", "text": {"value": "You have "}},
                    {"type": "text", "text": {"value": "2 tasks."}}
                ]},
                {"role": "user", "content": [
                    {"type": "text", "text": {"value": "list my tasks"}}
                ]}
            ]
        }))
        .unwrap();

        assert_eq!(extract_assistant_text(&list).unwrap(), "You have 2 tasks.");
    }

    #[test]
    fn missing_assistant_message_yields_none() {
        let list: MessageList = serde_json::from_value(serde_json::json!({
            "data": [
                {"role": "user", "content": [
                    {"type": "text", "text": {"value": "hello"}}
                ]}
            ]
        }))
        .unwrap();

        assert!(extract_assistant_text(&list).is_none());
    }

    #[test]
    fn empty_assistant_content_gets_placeholder_text() {
        let list: MessageList = serde_json::from_value(serde_json::json!({
            "data": [{"role": "assistant", "content": []}]
        }))
        .unwrap();

        let text = extract_assistant_text(&list).unwrap();
        assert!(text.contains("couldn't generate a response"));
    }
}
