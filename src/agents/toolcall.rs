//! Tool-calling chat agent backed by a chat-completions model.
//!
//! Runs a bounded tool loop: the model sees the five task tools, and every
//! tool call round-trips through the task store before the model produces
//! its final reply. Conversation state is kept per session id.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{ChatAgent, ChatReply};
use crate::config::Config;
use crate::llm::{AzureOpenAiClient, ChatMessage, LlmClient, Role};
use crate::store::TaskStore;
use crate::tools::ToolRegistry;

const SYSTEM_PROMPT: &str = "You are a helpful task-management assistant. \
Use the available tools to create, list, look up, update, and delete tasks \
when the user asks for it. Keep replies short and conversational.";

/// Rounds of tool execution allowed for a single user message.
const MAX_TOOL_ROUNDS: usize = 8;

const UNCONFIGURED_REPLY: &str =
    "The task assistant is not properly configured. Please check the Azure OpenAI settings.";
const ERROR_REPLY: &str = "I apologize, but I encountered an error processing your request.";

/// Chat agent that answers with the help of the task tools.
pub struct ToolCallAgent {
    llm: Option<Arc<dyn LlmClient>>,
    tools: ToolRegistry,
    sessions: RwLock<HashMap<String, Vec<ChatMessage>>>,
}

impl ToolCallAgent {
    pub fn new(llm: Option<Arc<dyn LlmClient>>, store: Arc<TaskStore>) -> Self {
        Self {
            llm,
            tools: ToolRegistry::for_store(store),
            sessions: RwLock::new(HashMap::new()),
        }
    }

    /// Build the agent from configuration; a missing Azure OpenAI section
    /// yields an agent that still answers, with a degraded reply.
    pub fn from_config(config: &Config, store: Arc<TaskStore>) -> Self {
        let llm: Option<Arc<dyn LlmClient>> = match &config.azure_openai {
            Some(azure) => Some(Arc::new(AzureOpenAiClient::new(
                azure.endpoint.clone(),
                azure.deployment.clone(),
                azure.api_key.clone(),
                azure.api_version.clone(),
            ))),
            None => {
                tracing::warn!("Azure OpenAI configuration missing for tool-calling agent");
                None
            }
        };
        Self::new(llm, store)
    }

    async fn history_for(&self, session_key: &str) -> Vec<ChatMessage> {
        self.sessions
            .read()
            .await
            .get(session_key)
            .cloned()
            .unwrap_or_else(|| vec![ChatMessage::new(Role::System, SYSTEM_PROMPT)])
    }
}

#[async_trait]
impl ChatAgent for ToolCallAgent {
    async fn process_message(&self, message: &str, session_id: Option<&str>) -> ChatReply {
        let Some(llm) = &self.llm else {
            return ChatReply::assistant(UNCONFIGURED_REPLY);
        };

        // A missing session id still gets a keyed conversation; the caller
        // just has no way to resume it.
        let session_key = session_id
            .map(str::to_string)
            .unwrap_or_else(|| Uuid::new_v4().to_string());

        let mut messages = self.history_for(&session_key).await;
        messages.push(ChatMessage::new(Role::User, message));

        let definitions = self.tools.definitions();

        for _ in 0..MAX_TOOL_ROUNDS {
            let response = match llm.chat_completion(&messages, Some(&definitions)).await {
                Ok(r) => r,
                Err(e) => {
                    tracing::error!("Tool-calling agent request failed: {}", e);
                    return ChatReply::assistant(ERROR_REPLY);
                }
            };

            match response.tool_calls {
                Some(calls) if !calls.is_empty() => {
                    messages.push(ChatMessage::assistant_with_tools(
                        response.content.clone(),
                        calls.clone(),
                    ));

                    for call in &calls {
                        let args = if call.function.arguments.trim().is_empty() {
                            Ok(serde_json::json!({}))
                        } else {
                            serde_json::from_str(&call.function.arguments)
                        };

                        let result = match args {
                            Ok(args) => match self.tools.execute(&call.function.name, args).await
                            {
                                Ok(text) => text,
                                Err(e) => {
                                    tracing::warn!(
                                        "Tool {} failed: {}",
                                        call.function.name,
                                        e
                                    );
                                    format!("The {} tool failed: {}", call.function.name, e)
                                }
                            },
                            Err(e) => {
                                format!("Invalid arguments for {}: {}", call.function.name, e)
                            }
                        };

                        messages.push(ChatMessage::tool_result(&call.id, result));
                    }
                }
                _ => {
                    let content = response
                        .content
                        .filter(|c| !c.is_empty())
                        .unwrap_or_else(|| {
                            "I apologize, but I couldn't process your request.".to_string()
                        });
                    messages.push(ChatMessage::new(Role::Assistant, content.clone()));
                    self.sessions.write().await.insert(session_key, messages);
                    return ChatReply::assistant(content);
                }
            }
        }

        tracing::warn!("Tool loop exceeded {} rounds", MAX_TOOL_ROUNDS);
        ChatReply::assistant(ERROR_REPLY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{ChatResponse, FunctionCall, ToolCall, ToolDefinition};
    use std::collections::VecDeque;
    use tempfile::tempdir;
    use tokio::sync::Mutex;

    /// LLM double that replays scripted responses and records how many
    /// messages each request carried.
    struct ScriptedLlm {
        responses: Mutex<VecDeque<ChatResponse>>,
        request_sizes: Mutex<Vec<usize>>,
    }

    impl ScriptedLlm {
        fn new(responses: Vec<ChatResponse>) -> Self {
            Self {
                responses: Mutex::new(responses.into()),
                request_sizes: Mutex::new(Vec::new()),
            }
        }

        fn text(content: &str) -> ChatResponse {
            ChatResponse {
                content: Some(content.to_string()),
                tool_calls: None,
                finish_reason: Some("stop".to_string()),
            }
        }

        fn tool_call(name: &str, arguments: &str) -> ChatResponse {
            ChatResponse {
                content: None,
                tool_calls: Some(vec![ToolCall {
                    id: "call_1".to_string(),
                    call_type: "function".to_string(),
                    function: FunctionCall {
                        name: name.to_string(),
                        arguments: arguments.to_string(),
                    },
                }]),
                finish_reason: Some("tool_calls".to_string()),
            }
        }
    }

    #[async_trait]
    impl LlmClient for ScriptedLlm {
        async fn chat_completion(
            &self,
            messages: &[ChatMessage],
            _tools: Option<&[ToolDefinition]>,
        ) -> anyhow::Result<ChatResponse> {
            self.request_sizes.lock().await.push(messages.len());
            self.responses
                .lock()
                .await
                .pop_front()
                .ok_or_else(|| anyhow::anyhow!("no scripted response left"))
        }
    }

    async fn agent_with(
        llm: Option<Arc<dyn LlmClient>>,
    ) -> (tempfile::TempDir, Arc<TaskStore>, ToolCallAgent) {
        let temp = tempdir().unwrap();
        let store = Arc::new(TaskStore::open(temp.path().join("tasks.db")).await.unwrap());
        let agent = ToolCallAgent::new(llm, Arc::clone(&store));
        (temp, store, agent)
    }

    #[tokio::test]
    async fn unconfigured_agent_degrades_instead_of_failing() {
        let (_temp, _store, agent) = agent_with(None).await;

        let reply = agent.process_message("create a task", None).await;
        assert!(matches!(reply.role, Role::Assistant));
        assert!(reply.content.contains("not properly configured"));
    }

    #[tokio::test]
    async fn tool_calls_round_trip_through_the_store() {
        let llm = Arc::new(ScriptedLlm::new(vec![
            ScriptedLlm::tool_call("createTask", r#"{"title": "Buy milk"}"#),
            ScriptedLlm::text("Created \"Buy milk\" for you."),
        ]));
        let (_temp, store, agent) = agent_with(Some(llm)).await;

        let reply = agent.process_message("add buy milk to my list", None).await;
        assert_eq!(reply.content, "Created \"Buy milk\" for you.");

        let tasks = store.list_all().await.unwrap();
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].title, "Buy milk");
    }

    #[tokio::test]
    async fn session_history_is_resumed_by_id() {
        let llm = Arc::new(ScriptedLlm::new(vec![
            ScriptedLlm::text("Hello!"),
            ScriptedLlm::text("Hello again!"),
        ]));
        let sizes = Arc::clone(&llm);
        let (_temp, _store, agent) = agent_with(Some(llm)).await;

        agent.process_message("hi", Some("session-1")).await;
        agent.process_message("hi again", Some("session-1")).await;

        // First request: system + user. Second: system + user + assistant + user.
        assert_eq!(*sizes.request_sizes.lock().await, vec![2, 4]);
    }

    #[tokio::test]
    async fn absent_session_id_starts_fresh_each_time() {
        let llm = Arc::new(ScriptedLlm::new(vec![
            ScriptedLlm::text("Hello!"),
            ScriptedLlm::text("Hello!"),
        ]));
        let sizes = Arc::clone(&llm);
        let (_temp, _store, agent) = agent_with(Some(llm)).await;

        agent.process_message("hi", None).await;
        agent.process_message("hi", None).await;

        assert_eq!(*sizes.request_sizes.lock().await, vec![2, 2]);
    }

    #[tokio::test]
    async fn upstream_failure_degrades_to_apology() {
        let llm = Arc::new(ScriptedLlm::new(vec![]));
        let (_temp, _store, agent) = agent_with(Some(llm)).await;

        let reply = agent.process_message("hi", None).await;
        assert_eq!(reply.content, ERROR_REPLY);
    }
}
