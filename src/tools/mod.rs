//! Tools the chat agents can call against the task store.
//!
//! Each tool wraps one store operation and formats the outcome as a short
//! sentence the model can relay verbatim. "Not found" is a normal result
//! here, not an error; `Err` is reserved for malformed arguments and
//! storage faults.

mod task_ops;

pub use task_ops::{CreateTask, DeleteTask, GetTask, GetTasks, UpdateTask};

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::llm::{FunctionDefinition, ToolDefinition};
use crate::store::TaskStore;

/// A callable tool exposed to the model.
#[async_trait]
pub trait TaskTool: Send + Sync {
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    /// JSON schema for the tool's arguments.
    fn parameters_schema(&self) -> Value;

    /// Run the tool, returning a natural-language result.
    async fn execute(&self, args: Value) -> anyhow::Result<String>;
}

/// Explicit mapping of tool names to implementations.
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn TaskTool>>,
}

impl ToolRegistry {
    /// Registry with the five task CRUD tools bound to `store`.
    pub fn for_store(store: Arc<TaskStore>) -> Self {
        let tools: Vec<Arc<dyn TaskTool>> = vec![
            Arc::new(CreateTask::new(Arc::clone(&store))),
            Arc::new(GetTasks::new(Arc::clone(&store))),
            Arc::new(GetTask::new(Arc::clone(&store))),
            Arc::new(UpdateTask::new(Arc::clone(&store))),
            Arc::new(DeleteTask::new(store)),
        ];
        Self {
            tools: tools
                .into_iter()
                .map(|t| (t.name().to_string(), t))
                .collect(),
        }
    }

    /// Tool definitions to advertise to the model.
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        let mut defs: Vec<ToolDefinition> = self
            .tools
            .values()
            .map(|t| {
                ToolDefinition::function(FunctionDefinition {
                    name: t.name().to_string(),
                    description: t.description().to_string(),
                    parameters: t.parameters_schema(),
                })
            })
            .collect();
        // Stable ordering keeps request payloads reproducible.
        defs.sort_by(|a, b| a.function.name.cmp(&b.function.name));
        defs
    }

    /// Execute a tool by name with already-parsed JSON arguments.
    pub async fn execute(&self, name: &str, args: Value) -> anyhow::Result<String> {
        let tool = self
            .tools
            .get(name)
            .ok_or_else(|| anyhow::anyhow!("Unknown tool: {}", name))?;
        tool.execute(args).await
    }
}
