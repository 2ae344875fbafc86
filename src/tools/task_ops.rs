//! Task CRUD tools: create, list, get, update, delete.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};

use super::TaskTool;
use crate::store::{StoreError, Task, TaskStore};

fn status_word(task: &Task) -> &'static str {
    if task.is_complete {
        "Complete"
    } else {
        "Incomplete"
    }
}

fn require_id(args: &Value) -> anyhow::Result<i64> {
    args["id"]
        .as_i64()
        .ok_or_else(|| anyhow::anyhow!("Missing 'id' argument"))
}

/// Create a new task.
pub struct CreateTask {
    store: Arc<TaskStore>,
}

impl CreateTask {
    pub fn new(store: Arc<TaskStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl TaskTool for CreateTask {
    fn name(&self) -> &str {
        "createTask"
    }

    fn description(&self) -> &str {
        "Create a new task with a title and optional completion status."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "title": {
                    "type": "string",
                    "description": "The title of the task"
                },
                "isComplete": {
                    "type": "boolean",
                    "description": "Whether the task is complete",
                    "default": false
                }
            },
            "required": ["title"]
        })
    }

    async fn execute(&self, args: Value) -> anyhow::Result<String> {
        let title = args["title"]
            .as_str()
            .ok_or_else(|| anyhow::anyhow!("Missing 'title' argument"))?;
        let is_complete = args["isComplete"].as_bool().unwrap_or(false);

        match self.store.create(title, is_complete).await {
            Ok(task) => Ok(format!(
                "Task created successfully: \"{}\" (ID: {})",
                task.title, task.id
            )),
            Err(StoreError::InvalidTitle) => {
                Ok("The task title must not be empty.".to_string())
            }
            Err(e) => Err(e.into()),
        }
    }
}

/// List all tasks.
pub struct GetTasks {
    store: Arc<TaskStore>,
}

impl GetTasks {
    pub fn new(store: Arc<TaskStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl TaskTool for GetTasks {
    fn name(&self) -> &str {
        "getTasks"
    }

    fn description(&self) -> &str {
        "Retrieve all tasks in the task list."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {}
        })
    }

    async fn execute(&self, _args: Value) -> anyhow::Result<String> {
        let tasks = self.store.list_all().await?;
        if tasks.is_empty() {
            return Ok("No tasks found.".to_string());
        }

        let task_list = tasks
            .iter()
            .map(|t| format!("- {}: {} ({})", t.id, t.title, status_word(t)))
            .collect::<Vec<_>>()
            .join("\n");
        Ok(format!("Found {} tasks:\n{}", tasks.len(), task_list))
    }
}

/// Get a specific task by ID.
pub struct GetTask {
    store: Arc<TaskStore>,
}

impl GetTask {
    pub fn new(store: Arc<TaskStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl TaskTool for GetTask {
    fn name(&self) -> &str {
        "getTask"
    }

    fn description(&self) -> &str {
        "Retrieve a task by its unique ID."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "id": {
                    "type": "integer",
                    "description": "The ID of the task to retrieve"
                }
            },
            "required": ["id"]
        })
    }

    async fn execute(&self, args: Value) -> anyhow::Result<String> {
        let id = require_id(&args)?;
        match self.store.get(id).await? {
            Some(task) => Ok(format!(
                "Task {}: \"{}\" - Status: {}",
                task.id,
                task.title,
                status_word(&task)
            )),
            None => Ok(format!("Task with ID {} not found.", id)),
        }
    }
}

/// Update a task by ID.
pub struct UpdateTask {
    store: Arc<TaskStore>,
}

impl UpdateTask {
    pub fn new(store: Arc<TaskStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl TaskTool for UpdateTask {
    fn name(&self) -> &str {
        "updateTask"
    }

    fn description(&self) -> &str {
        "Update a task's title or completion status by its ID."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "id": {
                    "type": "integer",
                    "description": "The ID of the task to update"
                },
                "title": {
                    "type": "string",
                    "description": "The new title for the task"
                },
                "isComplete": {
                    "type": "boolean",
                    "description": "The new completion status"
                }
            },
            "required": ["id"]
        })
    }

    async fn execute(&self, args: Value) -> anyhow::Result<String> {
        let id = require_id(&args)?;
        let title = args["title"].as_str().map(str::to_string);
        let is_complete = args["isComplete"].as_bool();

        match self.store.update(id, title, is_complete).await {
            Ok(true) => Ok(format!("Task {} updated successfully.", id)),
            Ok(false) => Ok(format!("Task with ID {} not found.", id)),
            Err(StoreError::InvalidTitle) => {
                Ok("The task title must not be empty.".to_string())
            }
            Err(e) => Err(e.into()),
        }
    }
}

/// Delete a task by ID.
pub struct DeleteTask {
    store: Arc<TaskStore>,
}

impl DeleteTask {
    pub fn new(store: Arc<TaskStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl TaskTool for DeleteTask {
    fn name(&self) -> &str {
        "deleteTask"
    }

    fn description(&self) -> &str {
        "Delete a task by its unique ID."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "id": {
                    "type": "integer",
                    "description": "The ID of the task to delete"
                }
            },
            "required": ["id"]
        })
    }

    async fn execute(&self, args: Value) -> anyhow::Result<String> {
        let id = require_id(&args)?;
        if self.store.delete(id).await? {
            Ok(format!("Task {} deleted successfully.", id))
        } else {
            Ok(format!("Task with ID {} not found.", id))
        }
    }
}
