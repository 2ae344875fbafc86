//! Task CRUD endpoints.
//!
//! Store outcomes map onto transport results: validation failures become
//! 400, absent ids become 404, and storage faults become an opaque 500 with
//! the diagnostic kept in the log.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use std::sync::Arc;

use crate::store::{StoreError, Task};

use super::routes::AppState;

/// Create task routes.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(list_tasks).post(create_task))
        .route("/:id", get(get_task).put(update_task).delete(delete_task))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTaskRequest {
    pub title: String,
    #[serde(default)]
    pub is_complete: Option<bool>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateTaskRequest {
    pub title: Option<String>,
    pub is_complete: Option<bool>,
}

/// Log the storage fault and hide the detail behind a generic message.
fn storage_failure(action: &str, e: StoreError) -> (StatusCode, String) {
    tracing::error!("Error {} task(s): {}", action, e);
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        format!("Failed to {} task", action),
    )
}

fn not_found(id: i64) -> (StatusCode, String) {
    (StatusCode::NOT_FOUND, format!("Task {} not found", id))
}

/// GET /api/tasks - List all tasks.
async fn list_tasks(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<Task>>, (StatusCode, String)> {
    state
        .store
        .list_all()
        .await
        .map(Json)
        .map_err(|e| {
            tracing::error!("Error getting tasks: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to get tasks".to_string(),
            )
        })
}

/// POST /api/tasks - Create a new task.
async fn create_task(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateTaskRequest>,
) -> Result<(StatusCode, Json<Task>), (StatusCode, String)> {
    match state
        .store
        .create(&req.title, req.is_complete.unwrap_or(false))
        .await
    {
        Ok(task) => {
            tracing::info!("Created task {} ({:?})", task.id, task.title);
            Ok((StatusCode::CREATED, Json(task)))
        }
        Err(StoreError::InvalidTitle) => Err((
            StatusCode::BAD_REQUEST,
            "Title is required".to_string(),
        )),
        Err(e) => Err(storage_failure("create", e)),
    }
}

/// GET /api/tasks/:id - Get a task by its ID.
async fn get_task(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<Task>, (StatusCode, String)> {
    match state.store.get(id).await {
        Ok(Some(task)) => Ok(Json(task)),
        Ok(None) => Err(not_found(id)),
        Err(e) => Err(storage_failure("get", e)),
    }
}

/// PUT /api/tasks/:id - Update a task by its ID.
async fn update_task(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    Json(req): Json<UpdateTaskRequest>,
) -> Result<Json<Task>, (StatusCode, String)> {
    match state.store.update(id, req.title, req.is_complete).await {
        Ok(true) => {}
        Ok(false) => return Err(not_found(id)),
        Err(StoreError::InvalidTitle) => {
            return Err((
                StatusCode::BAD_REQUEST,
                "Title must not be empty".to_string(),
            ))
        }
        Err(e) => return Err(storage_failure("update", e)),
    }

    // Refetch so the response reflects exactly what is stored.
    match state.store.get(id).await {
        Ok(Some(task)) => Ok(Json(task)),
        Ok(None) => Err(not_found(id)),
        Err(e) => Err(storage_failure("update", e)),
    }
}

/// DELETE /api/tasks/:id - Delete a task by its ID.
async fn delete_task(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<serde_json::Value>, (StatusCode, String)> {
    match state.store.delete(id).await {
        Ok(true) => Ok(Json(
            serde_json::json!({"message": "Task deleted successfully"}),
        )),
        Ok(false) => Err(not_found(id)),
        Err(e) => Err(storage_failure("delete", e)),
    }
}
