//! HTTP server wiring and process lifecycle.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use axum::{routing::get, Json, Router};
use serde::Serialize;
use tower_http::cors::CorsLayer;
use tower_http::services::{ServeDir, ServeFile};
use tower_http::trace::TraceLayer;

use crate::agents::{ChatAgent, HostedAgent, ToolCallAgent};
use crate::config::Config;
use crate::store::TaskStore;

use super::{chat, tasks};

/// Shared application state.
pub struct AppState {
    pub store: Arc<TaskStore>,
    /// Chat adapters keyed by the provider name in the request path.
    pub agents: HashMap<String, Arc<dyn ChatAgent>>,
}

/// Build the application router: API routes plus the static frontend.
pub fn router(state: Arc<AppState>, public_dir: &Path) -> Router {
    let spa = ServeDir::new(public_dir)
        .fallback(ServeFile::new(public_dir.join("index.html")));

    Router::new()
        .route("/api/health", get(health))
        .nest("/api/tasks", tasks::routes())
        .nest("/api/chat", chat::routes())
        .with_state(state)
        .fallback_service(spa)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

fn build_agents(config: &Config, store: Arc<TaskStore>) -> HashMap<String, Arc<dyn ChatAgent>> {
    let mut agents: HashMap<String, Arc<dyn ChatAgent>> = HashMap::new();
    agents.insert(
        "openai".to_string(),
        Arc::new(ToolCallAgent::from_config(config, store)),
    );
    agents.insert(
        "foundry".to_string(),
        Arc::new(HostedAgent::from_config(config)),
    );
    agents
}

/// Start the HTTP server and run until a shutdown signal arrives.
pub async fn serve(config: Config) -> anyhow::Result<()> {
    let store = Arc::new(TaskStore::open(&config.db_path).await?);
    let agents = build_agents(&config, Arc::clone(&store));

    let state = Arc::new(AppState {
        store: Arc::clone(&store),
        agents,
    });

    if !config.public_dir.exists() {
        tracing::info!(
            "Static directory {} not found; frontend requests will 404",
            config.public_dir.display()
        );
    }

    let app = router(state, &config.public_dir);

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Shutdown signal received, closing task store");
    store.shutdown().await;

    Ok(())
}

/// Wait for SIGINT or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

/// Health check endpoint.
async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    use axum::body::{to_bytes, Body};
    use axum::http::{header, Request, StatusCode};
    use serde_json::{json, Value};
    use tempfile::tempdir;
    use tower::ServiceExt;

    async fn test_app() -> (tempfile::TempDir, Router) {
        let temp = tempdir().unwrap();
        let store = Arc::new(TaskStore::open(temp.path().join("tasks.db")).await.unwrap());

        let mut agents: HashMap<String, Arc<dyn ChatAgent>> = HashMap::new();
        agents.insert(
            "openai".to_string(),
            Arc::new(ToolCallAgent::new(None, Arc::clone(&store))),
        );
        agents.insert("foundry".to_string(), Arc::new(HostedAgent::new(None)));

        let state = Arc::new(AppState { store, agents });
        let app = router(state, &temp.path().join("public"));
        (temp, app)
    }

    fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn get_request(uri: &str) -> Request<Body> {
        Request::builder()
            .method("GET")
            .uri(uri)
            .body(Body::empty())
            .unwrap()
    }

    async fn body_json(response: axum::response::Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn health_reports_ok() {
        let (_temp, app) = test_app().await;

        let response = app.oneshot(get_request("/api/health")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn task_crud_scenario_over_http() {
        let (_temp, app) = test_app().await;

        // Create
        let response = app
            .clone()
            .oneshot(json_request("POST", "/api/tasks", json!({"title": "Write spec"})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        let body = body_json(response).await;
        assert_eq!(
            body,
            json!({"id": 1, "title": "Write spec", "isComplete": false})
        );

        // Read back
        let response = app.clone().oneshot(get_request("/api/tasks/1")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            body_json(response).await,
            json!({"id": 1, "title": "Write spec", "isComplete": false})
        );

        // Complete it
        let response = app
            .clone()
            .oneshot(json_request("PUT", "/api/tasks/1", json!({"isComplete": true})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            body_json(response).await,
            json!({"id": 1, "title": "Write spec", "isComplete": true})
        );

        // Delete
        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .method("DELETE")
                    .uri("/api/tasks/1")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            body_json(response).await,
            json!({"message": "Task deleted successfully"})
        );

        // Gone
        let response = app.clone().oneshot(get_request("/api/tasks/1")).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn list_returns_all_tasks_in_id_order() {
        let (_temp, app) = test_app().await;

        let response = app.clone().oneshot(get_request("/api/tasks")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await, json!([]));

        for title in ["one", "two"] {
            let response = app
                .clone()
                .oneshot(json_request("POST", "/api/tasks", json!({"title": title})))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::CREATED);
        }

        let response = app.clone().oneshot(get_request("/api/tasks")).await.unwrap();
        let body = body_json(response).await;
        assert_eq!(
            body,
            json!([
                {"id": 1, "title": "one", "isComplete": false},
                {"id": 2, "title": "two", "isComplete": false}
            ])
        );
    }

    #[tokio::test]
    async fn empty_title_is_rejected_and_nothing_is_created() {
        let (_temp, app) = test_app().await;

        let response = app
            .clone()
            .oneshot(json_request("POST", "/api/tasks", json!({"title": ""})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = app.clone().oneshot(get_request("/api/tasks")).await.unwrap();
        assert_eq!(body_json(response).await, json!([]));
    }

    #[tokio::test]
    async fn update_and_delete_of_missing_id_return_404() {
        let (_temp, app) = test_app().await;

        let response = app
            .clone()
            .oneshot(json_request("PUT", "/api/tasks/42", json!({"isComplete": true})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .method("DELETE")
                    .uri("/api/tasks/42")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn chat_with_unconfigured_adapter_still_returns_200() {
        let (_temp, app) = test_app().await;

        for provider in ["openai", "foundry"] {
            let response = app
                .clone()
                .oneshot(json_request(
                    "POST",
                    &format!("/api/chat/{provider}"),
                    json!({"message": "list my tasks"}),
                ))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::OK);
            let body = body_json(response).await;
            assert_eq!(body["role"], "assistant");
            assert!(body["content"]
                .as_str()
                .unwrap()
                .contains("not properly configured"));
        }
    }

    #[tokio::test]
    async fn chat_validates_message_and_provider() {
        let (_temp, app) = test_app().await;

        let response = app
            .clone()
            .oneshot(json_request("POST", "/api/chat/openai", json!({"message": "  "})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = app
            .clone()
            .oneshot(json_request(
                "POST",
                "/api/chat/clippy",
                json!({"message": "hello"}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
