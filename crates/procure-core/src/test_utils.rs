//! Test utilities for procure-core
//!
//! A mock AI server speaking both the OpenAI-compatible and Ollama wire
//! formats, for exercising the real HTTP backends in integration tests.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    extract::{Json, State},
    http::StatusCode,
    routing::{get, post},
    Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::sync::oneshot;

/// Plan returned when no canned response is configured
pub const DEFAULT_PLAN_RESPONSE: &str = r#"```json
{
  "main_group_mappings": {},
  "sub_group_mappings": {},
  "grouping_strategy": {"approach": "mock_server", "total_main_groups": 0, "total_sub_groups": 0, "coverage_percentage": 0}
}
```"#;

/// Sub-group plan returned when no canned response is configured
pub const DEFAULT_SUB_PLAN_RESPONSE: &str = r#"{"sub_groups": [{"name": "Everything", "values": [], "reasoning": "mock"}]}"#;

struct ServerState {
    plan_response: String,
    sub_plan_response: String,
    /// Status for completion endpoints; health endpoints always succeed
    status: StatusCode,
}

impl ServerState {
    /// Pick the canned body by the kind of prompt that was sent
    fn content_for(&self, prompt: &str) -> &str {
        if prompt.contains("\"sub_groups\"") {
            &self.sub_plan_response
        } else {
            &self.plan_response
        }
    }
}

/// Mock AI server for tests
pub struct MockAiServer {
    addr: SocketAddr,
    shutdown_tx: Option<oneshot::Sender<()>>,
}

impl MockAiServer {
    /// Start with the default canned responses
    pub async fn start() -> Self {
        Self::start_with_responses(DEFAULT_PLAN_RESPONSE, DEFAULT_SUB_PLAN_RESPONSE).await
    }

    /// Start with specific raw model outputs for plan and sub-plan prompts
    pub async fn start_with_responses(plan: impl Into<String>, sub_plan: impl Into<String>) -> Self {
        Self::spawn(ServerState {
            plan_response: plan.into(),
            sub_plan_response: sub_plan.into(),
            status: StatusCode::OK,
        })
        .await
    }

    /// Start a server whose completion endpoints always answer `status`
    pub async fn start_failing(status: StatusCode) -> Self {
        Self::spawn(ServerState {
            plan_response: String::new(),
            sub_plan_response: String::new(),
            status,
        })
        .await
    }

    async fn spawn(state: ServerState) -> Self {
        let app = Router::new()
            .route("/v1/models", get(handle_models))
            .route("/v1/chat/completions", post(handle_chat_completions))
            .route("/api/tags", get(handle_tags))
            .route("/api/generate", post(handle_generate))
            .with_state(Arc::new(state));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let (shutdown_tx, shutdown_rx) = oneshot::channel();

        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    shutdown_rx.await.ok();
                })
                .await
                .unwrap();
        });

        Self {
            addr,
            shutdown_tx: Some(shutdown_tx),
        }
    }

    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn stop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

impl Drop for MockAiServer {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn handle_models() -> Json<Value> {
    Json(json!({"object": "list", "data": [{"id": "mock-model", "object": "model"}]}))
}

async fn handle_tags() -> Json<Value> {
    Json(json!({"models": [{"name": "llama3.2:latest", "modified_at": "2024-01-01T00:00:00Z", "size": 4_000_000_000u64}]}))
}

#[derive(Deserialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
}

#[derive(Deserialize)]
struct ChatMessage {
    content: String,
}

async fn handle_chat_completions(State(state): State<Arc<ServerState>>, Json(request): Json<ChatRequest>) -> (StatusCode, Json<Value>) {
    if !state.status.is_success() {
        return (state.status, Json(json!({"error": {"message": "mock failure"}})));
    }
    let prompt = request.messages.last().map(|m| m.content.as_str()).unwrap_or("");
    let content = state.content_for(prompt);
    (
        StatusCode::OK,
        Json(json!({
            "id": "chatcmpl-mock",
            "object": "chat.completion",
            "model": request.model,
            "choices": [{"index": 0, "message": {"role": "assistant", "content": content}, "finish_reason": "stop"}]
        })),
    )
}

#[derive(Deserialize)]
struct GenerateRequest {
    model: String,
    prompt: String,
}

async fn handle_generate(State(state): State<Arc<ServerState>>, Json(request): Json<GenerateRequest>) -> (StatusCode, Json<Value>) {
    if !state.status.is_success() {
        return (state.status, Json(json!({"error": "mock failure"})));
    }
    let content = state.content_for(&request.prompt);
    (
        StatusCode::OK,
        Json(json!({"model": request.model, "response": content, "done": true})),
    )
}
