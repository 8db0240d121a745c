//! Pluggable AI backend for plan-driven grouping
//!
//! The backend is an oracle: it is asked for a grouping plan and either
//! answers or fails. Callers always have a deterministic fallback, so every
//! error here is recoverable.
//!
//! # Architecture
//!
//! - `AIBackend` trait: the two plan requests plus health/model/host
//! - `AIClient` enum: Clone + static dispatch over the concrete backends
//! - Backends: `OllamaBackend`, `OpenAICompatibleBackend`, `MockBackend`
//!
//! # Configuration
//!
//! Environment variables:
//! - `AI_BACKEND`: ollama, openai_compatible (openai, vllm, localai, llamacpp) or mock. Default: ollama
//! - `OLLAMA_HOST`: Ollama server URL (required for ollama)
//! - `OLLAMA_MODEL`: model name (default: llama3.2)
//! - `OPENAI_COMPATIBLE_HOST`: server URL (default https://api.openai.com when `OPENAI_API_KEY` is set)
//! - `OPENAI_COMPATIBLE_MODEL`: model name (default: gpt-4)
//! - `OPENAI_COMPATIBLE_API_KEY` or `OPENAI_API_KEY`: bearer token (optional)

mod mock;
mod ollama;
mod openai_compatible;
pub mod parsing;
pub mod types;

pub use mock::MockBackend;
pub use ollama::OllamaBackend;
pub use openai_compatible::OpenAICompatibleBackend;
pub use types::*;

use std::collections::HashMap;
use std::sync::RwLock;
use std::time::Duration;

use async_trait::async_trait;

use crate::config::OracleConfig;
use crate::error::{Error, Result};
use crate::plan::{GroupingPlan, SubGroupPlan};
use crate::prompts::{PromptId, PromptLibrary};

/// Request timeout used when the caller does not set one
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Transport and generation settings applied to every request
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RequestOptions {
    pub timeout: Duration,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl Default for RequestOptions {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            temperature: 0.3,
            max_tokens: 3000,
        }
    }
}

impl From<&OracleConfig> for RequestOptions {
    fn from(config: &OracleConfig) -> Self {
        Self {
            timeout: config.timeout,
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        }
    }
}

impl RequestOptions {
    /// HTTP client honouring the timeout
    pub(crate) fn http_client(&self) -> reqwest::Client {
        reqwest::Client::builder()
            .timeout(self.timeout)
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!(error = %e, "Failed to build HTTP client with timeout, using defaults");
                reqwest::Client::new()
            })
    }
}

/// Backend interface. Each request is a single attempt; no retries.
#[async_trait]
pub trait AIBackend: Send + Sync {
    /// Map main (and optional sub) column values onto named groups
    async fn request_grouping_plan(&self, request: &PlanRequest) -> Result<GroupingPlan>;

    /// Split one main group's values into sub-groups
    async fn request_sub_group_plan(&self, request: &PlanRequest) -> Result<SubGroupPlan>;

    async fn health_check(&self) -> bool;

    fn model(&self) -> &str;

    fn host(&self) -> &str;
}

/// Concrete backend, constructed once and handed to the engine
#[derive(Clone)]
pub enum AIClient {
    Ollama(OllamaBackend),
    OpenAICompatible(OpenAICompatibleBackend),
    Mock(MockBackend),
}

impl AIClient {
    /// Build from `AI_BACKEND` and friends; None when the chosen backend is not configured
    pub fn from_env() -> Option<Self> {
        let backend = std::env::var("AI_BACKEND").unwrap_or_else(|_| "ollama".to_string());

        match backend.to_lowercase().as_str() {
            "ollama" => OllamaBackend::from_env().map(AIClient::Ollama),
            "openai_compatible" | "openai" | "vllm" | "localai" | "llamacpp" => {
                OpenAICompatibleBackend::from_env().map(AIClient::OpenAICompatible)
            }
            "mock" => Some(AIClient::Mock(MockBackend::new())),
            _ => {
                tracing::warn!(backend = %backend, "Unknown AI_BACKEND, falling back to ollama");
                OllamaBackend::from_env().map(AIClient::Ollama)
            }
        }
    }

    pub fn ollama(host: &str, model: &str) -> Self {
        AIClient::Ollama(OllamaBackend::new(host, model))
    }

    pub fn openai_compatible(host: &str, model: &str) -> Self {
        AIClient::OpenAICompatible(OpenAICompatibleBackend::new(host, model))
    }

    pub fn mock() -> Self {
        AIClient::Mock(MockBackend::new())
    }

    /// Short backend name for logs and CLI output
    pub fn backend_name(&self) -> &'static str {
        match self {
            AIClient::Ollama(_) => "ollama",
            AIClient::OpenAICompatible(_) => "openai_compatible",
            AIClient::Mock(_) => "mock",
        }
    }

    pub fn with_model(&self, model: &str) -> Self {
        match self {
            AIClient::Ollama(b) => AIClient::Ollama(b.with_model(model)),
            AIClient::OpenAICompatible(b) => AIClient::OpenAICompatible(b.with_model(model)),
            AIClient::Mock(b) => AIClient::Mock(b.with_model(model)),
        }
    }

    /// Same backend with new timeout and generation settings
    pub fn with_options(&self, options: RequestOptions) -> Self {
        match self {
            AIClient::Ollama(b) => AIClient::Ollama(b.with_options(options)),
            AIClient::OpenAICompatible(b) => AIClient::OpenAICompatible(b.with_options(options)),
            AIClient::Mock(b) => AIClient::Mock(b.clone()),
        }
    }
}

#[async_trait]
impl AIBackend for AIClient {
    async fn request_grouping_plan(&self, request: &PlanRequest) -> Result<GroupingPlan> {
        match self {
            AIClient::Ollama(b) => b.request_grouping_plan(request).await,
            AIClient::OpenAICompatible(b) => b.request_grouping_plan(request).await,
            AIClient::Mock(b) => b.request_grouping_plan(request).await,
        }
    }

    async fn request_sub_group_plan(&self, request: &PlanRequest) -> Result<SubGroupPlan> {
        match self {
            AIClient::Ollama(b) => b.request_sub_group_plan(request).await,
            AIClient::OpenAICompatible(b) => b.request_sub_group_plan(request).await,
            AIClient::Mock(b) => b.request_sub_group_plan(request).await,
        }
    }

    async fn health_check(&self) -> bool {
        match self {
            AIClient::Ollama(b) => b.health_check().await,
            AIClient::OpenAICompatible(b) => b.health_check().await,
            AIClient::Mock(b) => b.health_check().await,
        }
    }

    fn model(&self) -> &str {
        match self {
            AIClient::Ollama(b) => b.model(),
            AIClient::OpenAICompatible(b) => b.model(),
            AIClient::Mock(b) => b.model(),
        }
    }

    fn host(&self) -> &str {
        match self {
            AIClient::Ollama(b) => b.host(),
            AIClient::OpenAICompatible(b) => b.host(),
            AIClient::Mock(b) => b.host(),
        }
    }
}

/// Render the prompt for `id` from a plan request
pub(crate) fn render_prompt(prompts: &RwLock<PromptLibrary>, id: PromptId, request: &PlanRequest) -> Result<RenderedPrompt> {
    let main_values;
    let sub_values;
    let item_values;
    let mut vars: HashMap<&str, &str> = HashMap::new();

    match id {
        PromptId::MainGroupPlan => {
            main_values = request.main_value_lines();
            vars.insert("main_column", &request.column_name);
            vars.insert("main_values", &main_values);
            if let Some(sub_column) = request.sub_column_name.as_deref() {
                sub_values = request.sub_value_lines();
                vars.insert("sub_column", sub_column);
                vars.insert("sub_values", &sub_values);
            }
        }
        PromptId::SubGroupPlan => {
            item_values = request.item_lines();
            vars.insert("context_name", &request.context_name);
            vars.insert("column_name", &request.column_name);
            vars.insert("values", &item_values);
        }
    }

    let mut prompts = prompts
        .write()
        .map_err(|_| Error::InvalidData("Failed to acquire prompt library lock".into()))?;
    let prompt = prompts.get(id)?;
    Ok(RenderedPrompt {
        system: prompt.render_system(&vars),
        user: prompt.render_user(&vars),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> PlanRequest {
        PlanRequest::new(
            "Dataset",
            "Category",
            vec![ValueCount {
                value: "Chairs".into(),
                count: 3,
            }],
        )
    }

    #[test]
    fn test_ai_client_mock() {
        let client = AIClient::mock();
        assert_eq!(client.model(), "mock");
        assert_eq!(client.host(), "mock://localhost");
        assert_eq!(client.backend_name(), "mock");
    }

    #[tokio::test]
    async fn test_mock_health_check() {
        let client = AIClient::mock();
        assert!(client.health_check().await);
    }

    #[tokio::test]
    async fn test_mock_grouping_plan() {
        let client = AIClient::mock();
        let plan = client.request_grouping_plan(&request()).await.unwrap();
        assert!(plan.main_group_mappings.contains_key("Chairs"));
    }

    #[test]
    fn test_render_main_prompt() {
        let prompts = RwLock::new(PromptLibrary::embedded_only());
        let rendered = render_prompt(&prompts, PromptId::MainGroupPlan, &request()).unwrap();
        assert!(rendered.system.contains("JSON"));
        assert!(rendered.user.contains("\"Category\""));
        assert!(rendered.user.contains("- \"Chairs\": 3"));
        assert!(!rendered.user.contains("Sub-group column"));
    }

    #[test]
    fn test_render_sub_prompt() {
        let prompts = RwLock::new(PromptLibrary::embedded_only());
        let rendered = render_prompt(&prompts, PromptId::SubGroupPlan, &request()).unwrap();
        assert!(rendered.user.contains("Chairs (3 items)"));
        assert!(rendered.user.contains("\"Dataset\""));
    }

    #[test]
    fn test_request_options_from_config() {
        let config = OracleConfig::default();
        let options = RequestOptions::from(&config);
        assert_eq!(options.timeout, Duration::from_secs(60));
        assert_eq!(options.max_tokens, 3000);
    }

    #[test]
    fn test_ai_client_with_model() {
        let client = AIClient::ollama("http://localhost:11434", "llama3.2").with_model("qwen2.5");
        assert_eq!(client.model(), "qwen2.5");
        assert_eq!(client.backend_name(), "ollama");
    }
}
