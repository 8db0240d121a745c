//! OpenAI-compatible backend implementation
//!
//! Works with OpenAI itself and any server that implements the chat
//! completions API (vLLM, LocalAI, llama-server, Docker Model Runner).
//!
//! # Configuration
//!
//! Environment variables:
//! - `OPENAI_COMPATIBLE_HOST`: server URL (default https://api.openai.com when `OPENAI_API_KEY` is set)
//! - `OPENAI_COMPATIBLE_MODEL`: model name (default: gpt-4)
//! - `OPENAI_COMPATIBLE_API_KEY` or `OPENAI_API_KEY`: bearer token (optional)

use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result};
use crate::plan::{GroupingPlan, SubGroupPlan};
use crate::prompts::{PromptId, PromptLibrary};

use super::parsing::{parse_grouping_plan, parse_sub_group_plan};
use super::types::{PlanRequest, RenderedPrompt};
use super::{render_prompt, AIBackend, RequestOptions};

const OPENAI_HOST: &str = "https://api.openai.com";
const DEFAULT_MODEL: &str = "gpt-4";

/// Backend for the `/v1/chat/completions` API
pub struct OpenAICompatibleBackend {
    http_client: Client,
    base_url: String,
    model: String,
    api_key: Option<String>,
    options: RequestOptions,
    prompts: Arc<RwLock<PromptLibrary>>,
}

impl Clone for OpenAICompatibleBackend {
    fn clone(&self) -> Self {
        Self {
            http_client: self.http_client.clone(),
            base_url: self.base_url.clone(),
            model: self.model.clone(),
            api_key: self.api_key.clone(),
            options: self.options,
            prompts: self.prompts.clone(),
        }
    }
}

impl OpenAICompatibleBackend {
    pub fn new(base_url: &str, model: &str) -> Self {
        let options = RequestOptions::default();
        Self {
            http_client: options.http_client(),
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            api_key: None,
            options,
            prompts: Arc::new(RwLock::new(PromptLibrary::new())),
        }
    }

    pub fn with_api_key(base_url: &str, model: &str, api_key: &str) -> Self {
        let mut backend = Self::new(base_url, model);
        backend.api_key = Some(api_key.to_string());
        backend
    }

    pub fn with_model(&self, model: &str) -> Self {
        let mut backend = self.clone();
        backend.model = model.to_string();
        backend
    }

    /// Same backend with new timeout and generation settings
    pub fn with_options(&self, options: RequestOptions) -> Self {
        let mut backend = self.clone();
        backend.http_client = options.http_client();
        backend.options = options;
        backend
    }

    /// Use a specific prompt library (tests, custom override dirs)
    pub fn with_prompts(mut self, prompts: PromptLibrary) -> Self {
        self.prompts = Arc::new(RwLock::new(prompts));
        self
    }

    /// Create from environment variables; None when no host can be determined
    pub fn from_env() -> Option<Self> {
        let api_key = std::env::var("OPENAI_COMPATIBLE_API_KEY")
            .or_else(|_| std::env::var("OPENAI_API_KEY"))
            .ok();
        let host = match std::env::var("OPENAI_COMPATIBLE_HOST") {
            Ok(host) => host,
            Err(_) if api_key.is_some() => OPENAI_HOST.to_string(),
            Err(_) => return None,
        };
        let model = std::env::var("OPENAI_COMPATIBLE_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string());

        let mut backend = Self::new(&host, &model);
        backend.api_key = api_key;
        Some(backend)
    }

    /// One chat completion round trip, returning the first choice's text
    async fn chat_completion(&self, prompt: &RenderedPrompt) -> Result<String> {
        let mut messages = Vec::with_capacity(2);
        if !prompt.system.is_empty() {
            messages.push(ChatMessage {
                role: "system".to_string(),
                content: prompt.system.clone(),
            });
        }
        messages.push(ChatMessage {
            role: "user".to_string(),
            content: prompt.user.clone(),
        });

        let request = ChatCompletionRequest {
            model: self.model.clone(),
            messages,
            temperature: Some(self.options.temperature),
            max_tokens: Some(self.options.max_tokens),
            stream: false,
        };

        let mut req = self
            .http_client
            .post(format!("{}/v1/chat/completions", self.base_url))
            .json(&request);
        if let Some(ref key) = self.api_key {
            req = req.header("Authorization", format!("Bearer {}", key));
        }

        let response = req.send().await?;
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Oracle(format!("OpenAI API error {}: {}", status, body)));
        }

        let result: ChatCompletionResponse = response.json().await?;
        result
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| Error::Oracle("No response from OpenAI API".into()))
    }
}

#[async_trait]
impl AIBackend for OpenAICompatibleBackend {
    async fn request_grouping_plan(&self, request: &PlanRequest) -> Result<GroupingPlan> {
        let prompt = render_prompt(&self.prompts, PromptId::MainGroupPlan, request)?;
        let content = self.chat_completion(&prompt).await?;
        debug!(column = %request.column_name, values = request.values_with_counts.len(), "OpenAI grouping plan response: {}", content);
        parse_grouping_plan(&content)
    }

    async fn request_sub_group_plan(&self, request: &PlanRequest) -> Result<SubGroupPlan> {
        let prompt = render_prompt(&self.prompts, PromptId::SubGroupPlan, request)?;
        let content = self.chat_completion(&prompt).await?;
        debug!(context = %request.context_name, "OpenAI sub-group plan response: {}", content);
        parse_sub_group_plan(&content)
    }

    async fn health_check(&self) -> bool {
        // /v1/models is standard; /health and / cover local servers
        for url in [
            format!("{}/v1/models", self.base_url),
            format!("{}/health", self.base_url),
            self.base_url.clone(),
        ] {
            let mut req = self.http_client.get(&url);
            if let Some(ref key) = self.api_key {
                req = req.header("Authorization", format!("Bearer {}", key));
            }
            if let Ok(resp) = req.send().await {
                if resp.status().is_success() {
                    return true;
                }
            }
        }
        false
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn host(&self) -> &str {
        &self.base_url
    }
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    stream: bool,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    content: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_new() {
        let backend = OpenAICompatibleBackend::new("http://localhost:8000", "gpt-4");
        assert_eq!(backend.model(), "gpt-4");
        assert_eq!(backend.host(), "http://localhost:8000");
    }

    #[test]
    fn test_backend_new_trims_trailing_slash() {
        let backend = OpenAICompatibleBackend::new("http://localhost:8000/", "gpt-4");
        assert_eq!(backend.host(), "http://localhost:8000");
    }

    #[test]
    fn test_backend_with_api_key() {
        let backend = OpenAICompatibleBackend::with_api_key("http://localhost:8000", "gpt-4", "sk-test123");
        assert_eq!(backend.api_key, Some("sk-test123".to_string()));
    }

    #[test]
    fn test_backend_from_env_missing() {
        std::env::remove_var("OPENAI_COMPATIBLE_HOST");
        std::env::remove_var("OPENAI_COMPATIBLE_MODEL");
        std::env::remove_var("OPENAI_COMPATIBLE_API_KEY");
        std::env::remove_var("OPENAI_API_KEY");

        assert!(OpenAICompatibleBackend::from_env().is_none());
    }

    #[test]
    fn test_backend_with_options() {
        let backend = OpenAICompatibleBackend::new("http://localhost:8000", "gpt-4").with_options(RequestOptions {
            temperature: 0.0,
            max_tokens: 100,
            ..RequestOptions::default()
        });
        assert_eq!(backend.options.max_tokens, 100);
        let cloned = backend.with_model("gpt-4o");
        assert_eq!(cloned.model(), "gpt-4o");
        assert_eq!(cloned.options.max_tokens, 100);
    }

    #[tokio::test]
    async fn test_health_check_unreachable() {
        let backend = OpenAICompatibleBackend::new("http://localhost:99999", "gpt-4");
        assert!(!backend.health_check().await);
    }

    #[test]
    fn test_chat_completion_request_serialization() {
        let request = ChatCompletionRequest {
            model: "gpt-4".to_string(),
            messages: vec![ChatMessage {
                role: "system".to_string(),
                content: "Respond with JSON".to_string(),
            }],
            temperature: Some(0.3),
            max_tokens: None,
            stream: false,
        };

        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["model"], "gpt-4");
        assert_eq!(json["messages"][0]["role"], "system");
        let temp = json["temperature"].as_f64().unwrap();
        assert!((temp - 0.3).abs() < 0.001);
        assert_eq!(json["stream"], false);
        assert!(json.get("max_tokens").is_none());
    }

    #[test]
    fn test_chat_completion_response_deserialization() {
        let json = r#"{
            "id": "chatcmpl-123",
            "object": "chat.completion",
            "choices": [{"index": 0, "message": {"role": "assistant", "content": "{}"}, "finish_reason": "stop"}]
        }"#;
        let response: ChatCompletionResponse = serde_json::from_str(json).unwrap();
        assert_eq!(response.choices[0].message.content, "{}");
    }
}
