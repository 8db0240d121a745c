//! Ollama backend implementation
//!
//! Uses `/api/generate` with streaming off. Health is probed via `/api/tags`.

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

const DEFAULT_MODEL: &str = "llama3.2";

pub struct OllamaBackend {
    http_client: Client,
    base_url: String,
    model: String,
    options: RequestOptions,
    prompts: Arc<RwLock<PromptLibrary>>,
}

impl Clone for OllamaBackend {
    fn clone(&self) -> Self {
        Self {
            http_client: self.http_client.clone(),
            base_url: self.base_url.clone(),
            model: self.model.clone(),
            options: self.options,
            prompts: self.prompts.clone(),
        }
    }
}

impl OllamaBackend {
    pub fn new(host: &str, model: &str) -> Self {
        let options = RequestOptions::default();
        Self {
            http_client: options.http_client(),
            base_url: host.trim_end_matches('/').to_string(),
            model: model.to_string(),
            options,
            prompts: Arc::new(RwLock::new(PromptLibrary::new())),
        }
    }

    pub fn with_model(&self, model: &str) -> Self {
        let mut backend = self.clone();
        backend.model = model.to_string();
        backend
    }

    pub fn with_options(&self, options: RequestOptions) -> Self {
        let mut backend = self.clone();
        backend.http_client = options.http_client();
        backend.options = options;
        backend
    }

    pub fn with_prompts(mut self, prompts: PromptLibrary) -> Self {
        self.prompts = Arc::new(RwLock::new(prompts));
        self
    }

    /// Required: `OLLAMA_HOST`. Optional: `OLLAMA_MODEL` (default: llama3.2)
    pub fn from_env() -> Option<Self> {
        let host = std::env::var("OLLAMA_HOST").ok()?;
        let model = std::env::var("OLLAMA_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string());
        Some(Self::new(&host, &model))
    }

    async fn generate(&self, prompt: &RenderedPrompt) -> Result<String> {
        let request = OllamaRequest {
            model: self.model.clone(),
            prompt: prompt.user.clone(),
            system: (!prompt.system.is_empty()).then(|| prompt.system.clone()),
            stream: false,
            options: OllamaOptions {
                temperature: self.options.temperature,
                num_predict: self.options.max_tokens,
            },
        };

        let response = self
            .http_client
            .post(format!("{}/api/generate", self.base_url))
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Oracle(format!("Ollama error {}: {}", status, body)));
        }

        let ollama_response: OllamaResponse = response.json().await?;
        Ok(ollama_response.response)
    }
}

#[derive(Debug, Serialize)]
struct OllamaRequest {
    model: String,
    prompt: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    stream: bool,
    options: OllamaOptions,
}

#[derive(Debug, Serialize)]
struct OllamaOptions {
    temperature: f32,
    num_predict: u32,
}

#[derive(Debug, Deserialize)]
struct OllamaResponse {
    response: String,
}

#[async_trait]
impl AIBackend for OllamaBackend {
    async fn request_grouping_plan(&self, request: &PlanRequest) -> Result<GroupingPlan> {
        let prompt = render_prompt(&self.prompts, PromptId::MainGroupPlan, request)?;
        let content = self.generate(&prompt).await?;
        debug!("Ollama grouping plan response: {}", content);
        parse_grouping_plan(&content)
    }

    async fn request_sub_group_plan(&self, request: &PlanRequest) -> Result<SubGroupPlan> {
        let prompt = render_prompt(&self.prompts, PromptId::SubGroupPlan, request)?;
        let content = self.generate(&prompt).await?;
        debug!("Ollama sub-group plan response: {}", content);
        parse_sub_group_plan(&content)
    }

    async fn health_check(&self) -> bool {
        match self
            .http_client
            .get(format!("{}/api/tags", self.base_url))
            .send()
            .await
        {
            Ok(resp) => resp.status().is_success(),
            Err(_) => false,
        }
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn host(&self) -> &str {
        &self.base_url
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_new_trims_trailing_slash() {
        let backend = OllamaBackend::new("http://localhost:11434/", "llama3.2");
        assert_eq!(backend.host(), "http://localhost:11434");
        assert_eq!(backend.model(), "llama3.2");
    }

    #[test]
    fn test_request_serialization() {
        let request = OllamaRequest {
            model: "llama3.2".into(),
            prompt: "Group these".into(),
            system: None,
            stream: false,
            options: OllamaOptions {
                temperature: 0.3,
                num_predict: 3000,
            },
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["stream"], false);
        assert!(json.get("system").is_none());
        assert_eq!(json["options"]["num_predict"], 3000);
    }

    #[tokio::test]
    async fn test_health_check_unreachable() {
        let backend = OllamaBackend::new("http://localhost:99999", "llama3.2");
        assert!(!backend.health_check().await);
    }
}
