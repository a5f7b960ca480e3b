//! Generative text collaborator: `prompt -> text`, nothing more.
//!
//! Replies carry no structural guarantee; callers run them through
//! [`crate::parser`] before trusting any field.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::{Config, LlmConfig, LlmProvider, SecretValue};
use crate::error::{NewsCheckError, ServiceError};
use crate::http::{build_client, status_error, transport_error, RetryPolicy};

const OLLAMA_DEFAULT_ENDPOINT: &str = "http://localhost:11434";
const OPENAI_DEFAULT_ENDPOINT: &str = "https://api.openai.com";

#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, prompt: &str, max_tokens: u32) -> Result<String, ServiceError>;

    /// Name used in logs and error messages.
    fn name(&self) -> &str;
}

pub type DynGenerator = Arc<dyn TextGenerator>;

fn retry_policy(config: &LlmConfig) -> RetryPolicy {
    RetryPolicy {
        max_retries: config.max_retries,
        initial_backoff: Duration::from_millis(config.initial_backoff_ms),
        max_backoff: Duration::from_millis(config.max_backoff_ms),
    }
}

/// Local models served by Ollama's `/api/generate`.
pub struct OllamaGenerator {
    endpoint: String,
    model: String,
    temperature: f32,
    timeout: Duration,
    client: reqwest::Client,
    retry: RetryPolicy,
}

#[derive(Serialize)]
struct OllamaRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    options: OllamaOptions,
}

#[derive(Serialize)]
struct OllamaOptions {
    num_predict: u32,
    temperature: f32,
}

#[derive(Deserialize)]
struct OllamaResponse {
    response: String,
}

impl OllamaGenerator {
    pub fn from_config(config: &LlmConfig) -> Result<Self, NewsCheckError> {
        Ok(Self {
            endpoint: config
                .endpoint
                .clone()
                .unwrap_or_else(|| OLLAMA_DEFAULT_ENDPOINT.to_string()),
            model: config.model.clone(),
            temperature: config.temperature,
            timeout: config.timeout(),
            client: build_client(config.timeout())?,
            retry: retry_policy(config),
        })
    }

    async fn attempt(&self, prompt: &str, max_tokens: u32) -> Result<String, ServiceError> {
        let url = format!("{}/api/generate", self.endpoint.trim_end_matches('/'));
        let body = OllamaRequest {
            model: &self.model,
            prompt,
            stream: false,
            options: OllamaOptions {
                num_predict: max_tokens,
                temperature: self.temperature,
            },
        };

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|err| transport_error(self.name(), self.timeout, err))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(status_error(self.name(), status, &text));
        }

        let payload: OllamaResponse = response
            .json()
            .await
            .map_err(|err| ServiceError::invalid_response(self.name(), err.to_string()))?;
        non_empty(self.name(), payload.response)
    }
}

#[async_trait]
impl TextGenerator for OllamaGenerator {
    async fn generate(&self, prompt: &str, max_tokens: u32) -> Result<String, ServiceError> {
        self.retry
            .run(self.name(), move || self.attempt(prompt, max_tokens))
            .await
    }

    fn name(&self) -> &str {
        "ollama"
    }
}

/// OpenAI-compatible `/v1/chat/completions` endpoints.
pub struct OpenAiGenerator {
    endpoint: String,
    model: String,
    api_key: SecretValue,
    temperature: f32,
    timeout: Duration,
    client: reqwest::Client,
    retry: RetryPolicy,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Deserialize)]
struct ChatReply {
    #[serde(default)]
    content: Option<String>,
}

impl OpenAiGenerator {
    pub fn from_config(config: &LlmConfig, api_key: SecretValue) -> Result<Self, NewsCheckError> {
        Ok(Self {
            endpoint: config
                .endpoint
                .clone()
                .unwrap_or_else(|| OPENAI_DEFAULT_ENDPOINT.to_string()),
            model: config.model.clone(),
            api_key,
            temperature: config.temperature,
            timeout: config.timeout(),
            client: build_client(config.timeout())?,
            retry: retry_policy(config),
        })
    }

    async fn attempt(&self, prompt: &str, max_tokens: u32) -> Result<String, ServiceError> {
        let url = format!("{}/v1/chat/completions", self.endpoint.trim_end_matches('/'));
        let body = ChatRequest {
            model: &self.model,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
            max_tokens,
            temperature: self.temperature,
        };

        let response = self
            .client
            .post(&url)
            .bearer_auth(self.api_key.expose())
            .json(&body)
            .send()
            .await
            .map_err(|err| transport_error(self.name(), self.timeout, err))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(status_error(self.name(), status, &text));
        }

        let payload: ChatResponse = response
            .json()
            .await
            .map_err(|err| ServiceError::invalid_response(self.name(), err.to_string()))?;
        let content = payload
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .unwrap_or_default();
        non_empty(self.name(), content)
    }
}

#[async_trait]
impl TextGenerator for OpenAiGenerator {
    async fn generate(&self, prompt: &str, max_tokens: u32) -> Result<String, ServiceError> {
        self.retry
            .run(self.name(), move || self.attempt(prompt, max_tokens))
            .await
    }

    fn name(&self) -> &str {
        "openai"
    }
}

fn non_empty(service: &str, text: String) -> Result<String, ServiceError> {
    if text.trim().is_empty() {
        Err(ServiceError::invalid_response(service, "empty completion"))
    } else {
        Ok(text)
    }
}

/// Build the configured generative collaborator.
pub fn build_generator(config: &Config) -> Result<DynGenerator, NewsCheckError> {
    let generator: DynGenerator = match config.llm.provider {
        LlmProvider::Ollama => Arc::new(OllamaGenerator::from_config(&config.llm)?),
        LlmProvider::OpenAi => {
            let key = config
                .llm_api_key()?
                .ok_or_else(|| NewsCheckError::MissingSecret(config.llm.api_key_env.clone()))?;
            Arc::new(OpenAiGenerator::from_config(&config.llm, key)?)
        }
    };
    tracing::info!(provider = generator.name(), model = %config.llm.model, "generative service configured");
    Ok(generator)
}
