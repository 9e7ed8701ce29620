//! Tongyi Qianwen backend via the DashScope text-generation API

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result};

use super::{ChatBackend, ChatMessage, CHAT_TEMPERATURE, MAX_TOKENS, STRUCTURED_TEMPERATURE};

const DEFAULT_BASE_URL: &str =
    "https://dashscope.aliyuncs.com/api/v1/services/aigc/text-generation/generation";
const DEFAULT_MODEL: &str = "qwen-max";

/// DashScope request envelope: messages go under `input`, tuning under
/// `parameters`
#[derive(Debug, Serialize)]
struct GenerationRequest<'a> {
    model: &'a str,
    input: GenerationInput<'a>,
    parameters: GenerationParameters,
}

#[derive(Debug, Serialize)]
struct GenerationInput<'a> {
    messages: &'a [ChatMessage],
}

#[derive(Debug, Serialize)]
struct GenerationParameters {
    temperature: f64,
    max_tokens: u32,
    result_format: &'static str,
}

#[derive(Debug, Deserialize)]
struct GenerationResponse {
    output: GenerationOutput,
}

#[derive(Debug, Deserialize)]
struct GenerationOutput {
    choices: Vec<GenerationChoice>,
}

#[derive(Debug, Deserialize)]
struct GenerationChoice {
    message: ChatMessage,
}

/// Qwen chat backend
#[derive(Clone)]
pub struct QwenBackend {
    http_client: Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl QwenBackend {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            http_client: Client::new(),
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: api_key.into(),
            model: DEFAULT_MODEL.to_string(),
        }
    }

    /// Create a backend against a non-default endpoint (tests, proxies)
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Create a backend from `QWEN_API_KEY`
    pub fn from_env() -> Result<Self> {
        let key = std::env::var("QWEN_API_KEY")
            .map_err(|_| Error::MissingConfig("QWEN_API_KEY is not set".into()))?;
        if key.is_empty() {
            return Err(Error::MissingConfig("QWEN_API_KEY is empty".into()));
        }
        Ok(Self::new(key))
    }

    async fn complete(&self, messages: &[ChatMessage], temperature: f64) -> Result<String> {
        debug!(model = %self.model, temperature, "calling qwen generation API");

        let request = GenerationRequest {
            model: &self.model,
            input: GenerationInput { messages },
            parameters: GenerationParameters {
                temperature,
                max_tokens: MAX_TOKENS,
                result_format: "message",
            },
        };

        let response = self
            .http_client
            .post(&self.base_url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?
            .error_for_status()?
            .json::<GenerationResponse>()
            .await?;

        response
            .output
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| Error::Provider("qwen response contained no choices".into()))
    }
}

#[async_trait]
impl ChatBackend for QwenBackend {
    async fn chat(&self, messages: &[ChatMessage]) -> Result<String> {
        self.complete(messages, CHAT_TEMPERATURE).await
    }

    async fn chat_structured(&self, messages: &[ChatMessage]) -> Result<String> {
        self.complete(messages, STRUCTURED_TEMPERATURE).await
    }

    fn model(&self) -> &str {
        &self.model
    }
}
