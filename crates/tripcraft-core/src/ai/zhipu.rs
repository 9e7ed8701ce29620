//! Zhipu GLM backend (OpenAI-shaped chat completions API)

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result};

use super::{ChatBackend, ChatMessage, CHAT_TEMPERATURE, MAX_TOKENS, STRUCTURED_TEMPERATURE};

const DEFAULT_BASE_URL: &str = "https://open.bigmodel.cn/api/paas/v4/chat/completions";
const DEFAULT_MODEL: &str = "glm-4";

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    temperature: f64,
    max_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

/// Zhipu chat backend
#[derive(Clone)]
pub struct ZhipuBackend {
    http_client: Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl ZhipuBackend {
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

    /// Create a backend from `ZHIPU_API_KEY`
    pub fn from_env() -> Result<Self> {
        let key = std::env::var("ZHIPU_API_KEY")
            .map_err(|_| Error::MissingConfig("ZHIPU_API_KEY is not set".into()))?;
        if key.is_empty() {
            return Err(Error::MissingConfig("ZHIPU_API_KEY is empty".into()));
        }
        Ok(Self::new(key))
    }

    async fn complete(&self, messages: &[ChatMessage], temperature: f64) -> Result<String> {
        debug!(model = %self.model, temperature, "calling zhipu chat API");

        let request = ChatRequest {
            model: &self.model,
            messages,
            temperature,
            max_tokens: MAX_TOKENS,
        };

        let response = self
            .http_client
            .post(&self.base_url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?
            .error_for_status()?
            .json::<ChatResponse>()
            .await?;

        response
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| Error::Provider("zhipu response contained no choices".into()))
    }
}

#[async_trait]
impl ChatBackend for ZhipuBackend {
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
