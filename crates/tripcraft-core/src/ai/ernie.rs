//! Baidu Ernie backend
//!
//! Ernie authenticates with an access token passed as a query parameter and
//! returns the completion as a flat `result` string.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result};

use super::{ChatBackend, ChatMessage, CHAT_TEMPERATURE, MAX_TOKENS, STRUCTURED_TEMPERATURE};

const DEFAULT_BASE_URL: &str =
    "https://aip.baidubce.com/rpc/2.0/ai_custom/v1/wenxinworkshop/chat/ernie-4.0-8k";
const DEFAULT_MODEL: &str = "ernie-4.0-8k";

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    messages: &'a [ChatMessage],
    temperature: f64,
    max_output_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    result: Option<String>,
}

/// Ernie chat backend
#[derive(Clone)]
pub struct ErnieBackend {
    http_client: Client,
    base_url: String,
    access_token: String,
    model: String,
}

impl ErnieBackend {
    pub fn new(access_token: impl Into<String>) -> Self {
        Self {
            http_client: Client::new(),
            base_url: DEFAULT_BASE_URL.to_string(),
            access_token: access_token.into(),
            model: DEFAULT_MODEL.to_string(),
        }
    }

    /// Create a backend against a non-default endpoint (tests, proxies)
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Create a backend from `ERNIE_API_KEY`
    pub fn from_env() -> Result<Self> {
        let key = std::env::var("ERNIE_API_KEY")
            .map_err(|_| Error::MissingConfig("ERNIE_API_KEY is not set".into()))?;
        if key.is_empty() {
            return Err(Error::MissingConfig("ERNIE_API_KEY is empty".into()));
        }
        Ok(Self::new(key))
    }

    async fn complete(&self, messages: &[ChatMessage], temperature: f64) -> Result<String> {
        debug!(model = %self.model, temperature, "calling ernie chat API");

        let request = ChatRequest {
            messages,
            temperature,
            max_output_tokens: MAX_TOKENS,
        };

        let response = self
            .http_client
            .post(&self.base_url)
            .query(&[("access_token", self.access_token.as_str())])
            .json(&request)
            .send()
            .await?
            .error_for_status()?
            .json::<ChatResponse>()
            .await?;

        response
            .result
            .ok_or_else(|| Error::Provider("ernie response contained no result".into()))
    }
}

#[async_trait]
impl ChatBackend for ErnieBackend {
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
