//! Pluggable chat-provider abstraction
//!
//! This module provides a provider-agnostic interface for chat completion.
//! The core only requires "some free text, possibly containing JSON" back;
//! everything structured is recovered by [`extract`].
//!
//! # Architecture
//!
//! - `ChatBackend` trait: defines the interface for all chat providers
//! - `ChatClient` enum: concrete wrapper providing Clone + compile-time dispatch
//! - Provider implementations: `QwenBackend`, `ErnieBackend`, `ZhipuBackend`,
//!   `MockBackend`
//!
//! # Configuration
//!
//! Environment variables, checked in priority order:
//! - `QWEN_API_KEY`: DashScope key for Tongyi Qianwen
//! - `ERNIE_API_KEY`: Baidu access token for Ernie
//! - `ZHIPU_API_KEY`: Zhipu key for GLM
//!
//! Missing configuration surfaces eagerly as [`crate::Error::MissingConfig`] at the
//! constructor boundary, never as a deferred generic failure.

pub mod extract;
mod ernie;
mod mock;
mod qwen;
mod zhipu;

pub use ernie::ErnieBackend;
pub use mock::MockBackend;
pub use qwen::QwenBackend;
pub use zhipu::ZhipuBackend;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// System prompt for free-form chat
pub(crate) const CHAT_SYSTEM_PROMPT: &str =
    "你是一个专业的旅行规划助手。你的任务是帮助用户规划完美的旅行。请用中文回答，提供详细、实用的建议。";

/// Temperature for free-form chat
pub(crate) const CHAT_TEMPERATURE: f64 = 0.7;

/// Lower temperature for JSON-demanding prompts, for more stable output
pub(crate) const STRUCTURED_TEMPERATURE: f64 = 0.3;

/// Token cap shared by all providers
pub(crate) const MAX_TOKENS: u32 = 2000;

/// Role-tagged message in a conversation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String, // "system", "user", "assistant"
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".into(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".into(),
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: "assistant".into(),
            content: content.into(),
        }
    }
}

/// Trait defining the interface for all chat providers
///
/// Backends should be Send + Sync to allow use across async tasks.
#[async_trait]
pub trait ChatBackend: Send + Sync {
    /// Free-form completion for an ordered message sequence
    async fn chat(&self, messages: &[ChatMessage]) -> Result<String>;

    /// Completion tuned for structured (JSON) output: lower temperature
    async fn chat_structured(&self, messages: &[ChatMessage]) -> Result<String>;

    /// Get the model name (for logging)
    fn model(&self) -> &str;
}

/// Concrete chat client enum
///
/// Provides Clone and compile-time dispatch without Box<dyn> overhead.
#[derive(Clone)]
pub enum ChatClient {
    /// Tongyi Qianwen via DashScope
    Qwen(QwenBackend),
    /// Baidu Ernie
    Ernie(ErnieBackend),
    /// Zhipu GLM (OpenAI-shaped API)
    Zhipu(ZhipuBackend),
    /// Mock backend for testing
    Mock(MockBackend),
}

impl ChatClient {
    /// Create a chat client from environment variables
    ///
    /// Providers are tried in priority order: Qwen, then Ernie, then Zhipu.
    /// Returns None if no provider key is set; callers then fall back to
    /// deterministic local responses.
    pub fn from_env() -> Option<Self> {
        if let Ok(key) = std::env::var("QWEN_API_KEY") {
            if !key.is_empty() {
                return Some(ChatClient::Qwen(QwenBackend::new(key)));
            }
        }
        if let Ok(key) = std::env::var("ERNIE_API_KEY") {
            if !key.is_empty() {
                return Some(ChatClient::Ernie(ErnieBackend::new(key)));
            }
        }
        if let Ok(key) = std::env::var("ZHIPU_API_KEY") {
            if !key.is_empty() {
                return Some(ChatClient::Zhipu(ZhipuBackend::new(key)));
            }
        }
        None
    }

    /// Create a mock backend for testing
    pub fn mock() -> Self {
        ChatClient::Mock(MockBackend::new())
    }
}

// Implement ChatBackend for ChatClient by delegating to the inner backend
#[async_trait]
impl ChatBackend for ChatClient {
    async fn chat(&self, messages: &[ChatMessage]) -> Result<String> {
        match self {
            ChatClient::Qwen(b) => b.chat(messages).await,
            ChatClient::Ernie(b) => b.chat(messages).await,
            ChatClient::Zhipu(b) => b.chat(messages).await,
            ChatClient::Mock(b) => b.chat(messages).await,
        }
    }

    async fn chat_structured(&self, messages: &[ChatMessage]) -> Result<String> {
        match self {
            ChatClient::Qwen(b) => b.chat_structured(messages).await,
            ChatClient::Ernie(b) => b.chat_structured(messages).await,
            ChatClient::Zhipu(b) => b.chat_structured(messages).await,
            ChatClient::Mock(b) => b.chat_structured(messages).await,
        }
    }

    fn model(&self) -> &str {
        match self {
            ChatClient::Qwen(b) => b.model(),
            ChatClient::Ernie(b) => b.model(),
            ChatClient::Zhipu(b) => b.model(),
            ChatClient::Mock(b) => b.model(),
        }
    }
}
