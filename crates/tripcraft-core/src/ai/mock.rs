//! Mock chat backend for testing and keyless operation
//!
//! Returns predictable responses so the planner remains usable without any
//! provider key, and lets tests script exact replies.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::error::Result;

use super::{ChatBackend, ChatMessage};

const GENERIC_REPLY: &str = "我理解你的问题。作为AI旅行规划助手，我可以帮助你：\n1. 规划旅行路线\n2. 推荐景点和餐厅\n3. 提供预算建议\n4. 回答旅行相关问题\n\n请告诉我更多关于你的旅行需求，比如目的地、天数、预算等。";

/// Mock chat backend
///
/// Without scripted replies it answers from a small keyword table; with
/// scripted replies it returns them in order, which is how extractor and
/// planner tests drive exact provider output.
#[derive(Clone, Default)]
pub struct MockBackend {
    scripted: Arc<Mutex<VecDeque<String>>>,
}

impl MockBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue an exact reply to be returned by the next call
    pub fn push_reply(&self, reply: impl Into<String>) {
        self.scripted
            .lock()
            .expect("mock reply queue poisoned")
            .push_back(reply.into());
    }

    fn canned_reply(&self, messages: &[ChatMessage]) -> String {
        if let Some(next) = self
            .scripted
            .lock()
            .expect("mock reply queue poisoned")
            .pop_front()
        {
            return next;
        }

        let last_user = messages
            .iter()
            .rev()
            .find(|m| m.role == "user")
            .map(|m| m.content.to_lowercase())
            .unwrap_or_default();

        let table = [
            (
                "你好",
                "你好！我是你的AI旅行规划助手。我可以帮你规划完美的旅行。请告诉我你想去哪里旅行？",
            ),
            (
                "推荐",
                "我可以根据你的兴趣和预算为你推荐合适的旅行目的地和行程。请告诉我你的旅行偏好。",
            ),
        ];

        for (keyword, reply) in table {
            if last_user.contains(keyword) {
                return reply.to_string();
            }
        }

        GENERIC_REPLY.to_string()
    }
}

#[async_trait]
impl ChatBackend for MockBackend {
    async fn chat(&self, messages: &[ChatMessage]) -> Result<String> {
        Ok(self.canned_reply(messages))
    }

    async fn chat_structured(&self, messages: &[ChatMessage]) -> Result<String> {
        Ok(self.canned_reply(messages))
    }

    fn model(&self) -> &str {
        "mock"
    }
}
