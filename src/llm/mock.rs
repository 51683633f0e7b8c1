//! Mock LLM 客户端（用于测试，无需 API）
//!
//! 按顺序返回预置回复；预置用尽后回显最后一条 User 消息。
//! Token 用量按空白分词计数。

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::llm::{LlmClient, Message, Role, TokenUsage};

/// Mock 客户端：脚本化回复 + 回显兜底，并记录收到的每组消息
#[derive(Debug, Default)]
pub struct MockLlmClient {
    script: Mutex<VecDeque<String>>,
    received: Mutex<Vec<Vec<Message>>>,
    usage: TokenUsage,
}

fn word_count(text: &str) -> u64 {
    text.split_whitespace().count() as u64
}

impl MockLlmClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// 以预置回复序列创建
    pub fn scripted<I, S>(replies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            script: Mutex::new(replies.into_iter().map(Into::into).collect()),
            received: Mutex::new(Vec::new()),
            usage: TokenUsage::default(),
        }
    }

    /// 已收到的调用次数
    pub fn calls(&self) -> usize {
        self.received.lock().map(|r| r.len()).unwrap_or(0)
    }

    /// 第 n 次调用收到的消息
    pub fn request(&self, n: usize) -> Option<Vec<Message>> {
        self.received.lock().ok().and_then(|r| r.get(n).cloned())
    }
}

#[async_trait]
impl LlmClient for MockLlmClient {
    fn token_usage(&self) -> (u64, u64, u64) {
        self.usage.get()
    }

    async fn complete(&self, messages: &[Message]) -> Result<String, String> {
        if let Ok(mut received) = self.received.lock() {
            received.push(messages.to_vec());
        }
        let reply = match self.script.lock().ok().and_then(|mut s| s.pop_front()) {
            Some(reply) => reply,
            None => {
                let last_user = messages
                    .iter()
                    .rev()
                    .find(|m| matches!(m.role, Role::User))
                    .map(|m| m.content.as_str())
                    .unwrap_or("(no input)");
                format!("Echo from Mock: {}", last_user)
            }
        };
        let prompt: u64 = messages.iter().map(|m| word_count(&m.content)).sum();
        self.usage.add(prompt, word_count(&reply));
        Ok(reply)
    }
}
