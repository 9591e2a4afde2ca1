//! LLM 客户端抽象
//!
//! 所有后端（OpenAI 兼容 / Mock / Scripted）实现 LlmClient：输入完整消息序列，返回一条 Agent 消息。
//! 返回的 content 可能是内容块序列（含 thinking 块），调用方不得假设为纯文本。

use async_trait::async_trait;
use thiserror::Error;

use crate::memory::Message;

/// LLM 调用错误（传输 / 模型 / 空响应）；由整轮重试策略处理
#[derive(Error, Debug, Clone)]
pub enum LlmError {
    #[error("request failed: {0}")]
    Request(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("empty response from model")]
    EmptyResponse,
}

#[async_trait]
pub trait LlmClient: Send + Sync {
    /// 非流式完成：返回一条 Agent 消息
    async fn complete(&self, messages: &[Message]) -> Result<Message, LlmError>;

    /// 累计 token 使用统计：(prompt_tokens, completion_tokens, total_tokens)
    fn token_usage(&self) -> (u64, u64, u64) {
        (0, 0, 0)
    }
}
