//! OpenAI 兼容 API 客户端
//!
//! 通过 async_openai 调用任意 OpenAI 兼容端点（可配置 base_url，如 MiniMax / DeepSeek / 自建代理）。
//! 推理模型常把思考过程包在 `<think>...</think>` 中，这里拆成 thinking 块，展示与路由时会被丢弃。

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_openai::config::OpenAIConfig;
use async_openai::types::chat::{
    ChatCompletionRequestAssistantMessageArgs, ChatCompletionRequestMessage,
    ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestUserMessageArgs,
    CreateChatCompletionRequestArgs,
};
use async_openai::Client;
use async_trait::async_trait;

use crate::llm::{LlmClient, LlmError};
use crate::memory::{Content, ContentBlock, Message, Role};

/// Token 使用统计（累计值）
#[derive(Debug, Clone, Default)]
pub struct TokenUsage {
    pub prompt_tokens: Arc<AtomicU64>,
    pub completion_tokens: Arc<AtomicU64>,
    pub total_tokens: Arc<AtomicU64>,
}

impl TokenUsage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, prompt: u64, completion: u64) {
        self.prompt_tokens.fetch_add(prompt, Ordering::Relaxed);
        self.completion_tokens.fetch_add(completion, Ordering::Relaxed);
        self.total_tokens.fetch_add(prompt + completion, Ordering::Relaxed);
    }

    pub fn get(&self) -> (u64, u64, u64) {
        (
            self.prompt_tokens.load(Ordering::Relaxed),
            self.completion_tokens.load(Ordering::Relaxed),
            self.total_tokens.load(Ordering::Relaxed),
        )
    }
}

/// 将 `<think>…</think>` 前缀拆为 thinking 块；无思考段时返回纯文本
pub fn split_thinking(raw: &str) -> Content {
    let trimmed = raw.trim_start();
    let Some(rest) = trimmed.strip_prefix("<think>") else {
        return Content::Text(raw.to_string());
    };
    let Some(end) = rest.find("</think>") else {
        return Content::Text(raw.to_string());
    };
    let thinking = rest[..end].trim().to_string();
    let text = rest[end + "</think>".len()..].trim().to_string();
    Content::Blocks(vec![
        ContentBlock::Thinking { thinking },
        ContentBlock::Text { text },
    ])
}

/// OpenAI 兼容客户端：持有 Client、model 名与采样温度
pub struct OpenAiClient {
    client: Client<OpenAIConfig>,
    model: String,
    temperature: f32,
    request_timeout: Duration,
    pub usage: TokenUsage,
}

impl OpenAiClient {
    pub fn new(base_url: Option<&str>, model: &str, api_key: Option<&str>) -> Self {
        let api_key = api_key
            .map(String::from)
            .or_else(|| std::env::var("OPENAI_API_KEY").ok())
            .unwrap_or_else(|| "sk-placeholder".to_string());

        let config = if let Some(url) = base_url {
            OpenAIConfig::new().with_api_base(url).with_api_key(api_key)
        } else {
            OpenAIConfig::new().with_api_key(api_key)
        };

        Self {
            client: Client::with_config(config),
            model: model.to_string(),
            temperature: 0.7,
            request_timeout: Duration::from_secs(60),
            usage: TokenUsage::new(),
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Human -> user，Agent -> assistant，System -> system；内容统一渲染为文本（thinking 不回传）
    fn to_openai_messages(
        &self,
        messages: &[Message],
    ) -> Result<Vec<ChatCompletionRequestMessage>, LlmError> {
        let invalid = |e: async_openai::error::OpenAIError| LlmError::InvalidRequest(e.to_string());
        messages
            .iter()
            .map(|m| {
                let text = m.text();
                Ok(match m.role {
                    Role::System => ChatCompletionRequestMessage::System(
                        ChatCompletionRequestSystemMessageArgs::default()
                            .content(text)
                            .build()
                            .map_err(invalid)?,
                    ),
                    Role::Human => ChatCompletionRequestMessage::User(
                        ChatCompletionRequestUserMessageArgs::default()
                            .content(text)
                            .build()
                            .map_err(invalid)?,
                    ),
                    Role::Agent => ChatCompletionRequestMessage::Assistant(
                        ChatCompletionRequestAssistantMessageArgs::default()
                            .content(text)
                            .build()
                            .map_err(invalid)?,
                    ),
                })
            })
            .collect()
    }
}

#[async_trait]
impl LlmClient for OpenAiClient {
    fn token_usage(&self) -> (u64, u64, u64) {
        self.usage.get()
    }

    async fn complete(&self, messages: &[Message]) -> Result<Message, LlmError> {
        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .temperature(self.temperature)
            .messages(self.to_openai_messages(messages)?)
            .build()
            .map_err(|e| LlmError::InvalidRequest(e.to_string()))?;

        let response = tokio::time::timeout(self.request_timeout, self.client.chat().create(request))
            .await
            .map_err(|_| {
                LlmError::Request(format!(
                    "timed out after {}s",
                    self.request_timeout.as_secs()
                ))
            })?
            .map_err(|e| LlmError::Request(e.to_string()))?;

        if let Some(usage) = &response.usage {
            self.usage
                .add(usage.prompt_tokens as u64, usage.completion_tokens as u64);
        }

        let content = response
            .choices
            .first()
            .and_then(|c| c.message.content.clone())
            .ok_or(LlmError::EmptyResponse)?;

        Ok(Message::agent(split_thinking(&content)))
    }
}
