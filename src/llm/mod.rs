//! LLM 层：客户端抽象与实现（OpenAI 兼容 / Mock / Scripted）

pub mod mock;
pub mod openai;
pub mod traits;

use std::sync::Arc;

pub use mock::{MockLlmClient, ScriptedLlmClient};
pub use openai::{split_thinking, OpenAiClient, TokenUsage};
pub use traits::{LlmClient, LlmError};

use crate::config::AppConfig;

/// 根据配置与环境变量选择 LLM 后端：provider = mock 或未设置 API Key 时使用 Mock
pub fn create_llm_from_config(cfg: &AppConfig) -> Arc<dyn LlmClient> {
    let provider = cfg.llm.provider.to_lowercase();
    let api_key = std::env::var("OPENAI_API_KEY").ok();

    if provider == "mock" {
        tracing::info!("Using Mock LLM (configured)");
        return Arc::new(MockLlmClient);
    }
    match api_key {
        Some(key) => {
            tracing::info!(model = %cfg.llm.model, "Using OpenAI-compatible LLM");
            Arc::new(
                OpenAiClient::new(cfg.llm.base_url.as_deref(), &cfg.llm.model, Some(&key))
                    .with_temperature(cfg.llm.temperature)
                    .with_request_timeout(std::time::Duration::from_secs(
                        cfg.llm.timeouts.request,
                    )),
            )
        }
        None => {
            tracing::warn!("OPENAI_API_KEY not set, using Mock LLM");
            Arc::new(MockLlmClient)
        }
    }
}
