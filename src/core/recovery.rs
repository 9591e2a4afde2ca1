//! 整轮错误恢复
//!
//! 根据 AgentError 类型返回 RecoveryAction：瞬时故障（LLM、检查点、存储）整轮重试，
//! 其余（步数超限、配置错误、取消）直接上抛。重试次数与退避由 RetryPolicy 决定。

use std::time::Duration;

use crate::core::{AgentError, RecoveryAction};

/// 整轮重试策略：最多 max_attempts 次，每次失败后固定退避
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, backoff: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            backoff,
        }
    }

    /// attempt 从 1 开始计数
    pub fn should_retry(&self, attempt: u32) -> bool {
        attempt < self.max_attempts
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_millis(500))
    }
}

/// 将错误映射为恢复动作
#[derive(Debug, Default)]
pub struct RecoveryEngine;

impl RecoveryEngine {
    pub fn new() -> Self {
        Self
    }

    pub fn handle(&self, err: &AgentError) -> RecoveryAction {
        match err {
            AgentError::LlmError(_)
            | AgentError::Checkpoint(_)
            | AgentError::Memory(_)
            | AgentError::ToolTimeout(_) => RecoveryAction::RetryTurn,
            AgentError::StepLimitExceeded(_)
            | AgentError::ConfigError(_)
            | AgentError::Cancelled
            | AgentError::RetriesExhausted { .. } => RecoveryAction::Surface,
            _ => RecoveryAction::Surface,
        }
    }
}
