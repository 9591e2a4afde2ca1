//! 错误类型与恢复动作
//!
//! 各层各有错误枚举：记忆适配器（MemoryError）、检查点（CheckpointError）、
//! 以及核心层的 AgentError（通过 #[from] 汇总）。RecoveryEngine 根据 AgentError 决定整轮重试还是上抛。

use thiserror::Error;

use crate::llm::LlmError;

/// 记忆适配器（语义记忆 / 图记忆）错误
#[derive(Error, Debug)]
pub enum MemoryError {
    #[error("Memory backend request failed: {0}")]
    Request(String),

    #[error("Memory backend returned an error: {0}")]
    Backend(String),

    #[error("Invalid identifier: {0}")]
    InvalidIdentifier(String),

    #[error("Unsupported query: {0}")]
    Unsupported(String),
}

/// 检查点存储错误
#[derive(Error, Debug)]
pub enum CheckpointError {
    #[error("Checkpoint I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Checkpoint serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[cfg(feature = "async-sqlite")]
    #[error("Checkpoint database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Checkpoint thread mismatch: expected {expected}, found {found}")]
    ThreadMismatch { expected: String, found: String },
}

/// Agent 运行过程中可能出现的错误
#[derive(Error, Debug)]
pub enum AgentError {
    #[error("LLM error: {0}")]
    LlmError(#[from] LlmError),

    #[error("Checkpoint error: {0}")]
    Checkpoint(#[from] CheckpointError),

    #[error("Memory error: {0}")]
    Memory(#[from] MemoryError),

    #[error("JSON parse error: {0}")]
    JsonParseError(String),

    #[error("Tool execution failed: {0}")]
    ToolExecutionFailed(String),

    #[error("Tool timeout: {0}")]
    ToolTimeout(String),

    #[error("Path escape attempt: {0}")]
    PathEscape(String),

    /// 单轮内专家调用次数超过上限（防止 Supervisor 与专家之间死循环）
    #[error("Cycle step limit exceeded ({0} specialist invocations)")]
    StepLimitExceeded(usize),

    #[error("Config error: {0}")]
    ConfigError(String),

    #[error("Cancelled")]
    Cancelled,

    /// 整轮重试次数耗尽，携带最后一次错误
    #[error("Turn failed after {attempts} attempts: {last}")]
    RetriesExhausted { attempts: u32, last: Box<AgentError> },
}

/// 恢复引擎根据错误类型给出的建议动作
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecoveryAction {
    /// 以相同输入整轮重试（检查点未提交，无部分状态）
    RetryTurn,
    /// 不可重试，直接上抛给调用方
    Surface,
}
