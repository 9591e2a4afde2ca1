//! Hive - 受监督的多智能体编码团队
//!
//! Supervisor 在 Planner / Coder / Reviewer 三个专家之间路由，每条人类输入先经
//! 语义记忆与知识图谱融合上下文，每隔若干回合反思一次写回长期记忆，线程状态按检查点持久化。
//!
//! 模块划分：
//! - **config**: 应用配置加载（TOML + 环境变量）与密钥文件
//! - **core**: 错误与恢复、轮次状态、线程标识、会话监管、轮次编排、运行时装配
//! - **llm**: LLM 客户端抽象与实现（OpenAI 兼容 / Mock / Scripted）
//! - **memory**: 消息模型、语义记忆、图记忆、检查点存储
//! - **observability**: tracing 初始化
//! - **react**: Supervisor 路由、专家智能体、团队循环、上下文融合、反思
//! - **tools**: 工具注册表、执行器与各工具实现

pub mod config;
pub mod core;
pub mod llm;
pub mod memory;
pub mod observability;
pub mod react;
pub mod tools;

pub use crate::core::{TeamBuilder, TeamRuntime, TurnOutcome, TurnRunner};
