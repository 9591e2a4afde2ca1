//! 记忆层：消息模型、语义记忆、图记忆、检查点持久化
//!
//! - **conversation**: Message / Content / Role
//! - **long_term** + **weaviate**: 语义记忆（按相关度检索的只追加记录）
//! - **graph** + **neo4j**: 实体与关系
//! - **document**: 带标题与标签的文档库
//! - **persistence** + **async_persistence**: TurnState 检查点（内存 / 文件 / SQLite）

pub mod async_persistence;
pub mod conversation;
pub mod document;
pub mod graph;
pub mod long_term;
pub mod neo4j;
pub mod persistence;
pub mod weaviate;

use std::sync::Arc;
use std::time::Duration;

#[cfg(feature = "async-sqlite")]
pub use async_persistence::SqliteCheckpointStore;
pub use conversation::{Content, ContentBlock, Message, Role, ToolCall};
pub use document::{
    render_documents, Document, DocumentStore, FileDocumentStore, InMemoryDocumentStore,
    DOCUMENT_SEARCH_LIMIT, NO_DOCUMENTS,
};
pub use graph::{
    render_rows, EdgeOutcome, GraphEdge, GraphMemory, GraphNode, GraphQuery, GraphRow,
    InMemoryGraph, Properties,
};
pub use long_term::{render_records, InMemorySemantic, MemoryRecord, SemanticMemory, NO_MEMORIES};
pub use neo4j::Neo4jGraph;
pub use persistence::{CheckpointStore, FileCheckpointStore, InMemoryCheckpointStore};
pub use weaviate::WeaviateSemantic;

use crate::config::AppConfig;
use crate::core::AgentError;

/// 按 [memory].semantic_backend 创建语义记忆
pub fn create_semantic_from_config(cfg: &AppConfig) -> Result<Arc<dyn SemanticMemory>, AgentError> {
    let timeout = Duration::from_secs(cfg.memory.query_timeout_secs);
    match cfg.memory.semantic_backend.to_lowercase().as_str() {
        "weaviate" => {
            tracing::info!(url = %cfg.memory.weaviate_url, "Using Weaviate semantic memory");
            Ok(Arc::new(WeaviateSemantic::new(
                &cfg.memory.weaviate_url,
                &cfg.memory.collection,
                timeout,
            )?))
        }
        "memory" => Ok(Arc::new(InMemorySemantic::default())),
        other => Err(AgentError::ConfigError(format!(
            "unknown semantic backend: {other}"
        ))),
    }
}

/// 按 [memory].graph_backend 创建图记忆
pub fn create_graph_from_config(cfg: &AppConfig) -> Result<Arc<dyn GraphMemory>, AgentError> {
    let timeout = Duration::from_secs(cfg.memory.query_timeout_secs);
    match cfg.memory.graph_backend.to_lowercase().as_str() {
        "neo4j" => {
            tracing::info!(url = %cfg.memory.neo4j_url, "Using Neo4j graph memory");
            Ok(Arc::new(Neo4jGraph::new(
                &cfg.memory.neo4j_url,
                &cfg.memory.neo4j_database,
                &cfg.memory.neo4j_user,
                cfg.memory.neo4j_password.clone(),
                timeout,
            )?))
        }
        "memory" => Ok(Arc::new(InMemoryGraph::new())),
        other => Err(AgentError::ConfigError(format!("unknown graph backend: {other}"))),
    }
}

/// 按 [memory].document_backend 创建文档库
pub fn create_document_store_from_config(
    cfg: &AppConfig,
) -> Result<Arc<dyn DocumentStore>, AgentError> {
    match cfg.memory.document_backend.to_lowercase().as_str() {
        "memory" => Ok(Arc::new(InMemoryDocumentStore::new())),
        "file" => {
            let path = cfg
                .memory
                .document_path
                .clone()
                .unwrap_or_else(|| ".hive/documents.json".into());
            Ok(Arc::new(FileDocumentStore::new(path)))
        }
        other => Err(AgentError::ConfigError(format!(
            "unknown document backend: {other}"
        ))),
    }
}

/// 按 [checkpoint] 段创建检查点存储；path 缺省为 .hive/checkpoints（file）或 .hive/hive.db（sqlite）
pub async fn create_checkpoint_store(
    cfg: &AppConfig,
) -> Result<Arc<dyn CheckpointStore>, AgentError> {
    match cfg.checkpoint.backend.to_lowercase().as_str() {
        "memory" => Ok(Arc::new(InMemoryCheckpointStore::new())),
        "file" => {
            let dir = cfg
                .checkpoint
                .path
                .clone()
                .unwrap_or_else(|| ".hive/checkpoints".into());
            Ok(Arc::new(FileCheckpointStore::new(dir)))
        }
        #[cfg(feature = "async-sqlite")]
        "sqlite" => {
            let path = cfg
                .checkpoint
                .path
                .clone()
                .unwrap_or_else(|| ".hive/hive.db".into());
            let store = SqliteCheckpointStore::new(path).await?;
            Ok(Arc::new(store))
        }
        other => Err(AgentError::ConfigError(format!(
            "unknown checkpoint backend: {other}"
        ))),
    }
}
