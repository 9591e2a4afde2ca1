//! 语义记忆（长期）：按相关度检索的只追加记录
//!
//! SemanticMemory 是外部向量库的窄接口：search(text, limit) 与 write(content)。
//! InMemorySemantic 以关键词重叠打分（无真实向量，适合本地与测试），WeaviateSemantic 见 weaviate 模块。

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::core::MemoryError;

/// 语义检索为空时工具返回的哨兵文本
pub const NO_MEMORIES: &str = "No relevant memories found.";

/// 一条语义记忆：创建后不可变，只按相关度检索
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MemoryRecord {
    pub content: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
}

impl MemoryRecord {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            timestamp: Utc::now(),
            embedding: None,
        }
    }

    /// 渲染为 `[timestamp] content`
    pub fn render(&self) -> String {
        format!("[{}] {}", self.timestamp.to_rfc3339(), self.content)
    }
}

/// 多条记录渲染为逐行文本；空列表返回空串
pub fn render_records(records: &[MemoryRecord]) -> String {
    records
        .iter()
        .map(MemoryRecord::render)
        .collect::<Vec<_>>()
        .join("\n")
}

/// 语义记忆接口
#[async_trait]
pub trait SemanticMemory: Send + Sync {
    /// 按相关度返回至多 limit 条
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<MemoryRecord>, MemoryError>;

    /// 写入一条新记忆（时间戳为当前时间）
    async fn write(&self, content: &str) -> Result<(), MemoryError>;
}

/// 将文本切分为小写词集合（去掉首尾标点）
fn tokenize_lower(s: &str) -> HashSet<String> {
    s.split_whitespace()
        .map(|w| w.trim_matches(|c: char| c.is_ascii_punctuation()).to_lowercase())
        .filter(|w| w.chars().count() > 1)
        .collect()
}

/// 内存实现：按查询词与记录词的交集大小排序，容量有上限（超出丢弃最旧）
#[derive(Clone)]
pub struct InMemorySemantic {
    store: Arc<RwLock<Vec<(MemoryRecord, HashSet<String>)>>>,
    max_entries: usize,
}

impl InMemorySemantic {
    pub fn new(max_entries: usize) -> Self {
        Self {
            store: Arc::new(RwLock::new(Vec::new())),
            max_entries: max_entries.max(1),
        }
    }

    pub async fn len(&self) -> usize {
        self.store.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.store.read().await.is_empty()
    }
}

impl Default for InMemorySemantic {
    fn default() -> Self {
        Self::new(1000)
    }
}

#[async_trait]
impl SemanticMemory for InMemorySemantic {
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<MemoryRecord>, MemoryError> {
        let query_tokens = tokenize_lower(query);
        if query_tokens.is_empty() || limit == 0 {
            return Ok(Vec::new());
        }
        let store = self.store.read().await;
        let mut scored: Vec<(usize, usize, &MemoryRecord)> = store
            .iter()
            .enumerate()
            .map(|(idx, (record, tokens))| (query_tokens.intersection(tokens).count(), idx, record))
            .filter(|(score, _, _)| *score > 0)
            .collect();
        // 分数高者优先，同分时较新的优先
        scored.sort_by(|a, b| b.0.cmp(&a.0).then(b.1.cmp(&a.1)));
        Ok(scored
            .into_iter()
            .take(limit)
            .map(|(_, _, r)| r.clone())
            .collect())
    }

    async fn write(&self, content: &str) -> Result<(), MemoryError> {
        let content = content.trim();
        if content.is_empty() {
            return Ok(());
        }
        let tokens = tokenize_lower(content);
        let mut store = self.store.write().await;
        store.push((MemoryRecord::new(content), tokens));
        let n = store.len();
        if n > self.max_entries {
            store.drain(0..n - self.max_entries);
        }
        Ok(())
    }
}
