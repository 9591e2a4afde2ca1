//! 文档存储：带标题与标签的键值/文档记忆
//!
//! 与语义记忆不同，文档按标题或标签做不区分大小写的子串匹配，用于保存计划、规格说明等整段材料。
//! 提供内存与单文件 JSON 两种实现。

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, RwLock};

use crate::core::MemoryError;

/// 检索无结果时工具返回的哨兵文本
pub const NO_DOCUMENTS: &str = "No documents found.";

/// 单次检索返回的文档上限
pub const DOCUMENT_SEARCH_LIMIT: usize = 5;

/// 渲染时正文截断长度
const CONTENT_PREVIEW_CHARS: usize = 200;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub tags: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Document {
    pub fn new(title: impl Into<String>, content: impl Into<String>, tags: Vec<String>) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            title: title.into(),
            content: content.into(),
            tags,
            created_at: now,
            updated_at: now,
        }
    }

    /// 标题或任一标签包含 query（不区分大小写）；空 query 匹配全部
    pub fn matches(&self, query: &str) -> bool {
        let q = query.trim().to_lowercase();
        self.title.to_lowercase().contains(&q) || self.tags.iter().any(|t| t.to_lowercase().contains(&q))
    }

    pub fn render(&self) -> String {
        let preview: String = self.content.chars().take(CONTENT_PREVIEW_CHARS).collect();
        let ellipsis = if self.content.chars().count() > CONTENT_PREVIEW_CHARS { "..." } else { "" };
        format!(
            "Title: {}\nTags: [{}]\nContent: {preview}{ellipsis}",
            self.title,
            self.tags.join(", ")
        )
    }
}

/// 多篇文档以 `---` 分隔渲染
pub fn render_documents(docs: &[Document]) -> String {
    docs.iter()
        .map(Document::render)
        .collect::<Vec<_>>()
        .join("\n---\n")
}

#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// 保存一篇文档，返回其 ID
    async fn save(&self, title: &str, content: &str, tags: Vec<String>) -> Result<String, MemoryError>;

    /// 按标题或标签检索，至多 limit 篇，按保存顺序
    async fn find(&self, query: &str, limit: usize) -> Result<Vec<Document>, MemoryError>;
}

fn select(docs: &[Document], query: &str, limit: usize) -> Vec<Document> {
    docs.iter().filter(|d| d.matches(query)).take(limit).cloned().collect()
}

#[derive(Clone, Default)]
pub struct InMemoryDocumentStore {
    docs: Arc<RwLock<Vec<Document>>>,
}

impl InMemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.docs.read().await.len()
    }
}

#[async_trait]
impl DocumentStore for InMemoryDocumentStore {
    async fn save(&self, title: &str, content: &str, tags: Vec<String>) -> Result<String, MemoryError> {
        let doc = Document::new(title, content, tags);
        let id = doc.id.clone();
        self.docs.write().await.push(doc);
        Ok(id)
    }

    async fn find(&self, query: &str, limit: usize) -> Result<Vec<Document>, MemoryError> {
        Ok(select(&self.docs.read().await, query, limit))
    }
}

/// 单文件 JSON 文档库：整表读出、追加、经临时文件 rename 写回
#[derive(Debug)]
pub struct FileDocumentStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl FileDocumentStore {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            write_lock: Mutex::new(()),
        }
    }

    async fn load(&self) -> Result<Vec<Document>, MemoryError> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(data) => serde_json::from_str(&data)
                .map_err(|e| MemoryError::Backend(format!("corrupt document store: {e}"))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(MemoryError::Backend(format!("read {}: {e}", self.path.display()))),
        }
    }
}

#[async_trait]
impl DocumentStore for FileDocumentStore {
    async fn save(&self, title: &str, content: &str, tags: Vec<String>) -> Result<String, MemoryError> {
        let _guard = self.write_lock.lock().await;
        let mut docs = self.load().await?;
        let doc = Document::new(title, content, tags);
        let id = doc.id.clone();
        docs.push(doc);

        let io_err = |e: std::io::Error| MemoryError::Backend(format!("write {}: {e}", self.path.display()));
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(io_err)?;
        }
        let data = serde_json::to_string_pretty(&docs).map_err(|e| MemoryError::Backend(e.to_string()))?;
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, data).await.map_err(io_err)?;
        tokio::fs::rename(&tmp, &self.path).await.map_err(io_err)?;
        tracing::debug!(id = %id, total = docs.len(), "document saved");
        Ok(id)
    }

    async fn find(&self, query: &str, limit: usize) -> Result<Vec<Document>, MemoryError> {
        Ok(select(&self.load().await?, query, limit))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_find_by_title_or_tag_case_insensitive() {
        let store = InMemoryDocumentStore::new();
        store
            .save("Crawler Design", "Use tokio and reqwest", vec!["architecture".into()])
            .await
            .unwrap();
        store.save("Release notes", "v0.1", vec!["Crawler".into()]).await.unwrap();
        store.save("Grocery list", "eggs", vec![]).await.unwrap();

        let hits = store.find("crawler", DOCUMENT_SEARCH_LIMIT).await.unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].title, "Crawler Design");
        assert_eq!(store.find("ARCHITECT", 5).await.unwrap().len(), 1);
        // 正文不参与匹配
        assert!(store.find("tokio", 5).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_find_respects_limit() {
        let store = InMemoryDocumentStore::new();
        for i in 0..8 {
            store.save(&format!("spec {i}"), "body", vec![]).await.unwrap();
        }
        assert_eq!(store.find("spec", DOCUMENT_SEARCH_LIMIT).await.unwrap().len(), 5);
        assert_eq!(store.len().await, 8);
    }

    #[test]
    fn test_render_truncates_content() {
        let doc = Document::new("Long", "x".repeat(300), vec!["a".into(), "b".into()]);
        let out = doc.render();
        assert!(out.starts_with("Title: Long\nTags: [a, b]\nContent: "));
        assert!(out.ends_with("..."));
        assert_eq!(out.matches('x').count(), 200);
        assert!(!Document::new("Short", "hi", vec![]).render().ends_with("..."));
    }

    #[tokio::test]
    async fn test_file_store_persists_across_instances() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("docs").join("documents.json");
        let id = FileDocumentStore::new(&path)
            .save("ADR 1", "Adopt sqlx", vec!["decision".into()])
            .await
            .unwrap();

        let reopened = FileDocumentStore::new(&path);
        let hits = reopened.find("decision", 5).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, id);
        assert!(reopened.find("missing", 5).await.unwrap().is_empty());
        assert!(!path.with_extension("json.tmp").exists());
    }
}
