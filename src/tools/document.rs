//! 文档工具：save_document / read_document

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::memory::{render_documents, DocumentStore, DOCUMENT_SEARCH_LIMIT, NO_DOCUMENTS};
use crate::tools::Tool;

/// tags 可以是字符串数组，也可以是逗号分隔的字符串
fn parse_tags(raw: Option<&Value>) -> Result<Vec<String>, String> {
    let tags: Vec<String> = match raw {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Array(items)) => items
            .iter()
            .map(|v| v.as_str().map(str::to_string).ok_or("Tags must be strings"))
            .collect::<Result<_, _>>()?,
        Some(Value::String(s)) => s.split(',').map(str::to_string).collect(),
        Some(_) => return Err("Tags must be a list of strings".into()),
    };
    Ok(tags
        .into_iter()
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .collect())
}

pub struct SaveDocumentTool {
    store: Arc<dyn DocumentStore>,
}

impl SaveDocumentTool {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Tool for SaveDocumentTool {
    fn name(&self) -> &str {
        "save_document"
    }

    fn description(&self) -> &str {
        "Save a document (plan, spec, notes) with a title and optional tags. Args: {\"title\": \"...\", \"content\": \"...\", \"tags\": [\"plan\"]}"
    }

    fn parameters_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "title": { "type": "string" },
                "content": { "type": "string" },
                "tags": { "type": "array", "items": { "type": "string" } }
            },
            "required": ["title", "content"]
        })
    }

    async fn execute(&self, args: Value) -> Result<String, String> {
        let title = args
            .get("title")
            .and_then(|v| v.as_str())
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or("Missing 'title'")?;
        let content = args.get("content").and_then(|v| v.as_str()).ok_or("Missing 'content'")?;
        let tags = parse_tags(args.get("tags"))?;
        let id = self
            .store
            .save(title, content, tags)
            .await
            .map_err(|e| format!("Error saving document: {e}"))?;
        Ok(format!("Document saved successfully with ID: {id}"))
    }
}

pub struct ReadDocumentTool {
    store: Arc<dyn DocumentStore>,
}

impl ReadDocumentTool {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Tool for ReadDocumentTool {
    fn name(&self) -> &str {
        "read_document"
    }

    fn description(&self) -> &str {
        "Search saved documents by title or tag (case-insensitive). Args: {\"query\": \"plan\"}"
    }

    fn parameters_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": { "query": { "type": "string" } },
            "required": ["query"]
        })
    }

    async fn execute(&self, args: Value) -> Result<String, String> {
        let query = args.get("query").and_then(|v| v.as_str()).unwrap_or("");
        let docs = self
            .store
            .find(query, DOCUMENT_SEARCH_LIMIT)
            .await
            .map_err(|e| format!("Error reading documents: {e}"))?;
        if docs.is_empty() {
            return Ok(NO_DOCUMENTS.to_string());
        }
        Ok(render_documents(&docs))
    }
}
