//! 语义记忆工具：save_memory / recall_memory

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::memory::{render_records, SemanticMemory, NO_MEMORIES};
use crate::tools::Tool;

pub struct SaveMemoryTool {
    memory: Arc<dyn SemanticMemory>,
}

impl SaveMemoryTool {
    pub fn new(memory: Arc<dyn SemanticMemory>) -> Self {
        Self { memory }
    }
}

#[async_trait]
impl Tool for SaveMemoryTool {
    fn name(&self) -> &str {
        "save_memory"
    }

    fn description(&self) -> &str {
        "Save an important fact, preference or decision to long-term memory. Args: {\"content\": \"text to remember\"}"
    }

    fn parameters_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": { "content": { "type": "string" } },
            "required": ["content"]
        })
    }

    async fn execute(&self, args: Value) -> Result<String, String> {
        let content = args
            .get("content")
            .and_then(|v| v.as_str())
            .map(str::trim)
            .unwrap_or("");
        if content.is_empty() {
            return Err("Missing 'content'".into());
        }
        self.memory
            .write(content)
            .await
            .map_err(|e| format!("Failed to save memory: {e}"))?;
        Ok(format!("Saved to long-term memory: {content}"))
    }
}

pub struct RecallMemoryTool {
    memory: Arc<dyn SemanticMemory>,
    limit: usize,
}

impl RecallMemoryTool {
    pub fn new(memory: Arc<dyn SemanticMemory>, limit: usize) -> Self {
        Self { memory, limit }
    }
}

#[async_trait]
impl Tool for RecallMemoryTool {
    fn name(&self) -> &str {
        "recall_memory"
    }

    fn description(&self) -> &str {
        "Search long-term memory by keyword or phrase. Args: {\"query\": \"what to look for\"}"
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
        let records = self
            .memory
            .search(query, self.limit)
            .await
            .map_err(|e| format!("Failed to recall memory: {e}"))?;
        if records.is_empty() {
            return Ok(NO_MEMORIES.to_string());
        }
        Ok(render_records(&records))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::InMemorySemantic;
    use serde_json::json;

    #[tokio::test]
    async fn test_save_then_recall() {
        let mem: Arc<dyn SemanticMemory> = Arc::new(InMemorySemantic::default());
        let save = SaveMemoryTool::new(mem.clone());
        let recall = RecallMemoryTool::new(mem, 5);

        assert_eq!(
            recall.execute(json!({"query": "Weaviate"})).await.unwrap(),
            NO_MEMORIES
        );
        save.execute(json!({"content": "The project DeepAgents uses Weaviate for memory."}))
            .await
            .unwrap();
        let out = recall.execute(json!({"query": "Weaviate"})).await.unwrap();
        assert!(out.contains("DeepAgents uses Weaviate"));
        assert!(save.execute(json!({})).await.is_err());
    }
}
