//! Weaviate 语义记忆适配器
//!
//! 检索走 GraphQL BM25（`/v1/graphql`），写入走 REST（`/v1/objects`）。
//! 查询文本经 JSON 字符串编码后嵌入 GraphQL，避免引号注入；所有请求受 HTTP 客户端超时约束。

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde_json::{json, Value};

use crate::core::MemoryError;
use crate::memory::{MemoryRecord, SemanticMemory};

pub struct WeaviateSemantic {
    client: Client,
    base_url: String,
    collection: String,
}

impl WeaviateSemantic {
    pub fn new(
        base_url: &str,
        collection: &str,
        timeout: Duration,
    ) -> Result<Self, MemoryError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| MemoryError::Request(e.to_string()))?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            collection: collection.to_string(),
        })
    }

    fn graphql_query(&self, query: &str, limit: usize) -> Result<String, MemoryError> {
        let encoded =
            serde_json::to_string(query).map_err(|e| MemoryError::Request(e.to_string()))?;
        Ok(format!(
            r#"{{ Get {{ {collection}(limit: {limit}, bm25: {{ query: {encoded}, properties: ["content"] }}) {{ content timestamp }} }} }}"#,
            collection = self.collection,
        ))
    }

    /// 解析 GraphQL 响应：`data.Get.<collection>` 下的 content / timestamp
    fn parse_records(&self, body: &Value) -> Result<Vec<MemoryRecord>, MemoryError> {
        if let Some(errors) = body.get("errors") {
            return Err(MemoryError::Backend(errors.to_string()));
        }
        let items = body
            .pointer(&format!("/data/Get/{}", self.collection))
            .and_then(|v| v.as_array())
            .cloned()
            .unwrap_or_default();
        Ok(items
            .iter()
            .filter_map(|item| {
                let content = item.get("content")?.as_str()?.to_string();
                let timestamp = item
                    .get("timestamp")
                    .and_then(|t| t.as_str())
                    .and_then(|t| DateTime::parse_from_rfc3339(t).ok())
                    .map(|t| t.with_timezone(&Utc))
                    .unwrap_or_else(Utc::now);
                Some(MemoryRecord {
                    content,
                    timestamp,
                    embedding: None,
                })
            })
            .collect())
    }
}

#[async_trait]
impl SemanticMemory for WeaviateSemantic {
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<MemoryRecord>, MemoryError> {
        if query.trim().is_empty() || limit == 0 {
            return Ok(Vec::new());
        }
        let gql = self.graphql_query(query, limit)?;
        let resp = self
            .client
            .post(format!("{}/v1/graphql", self.base_url))
            .json(&json!({ "query": gql }))
            .send()
            .await
            .map_err(|e| MemoryError::Request(e.to_string()))?;
        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(MemoryError::Backend(format!("{status}: {text}")));
        }
        let body: Value = resp
            .json()
            .await
            .map_err(|e| MemoryError::Request(e.to_string()))?;
        self.parse_records(&body)
    }

    async fn write(&self, content: &str) -> Result<(), MemoryError> {
        let payload = json!({
            "class": self.collection,
            "properties": {
                "content": content,
                "timestamp": Utc::now().to_rfc3339(),
            }
        });
        let resp = self
            .client
            .post(format!("{}/v1/objects", self.base_url))
            .json(&payload)
            .send()
            .await
            .map_err(|e| MemoryError::Request(e.to_string()))?;
        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(MemoryError::Backend(format!("{status}: {text}")));
        }
        Ok(())
    }
}
