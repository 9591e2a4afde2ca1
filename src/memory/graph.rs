//! 图记忆：实体节点与有向关系
//!
//! 节点按 name 全局唯一；重复 upsert 合并属性，label 以最后一次写入为准。
//! 关系 (from, relation, to) 要求两端节点已存在，否则返回 MissingEndpoints（不是错误）。
//! 所有查询都是结构化的 GraphQuery，由各后端自行翻译（Neo4j 后端用参数化 Cypher）。

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::{Arc, OnceLock};

use async_trait::async_trait;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::RwLock;

use crate::core::MemoryError;

/// 属性表（有序，便于渲染稳定）
pub type Properties = BTreeMap<String, Value>;

/// 查询结果中的一行：列名 -> 值
pub type GraphRow = BTreeMap<String, Value>;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GraphNode {
    pub label: String,
    pub name: String,
    #[serde(default)]
    pub properties: Properties,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GraphEdge {
    pub from: String,
    pub relation: String,
    pub to: String,
}

/// 关系写入结果
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EdgeOutcome {
    Created,
    /// 至少一端节点不存在，未写入
    MissingEndpoints,
}

/// 结构化图查询
#[derive(Clone, Debug, PartialEq)]
pub enum GraphQuery {
    /// 按名称精确查节点
    NodeByName { name: String },
    /// 以该名称为起点或终点的一跳关系
    Relationships { name: String },
    /// 按 label 列出节点
    NodesByLabel { label: String },
}

/// 图记忆接口
#[async_trait]
pub trait GraphMemory: Send + Sync {
    async fn upsert_node(
        &self,
        label: &str,
        name: &str,
        properties: Properties,
    ) -> Result<(), MemoryError>;

    async fn upsert_edge(
        &self,
        from: &str,
        relation: &str,
        to: &str,
    ) -> Result<EdgeOutcome, MemoryError>;

    async fn query(&self, query: &GraphQuery) -> Result<Vec<GraphRow>, MemoryError>;
}

fn identifier_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("valid identifier pattern"))
}

/// 校验 label（Cypher 无法参数化标签，只允许标识符）
pub fn validate_label(label: &str) -> Result<&str, MemoryError> {
    if identifier_pattern().is_match(label) {
        Ok(label)
    } else {
        Err(MemoryError::InvalidIdentifier(label.to_string()))
    }
}

/// 规范化关系类型：大写，空格与连字符转下划线，再做标识符校验
pub fn normalize_relation(relation: &str) -> Result<String, MemoryError> {
    let rel: String = relation
        .trim()
        .chars()
        .map(|c| if c == ' ' || c == '-' { '_' } else { c.to_ascii_uppercase() })
        .collect();
    if identifier_pattern().is_match(&rel) {
        Ok(rel)
    } else {
        Err(MemoryError::InvalidIdentifier(relation.to_string()))
    }
}

/// 查询结果渲染为逐行 JSON；空结果返回空串
pub fn render_rows(rows: &[GraphRow]) -> String {
    rows.iter()
        .map(|r| serde_json::to_string(r).unwrap_or_default())
        .collect::<Vec<_>>()
        .join("\n")
}

fn node_row(node: &GraphNode) -> GraphRow {
    let mut row = GraphRow::new();
    row.insert("label".into(), Value::String(node.label.clone()));
    row.insert("name".into(), Value::String(node.name.clone()));
    row.insert(
        "properties".into(),
        Value::Object(node.properties.clone().into_iter().collect()),
    );
    row
}

fn edge_row(edge: &GraphEdge) -> GraphRow {
    let mut row = GraphRow::new();
    row.insert("from".into(), Value::String(edge.from.clone()));
    row.insert("relation".into(), Value::String(edge.relation.clone()));
    row.insert("to".into(), Value::String(edge.to.clone()));
    row
}

#[derive(Default)]
struct GraphInner {
    nodes: HashMap<String, GraphNode>,
    edges: BTreeSet<GraphEdge>,
}

/// 内存图：本地运行与测试用
#[derive(Clone, Default)]
pub struct InMemoryGraph {
    inner: Arc<RwLock<GraphInner>>,
}

impl InMemoryGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn node(&self, name: &str) -> Option<GraphNode> {
        self.inner.read().await.nodes.get(name).cloned()
    }

    pub async fn node_count(&self) -> usize {
        self.inner.read().await.nodes.len()
    }

    pub async fn edge_count(&self) -> usize {
        self.inner.read().await.edges.len()
    }
}

#[async_trait]
impl GraphMemory for InMemoryGraph {
    async fn upsert_node(
        &self,
        label: &str,
        name: &str,
        properties: Properties,
    ) -> Result<(), MemoryError> {
        let label = validate_label(label)?;
        let mut inner = self.inner.write().await;
        let node = inner
            .nodes
            .entry(name.to_string())
            .or_insert_with(|| GraphNode {
                label: label.to_string(),
                name: name.to_string(),
                properties: Properties::new(),
            });
        node.label = label.to_string();
        node.properties.extend(properties);
        Ok(())
    }

    async fn upsert_edge(
        &self,
        from: &str,
        relation: &str,
        to: &str,
    ) -> Result<EdgeOutcome, MemoryError> {
        let relation = normalize_relation(relation)?;
        let mut inner = self.inner.write().await;
        if !inner.nodes.contains_key(from) || !inner.nodes.contains_key(to) {
            tracing::debug!(from, to, "edge skipped: missing endpoints");
            return Ok(EdgeOutcome::MissingEndpoints);
        }
        inner.edges.insert(GraphEdge {
            from: from.to_string(),
            relation,
            to: to.to_string(),
        });
        Ok(EdgeOutcome::Created)
    }

    async fn query(&self, query: &GraphQuery) -> Result<Vec<GraphRow>, MemoryError> {
        let inner = self.inner.read().await;
        let rows = match query {
            GraphQuery::NodeByName { name } => {
                inner.nodes.get(name).map(node_row).into_iter().collect()
            }
            GraphQuery::Relationships { name } => inner
                .edges
                .iter()
                .filter(|e| &e.from == name || &e.to == name)
                .map(edge_row)
                .collect(),
            GraphQuery::NodesByLabel { label } => {
                let mut nodes: Vec<&GraphNode> =
                    inner.nodes.values().filter(|n| &n.label == label).collect();
                nodes.sort_by(|a, b| a.name.cmp(&b.name));
                nodes.into_iter().map(node_row).collect()
            }
        };
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn props(v: Value) -> Properties {
        v.as_object().unwrap().clone().into_iter().collect()
    }

    #[tokio::test]
    async fn test_node_upsert_is_idempotent_and_merges() {
        let g = InMemoryGraph::new();
        g.upsert_node("Project", "DeepAgents", props(json!({"lang": "python"})))
            .await
            .unwrap();
        g.upsert_node("Project", "DeepAgents", props(json!({"status": "active"})))
            .await
            .unwrap();
        assert_eq!(g.node_count().await, 1);
        let node = g.node("DeepAgents").await.unwrap();
        assert_eq!(node.properties.get("lang"), Some(&json!("python")));
        assert_eq!(node.properties.get("status"), Some(&json!("active")));
    }

    #[tokio::test]
    async fn test_relabel_last_writer_wins() {
        let g = InMemoryGraph::new();
        g.upsert_node("Person", "Ada", Properties::new()).await.unwrap();
        g.upsert_node("Engineer", "Ada", Properties::new()).await.unwrap();
        assert_eq!(g.node("Ada").await.unwrap().label, "Engineer");
    }

    #[tokio::test]
    async fn test_edge_requires_endpoints() {
        let g = InMemoryGraph::new();
        g.upsert_node("Person", "Ada", Properties::new()).await.unwrap();
        let outcome = g.upsert_edge("Ada", "works_on", "Hive").await.unwrap();
        assert_eq!(outcome, EdgeOutcome::MissingEndpoints);
        assert_eq!(g.edge_count().await, 0);

        g.upsert_node("Project", "Hive", Properties::new()).await.unwrap();
        let outcome = g.upsert_edge("Ada", "works on", "Hive").await.unwrap();
        assert_eq!(outcome, EdgeOutcome::Created);

        let rows = g
            .query(&GraphQuery::Relationships { name: "Hive".into() })
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["relation"], json!("WORKS_ON"));
        assert_eq!(rows[0]["from"], json!("Ada"));
    }

    #[tokio::test]
    async fn test_invalid_label_rejected() {
        let g = InMemoryGraph::new();
        let err = g
            .upsert_node("Bad Label}) DETACH DELETE n //", "x", Properties::new())
            .await
            .unwrap_err();
        assert!(matches!(err, MemoryError::InvalidIdentifier(_)));
        assert_eq!(g.node_count().await, 0);
    }

    #[tokio::test]
    async fn test_query_by_name_and_label() {
        let g = InMemoryGraph::new();
        g.upsert_node("Tool", "ripgrep", Properties::new()).await.unwrap();
        g.upsert_node("Tool", "fd", Properties::new()).await.unwrap();
        assert!(g
            .query(&GraphQuery::NodeByName { name: "missing".into() })
            .await
            .unwrap()
            .is_empty());
        let rows = g
            .query(&GraphQuery::NodesByLabel { label: "Tool".into() })
            .await
            .unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0]["name"], json!("fd"));
    }

    #[test]
    fn test_normalize_relation() {
        assert_eq!(normalize_relation("depends-on").unwrap(), "DEPENDS_ON");
        assert!(normalize_relation("a`b").is_err());
        assert!(normalize_relation("").is_err());
    }
}
