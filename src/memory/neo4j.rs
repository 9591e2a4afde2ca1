//! Neo4j 图记忆适配器（HTTP 事务端点）
//!
//! 通过 `POST {url}/db/{database}/tx/commit` 执行 Cypher。名称与属性一律走 parameters；
//! label 与关系类型无法参数化，拼接前先做标识符校验。
//! 节点除 Neo4j 标签外还存一份 `label` 属性，查询时以它为准（标签集合只增不减）。

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};

use crate::core::MemoryError;
use crate::memory::graph::{
    normalize_relation, validate_label, EdgeOutcome, GraphMemory, GraphQuery, GraphRow,
    Properties,
};

/// 一条待执行的 Cypher 语句
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub cypher: String,
    pub parameters: Value,
}

const NODE_COLUMNS: &str =
    "coalesce(n.label, head(labels(n))) AS label, n.name AS name, properties(n) AS properties";

/// 将结构化查询翻译为参数化 Cypher
pub fn compile_query(query: &GraphQuery) -> Result<Statement, MemoryError> {
    Ok(match query {
        GraphQuery::NodeByName { name } => Statement {
            cypher: format!("MATCH (n {{name: $name}}) RETURN {NODE_COLUMNS}"),
            parameters: json!({ "name": name }),
        },
        GraphQuery::Relationships { name } => Statement {
            cypher: "MATCH (n {name: $name})-[r]-(m) \
                     RETURN startNode(r).name AS from, type(r) AS relation, endNode(r).name AS to"
                .to_string(),
            parameters: json!({ "name": name }),
        },
        GraphQuery::NodesByLabel { label } => {
            let label = validate_label(label)?;
            Statement {
                cypher: format!("MATCH (n:{label}) RETURN {NODE_COLUMNS} ORDER BY n.name"),
                parameters: json!({}),
            }
        }
    })
}

pub fn compile_upsert_node(
    label: &str,
    name: &str,
    properties: &Properties,
) -> Result<Statement, MemoryError> {
    let label = validate_label(label)?;
    Ok(Statement {
        cypher: format!("MERGE (n {{name: $name}}) SET n += $props, n.label = $label, n:{label}"),
        parameters: json!({ "name": name, "props": properties, "label": label }),
    })
}

pub fn compile_upsert_edge(from: &str, relation: &str, to: &str) -> Result<Statement, MemoryError> {
    let rel = normalize_relation(relation)?;
    Ok(Statement {
        cypher: format!(
            "MATCH (a {{name: $from}}), (b {{name: $to}}) MERGE (a)-[:{rel}]->(b) RETURN count(*) AS created"
        ),
        parameters: json!({ "from": from, "to": to }),
    })
}

/// 把事务端点的响应转为行：columns 与每个 data[].row 按位置配对
pub fn parse_rows(body: &Value) -> Result<Vec<GraphRow>, MemoryError> {
    if let Some(errors) = body.get("errors").and_then(|e| e.as_array()) {
        if let Some(first) = errors.first() {
            return Err(MemoryError::Backend(first.to_string()));
        }
    }
    let Some(result) = body.pointer("/results/0") else {
        return Ok(Vec::new());
    };
    let columns: Vec<String> = result
        .get("columns")
        .and_then(|c| c.as_array())
        .map(|c| c.iter().filter_map(|v| v.as_str().map(String::from)).collect())
        .unwrap_or_default();
    let data = result
        .get("data")
        .and_then(|d| d.as_array())
        .cloned()
        .unwrap_or_default();
    Ok(data
        .iter()
        .filter_map(|d| d.get("row").and_then(|r| r.as_array()))
        .map(|row| {
            columns
                .iter()
                .cloned()
                .zip(row.iter().cloned())
                .collect::<GraphRow>()
        })
        .collect())
}

pub struct Neo4jGraph {
    client: Client,
    endpoint: String,
    user: String,
    password: Option<String>,
}

impl Neo4jGraph {
    pub fn new(
        base_url: &str,
        database: &str,
        user: &str,
        password: Option<String>,
        timeout: Duration,
    ) -> Result<Self, MemoryError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| MemoryError::Request(e.to_string()))?;
        Ok(Self {
            client,
            endpoint: format!("{}/db/{}/tx/commit", base_url.trim_end_matches('/'), database),
            user: user.to_string(),
            password,
        })
    }

    async fn run(&self, stmt: Statement) -> Result<Vec<GraphRow>, MemoryError> {
        tracing::debug!(cypher = %stmt.cypher, "neo4j statement");
        let payload = json!({
            "statements": [{ "statement": stmt.cypher, "parameters": stmt.parameters }]
        });
        let resp = self
            .client
            .post(&self.endpoint)
            .basic_auth(&self.user, self.password.as_deref())
            .json(&payload)
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
        parse_rows(&body)
    }
}

#[async_trait]
impl GraphMemory for Neo4jGraph {
    async fn upsert_node(
        &self,
        label: &str,
        name: &str,
        properties: Properties,
    ) -> Result<(), MemoryError> {
        self.run(compile_upsert_node(label, name, &properties)?).await?;
        Ok(())
    }

    async fn upsert_edge(
        &self,
        from: &str,
        relation: &str,
        to: &str,
    ) -> Result<EdgeOutcome, MemoryError> {
        let rows = self.run(compile_upsert_edge(from, relation, to)?).await?;
        let created = rows
            .first()
            .and_then(|r| r.get("created"))
            .and_then(|v| v.as_i64())
            .unwrap_or(0);
        Ok(if created > 0 {
            EdgeOutcome::Created
        } else {
            EdgeOutcome::MissingEndpoints
        })
    }

    async fn query(&self, query: &GraphQuery) -> Result<Vec<GraphRow>, MemoryError> {
        self.run(compile_query(query)?).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names_are_parameters() {
        let stmt = compile_query(&GraphQuery::NodeByName {
            name: "x'}) DETACH DELETE n //".into(),
        })
        .unwrap();
        assert!(!stmt.cypher.contains("DETACH"));
        assert_eq!(stmt.parameters["name"], json!("x'}) DETACH DELETE n //"));
    }

    #[test]
    fn test_label_and_relation_validated() {
        assert!(compile_upsert_node("Bad Label", "x", &Properties::new()).is_err());
        assert!(compile_query(&GraphQuery::NodesByLabel { label: "A:B".into() }).is_err());
        let stmt = compile_upsert_edge("Ada", "works on", "Hive").unwrap();
        assert!(stmt.cypher.contains("[:WORKS_ON]"));
        assert!(compile_upsert_edge("Ada", "x]->(b) DELETE b //", "Hive").is_err());
    }

    #[test]
    fn test_parse_rows() {
        let body = json!({
            "results": [{
                "columns": ["from", "relation", "to"],
                "data": [{"row": ["DeepAgents", "USES", "Weaviate"], "meta": []}]
            }],
            "errors": []
        });
        let rows = parse_rows(&body).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["relation"], json!("USES"));

        let err = json!({"results": [], "errors": [{"code": "Neo.ClientError", "message": "bad"}]});
        assert!(matches!(parse_rows(&err), Err(MemoryError::Backend(_))));
    }
}
