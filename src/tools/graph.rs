//! 知识图谱工具：add_graph_node / add_graph_edge / query_graph
//!
//! query_graph 只接受结构化查询（node / relationships / label），不接受原始 Cypher。

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::memory::{render_rows, EdgeOutcome, GraphMemory, GraphQuery, Properties};
use crate::tools::Tool;

fn str_arg<'a>(args: &'a Value, key: &str) -> Result<&'a str, String> {
    args.get(key)
        .and_then(|v| v.as_str())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| format!("Missing '{key}'"))
}

/// properties 可以是 JSON 对象，也可以是 JSON 字符串形式的对象
fn parse_properties(raw: Option<&Value>) -> Result<Properties, String> {
    const ERR: &str = "Properties must be a valid JSON object";
    match raw {
        None | Some(Value::Null) => Ok(Properties::new()),
        Some(Value::Object(map)) => Ok(map.clone().into_iter().collect()),
        Some(Value::String(s)) if s.trim().is_empty() => Ok(Properties::new()),
        Some(Value::String(s)) => match serde_json::from_str::<Value>(s) {
            Ok(Value::Object(map)) => Ok(map.into_iter().collect()),
            _ => Err(ERR.to_string()),
        },
        Some(_) => Err(ERR.to_string()),
    }
}

pub struct AddGraphNodeTool {
    graph: Arc<dyn GraphMemory>,
}

impl AddGraphNodeTool {
    pub fn new(graph: Arc<dyn GraphMemory>) -> Self {
        Self { graph }
    }
}

#[async_trait]
impl Tool for AddGraphNodeTool {
    fn name(&self) -> &str {
        "add_graph_node"
    }

    fn description(&self) -> &str {
        "Add or update a knowledge graph node. Args: {\"label\": \"Project\", \"name\": \"unique name\", \"properties\": {\"status\": \"active\"}}"
    }

    fn parameters_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "label": { "type": "string" },
                "name": { "type": "string" },
                "properties": { "type": "object" }
            },
            "required": ["label", "name"]
        })
    }

    async fn execute(&self, args: Value) -> Result<String, String> {
        let label = str_arg(&args, "label")?;
        let name = str_arg(&args, "name")?;
        let props = parse_properties(args.get("properties"))?;
        self.graph
            .upsert_node(label, name, props)
            .await
            .map_err(|e| format!("Failed to add node: {e}"))?;
        Ok(format!("Added/updated node: {label} ({name})"))
    }
}

pub struct AddGraphEdgeTool {
    graph: Arc<dyn GraphMemory>,
}

impl AddGraphEdgeTool {
    pub fn new(graph: Arc<dyn GraphMemory>) -> Self {
        Self { graph }
    }
}

#[async_trait]
impl Tool for AddGraphEdgeTool {
    fn name(&self) -> &str {
        "add_graph_edge"
    }

    fn description(&self) -> &str {
        "Link two existing nodes. Args: {\"from\": \"source name\", \"relation\": \"DEPENDS_ON\", \"to\": \"target name\"}"
    }

    async fn execute(&self, args: Value) -> Result<String, String> {
        let from = str_arg(&args, "from")?;
        let relation = str_arg(&args, "relation")?;
        let to = str_arg(&args, "to")?;
        let outcome = self
            .graph
            .upsert_edge(from, relation, to)
            .await
            .map_err(|e| format!("Failed to add edge: {e}"))?;
        Ok(match outcome {
            EdgeOutcome::Created => format!(
                "Added edge: ({from}) -[{}]-> ({to})",
                relation.to_uppercase()
            ),
            EdgeOutcome::MissingEndpoints => {
                format!("Could not find both nodes '{from}' and '{to}'; no edge added.")
            }
        })
    }
}

pub struct QueryGraphTool {
    graph: Arc<dyn GraphMemory>,
}

impl QueryGraphTool {
    pub fn new(graph: Arc<dyn GraphMemory>) -> Self {
        Self { graph }
    }
}

#[async_trait]
impl Tool for QueryGraphTool {
    fn name(&self) -> &str {
        "query_graph"
    }

    fn description(&self) -> &str {
        "Query the knowledge graph. Args: {\"kind\": \"node\" | \"relationships\" | \"label\", \"value\": \"node name or label\"}"
    }

    fn parameters_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "kind": { "type": "string", "enum": ["node", "relationships", "label"] },
                "value": { "type": "string" }
            },
            "required": ["kind", "value"]
        })
    }

    async fn execute(&self, args: Value) -> Result<String, String> {
        let kind = str_arg(&args, "kind")?;
        let value = str_arg(&args, "value")?.to_string();
        let query = match kind {
            "node" => GraphQuery::NodeByName { name: value },
            "relationships" => GraphQuery::Relationships { name: value },
            "label" => GraphQuery::NodesByLabel { label: value },
            other => return Err(format!("Unknown query kind: {other}")),
        };
        let rows = self
            .graph
            .query(&query)
            .await
            .map_err(|e| format!("Query failed: {e}"))?;
        if rows.is_empty() {
            return Ok("No results found.".into());
        }
        Ok(render_rows(&rows))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::InMemoryGraph;
    use serde_json::json;

    #[tokio::test]
    async fn test_node_edge_query_flow() {
        let graph: Arc<dyn GraphMemory> = Arc::new(InMemoryGraph::new());
        let add_node = AddGraphNodeTool::new(graph.clone());
        let add_edge = AddGraphEdgeTool::new(graph.clone());
        let query = QueryGraphTool::new(graph);

        add_node
            .execute(json!({"label": "Project", "name": "DeepAgents", "properties": "{\"status\": \"active\"}"}))
            .await
            .unwrap();
        let missing = add_edge
            .execute(json!({"from": "DeepAgents", "relation": "uses", "to": "Weaviate"}))
            .await
            .unwrap();
        assert!(missing.contains("no edge added"));

        add_node
            .execute(json!({"label": "Database", "name": "Weaviate"}))
            .await
            .unwrap();
        let ok = add_edge
            .execute(json!({"from": "DeepAgents", "relation": "uses", "to": "Weaviate"}))
            .await
            .unwrap();
        assert!(ok.contains("-[USES]->"));

        let rows = query
            .execute(json!({"kind": "relationships", "value": "Weaviate"}))
            .await
            .unwrap();
        assert!(rows.contains("DeepAgents"));
        let node = query
            .execute(json!({"kind": "node", "value": "DeepAgents"}))
            .await
            .unwrap();
        assert!(node.contains("\"status\":\"active\""));
        assert_eq!(
            query
                .execute(json!({"kind": "node", "value": "Nobody"}))
                .await
                .unwrap(),
            "No results found."
        );
    }

    #[tokio::test]
    async fn test_bad_input_is_an_error() {
        let graph: Arc<dyn GraphMemory> = Arc::new(InMemoryGraph::new());
        let add_node = AddGraphNodeTool::new(graph.clone());
        assert!(add_node
            .execute(json!({"label": "Project", "name": "x", "properties": "not json"}))
            .await
            .is_err());
        assert!(add_node
            .execute(json!({"label": "Bad Label", "name": "x"}))
            .await
            .is_err());
        assert!(QueryGraphTool::new(graph)
            .execute(json!({"kind": "cypher", "value": "MATCH (n) RETURN n"}))
            .await
            .is_err());
    }
}
