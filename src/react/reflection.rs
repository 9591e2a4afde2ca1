//! Reflection：周期性地把最近对话提炼为长期记忆
//!
//! 取最近 10 条消息渲染为 `Human: …` / `Agent: …`，让 LLM 输出 summary / entities / relationships 的 JSON，
//! 写回语义记忆与图记忆。任何失败都只记日志并返回 None，不影响调用方。

use std::sync::Arc;

use serde::Deserialize;

use crate::core::{AgentError, MemoryError, TurnState};
use crate::llm::LlmClient;
use crate::memory::{EdgeOutcome, GraphMemory, Message, Properties, Role, SemanticMemory};

/// 反思窗口大小
pub const REFLECTION_WINDOW: usize = 10;

/// 反思成功后追加的系统消息
pub const MEMORY_UPDATED: &str = "[System] Episodic memory updated.";

const EXTRACTION_PROMPT: &str = r#"You are the "Subconscious Memory" of an AI agent.
Analyze the following conversation snippet and extract:
1. A concise summary of what was achieved or discussed (for Semantic Memory).
2. Key entities (Projects, Tools, Concepts) and their types (for Knowledge Graph).
3. Relationships between these entities (for Knowledge Graph).

Conversation:
{conversation}

Output JSON format:
{
    "summary": "...",
    "entities": [{"name": "...", "type": "..."}],
    "relationships": [{"from": "...", "to": "...", "type": "..."}]
}"#;

#[derive(Debug, Default, Deserialize)]
struct Extraction {
    #[serde(default)]
    summary: Option<String>,
    #[serde(default)]
    entities: Vec<Entity>,
    #[serde(default)]
    relationships: Vec<Relationship>,
}

#[derive(Debug, Deserialize)]
struct Entity {
    name: String,
    #[serde(rename = "type")]
    kind: String,
}

#[derive(Debug, Deserialize)]
struct Relationship {
    from: String,
    to: String,
    #[serde(rename = "type")]
    kind: String,
}

/// 渲染最近至多 10 条消息；System 消息按 Agent 渲染
pub fn render_window(messages: &[Message]) -> String {
    let start = messages.len().saturating_sub(REFLECTION_WINDOW);
    messages[start..]
        .iter()
        .map(|m| {
            let who = match m.role {
                Role::Human => "Human",
                Role::Agent | Role::System => "Agent",
            };
            format!("{who}: {}", m.text())
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// 去掉包裹的代码围栏（带或不带语言标记），没有围栏时原样返回
pub fn strip_code_fence(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(start) = trimmed.find("```") else {
        return trimmed;
    };
    let rest = &trimmed[start + 3..];
    // 开头一行若只是语言标记（json / jsonc / JSON5 ...）则整行去掉
    let body = match rest.split_once('\n') {
        Some((tag, body)) if is_fence_tag(tag) => body,
        _ => rest,
    };
    body.find("```").map_or(body, |end| &body[..end]).trim()
}

fn is_fence_tag(line: &str) -> bool {
    line.trim()
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '+' | '.'))
}

/// 实体类型转为图标签：空白与连字符变下划线
fn label_for(kind: &str) -> String {
    kind.trim()
        .chars()
        .map(|c| if c.is_whitespace() || c == '-' { '_' } else { c })
        .collect()
}

pub struct Reflector {
    llm: Arc<dyn LlmClient>,
    semantic: Arc<dyn SemanticMemory>,
    graph: Arc<dyn GraphMemory>,
}

impl Reflector {
    pub fn new(
        llm: Arc<dyn LlmClient>,
        semantic: Arc<dyn SemanticMemory>,
        graph: Arc<dyn GraphMemory>,
    ) -> Self {
        Self {
            llm,
            semantic,
            graph,
        }
    }

    /// 第 n 个人类回合结束后是否该反思
    pub fn is_due(state: &TurnState, interval: usize) -> bool {
        interval > 0 && state.human_turns() > 0 && state.human_turns() % interval == 0
    }

    /// 反思；成功返回要追加的系统消息，失败返回 None
    pub async fn reflect(&self, state: &TurnState) -> Option<Message> {
        if state.is_empty() {
            return None;
        }
        match self.try_reflect(state).await {
            Ok(msg) => Some(msg),
            Err(e) => {
                tracing::warn!(thread_id = %state.thread_id(), error = %e, "reflection skipped");
                None
            }
        }
    }

    async fn try_reflect(&self, state: &TurnState) -> Result<Message, AgentError> {
        let conversation = render_window(state.messages());
        let prompt = EXTRACTION_PROMPT.replace("{conversation}", &conversation);
        let reply = self.llm.complete(&[Message::human(prompt)]).await?;
        let text = reply.text();
        let extraction: Extraction = serde_json::from_str(strip_code_fence(&text))
            .map_err(|e| AgentError::JsonParseError(e.to_string()))?;

        if let Some(summary) = extraction.summary.as_deref().map(str::trim) {
            if !summary.is_empty() {
                tracing::info!(summary, "reflection: saving summary");
                self.semantic.write(summary).await?;
            }
        }

        for entity in &extraction.entities {
            if entity.name.trim().is_empty() {
                continue;
            }
            match self
                .graph
                .upsert_node(&label_for(&entity.kind), &entity.name, Properties::new())
                .await
            {
                Ok(()) => {}
                Err(MemoryError::InvalidIdentifier(id)) => {
                    tracing::warn!(name = %entity.name, label = %id, "reflection: entity skipped");
                }
                Err(e) => return Err(e.into()),
            }
        }

        for rel in &extraction.relationships {
            match self.graph.upsert_edge(&rel.from, &rel.kind, &rel.to).await {
                Ok(EdgeOutcome::MissingEndpoints) => {
                    tracing::debug!(from = %rel.from, to = %rel.to, "reflection: edge endpoints missing");
                }
                Ok(EdgeOutcome::Created) => {}
                Err(MemoryError::InvalidIdentifier(id)) => {
                    tracing::warn!(relation = %id, "reflection: relationship skipped");
                }
                Err(e) => return Err(e.into()),
            }
        }

        tracing::info!(
            entities = extraction.entities.len(),
            relationships = extraction.relationships.len(),
            "episodic memory updated"
        );
        Ok(Message::system(MEMORY_UPDATED))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::ScriptedLlmClient;
    use crate::memory::{GraphQuery, InMemoryGraph, InMemorySemantic};

    fn state_with(n: usize) -> TurnState {
        let mut state = TurnState::new("sess-reflect");
        for i in 0..n {
            if i % 2 == 0 {
                state.push(Message::human(format!("question {i}")));
            } else {
                state.push(Message::agent(format!("answer {i}")));
            }
        }
        state
    }

    #[test]
    fn test_render_window_caps_at_ten() {
        let state = state_with(15);
        let rendered = render_window(state.messages());
        assert_eq!(rendered.lines().count(), 10);
        assert!(rendered.starts_with("Agent: answer 5"));
        assert!(rendered.ends_with("Human: question 14"));

        let mut small = TurnState::new("t");
        small.push(Message::system(MEMORY_UPDATED));
        assert_eq!(render_window(small.messages()), "Agent: [System] Episodic memory updated.");
    }

    #[test]
    fn test_strip_code_fence() {
        assert_eq!(strip_code_fence("```json\n{\"a\":1}\n```"), "{\"a\":1}");
        assert_eq!(strip_code_fence("```\n{\"a\":1}\n```"), "{\"a\":1}");
        assert_eq!(strip_code_fence("Sure:\n```JSON5\n{\"a\":1}\n```"), "{\"a\":1}");
        assert_eq!(strip_code_fence("  {\"a\":1} "), "{\"a\":1}");
        assert_eq!(strip_code_fence("```jsonc\n{\"a\":1}\n```"), "{\"a\":1}");
        assert_eq!(strip_code_fence("```json5\n{\"a\":1}\n```"), "{\"a\":1}");
        assert_eq!(strip_code_fence("```{\"a\":1}```"), "{\"a\":1}");
    }

    #[test]
    fn test_is_due() {
        assert!(!Reflector::is_due(&state_with(0), 5));
        assert!(Reflector::is_due(&state_with(9), 5));
        assert!(!Reflector::is_due(&state_with(7), 5));
        assert!(!Reflector::is_due(&state_with(9), 0));
    }

    #[tokio::test]
    async fn test_reflect_writes_memory_and_graph() {
        let llm = Arc::new(ScriptedLlmClient::from_texts(vec![
            "```json\n{\"summary\": \"Discussed SpiderBot crawler\", \
             \"entities\": [{\"name\": \"SpiderBot\", \"type\": \"Project\"}, {\"name\": \"Rust\", \"type\": \"Programming Language\"}], \
             \"relationships\": [{\"from\": \"SpiderBot\", \"to\": \"Rust\", \"type\": \"written_in\"}, \
             {\"from\": \"SpiderBot\", \"to\": \"Ghost\", \"type\": \"uses\"}]}\n```",
        ]));
        let semantic = Arc::new(InMemorySemantic::default());
        let graph = Arc::new(InMemoryGraph::new());
        let reflector = Reflector::new(llm.clone(), semantic.clone(), graph.clone());

        let msg = reflector.reflect(&state_with(4)).await.unwrap();
        assert_eq!(msg.role, Role::System);
        assert_eq!(msg.text(), MEMORY_UPDATED);

        assert_eq!(semantic.search("SpiderBot", 5).await.unwrap().len(), 1);
        assert_eq!(graph.node("Rust").await.unwrap().label, "Programming_Language");
        // 缺端点的边被静默跳过
        assert_eq!(graph.edge_count().await, 1);
        let rows = graph
            .query(&GraphQuery::Relationships { name: "SpiderBot".into() })
            .await
            .unwrap();
        assert_eq!(rows[0]["relation"], serde_json::json!("WRITTEN_IN"));

        let requests = llm.requests().await;
        assert!(requests[0][0].text().contains("Subconscious Memory"));
    }

    #[tokio::test]
    async fn test_reflect_skips_invalid_identifiers() {
        let llm = Arc::new(ScriptedLlmClient::from_texts(vec![
            "{\"summary\": \"Ported parser\", \
             \"entities\": [{\"name\": \"Parser\", \"type\": \"C++\"}, {\"name\": \"Lexer\", \"type\": \"Module\"}, \
             {\"name\": \"Ast\", \"type\": \"Module\"}], \
             \"relationships\": [{\"from\": \"Lexer\", \"to\": \"Ast\", \"type\": \"feeds (via tokens)\"}]}",
        ]));
        let semantic = Arc::new(InMemorySemantic::default());
        let graph = Arc::new(InMemoryGraph::new());
        let reflector = Reflector::new(llm, semantic.clone(), graph.clone());

        assert!(reflector.reflect(&state_with(2)).await.is_some());
        assert!(graph.node("Parser").await.is_none());
        assert_eq!(graph.node("Lexer").await.unwrap().label, "Module");
        assert_eq!(graph.edge_count().await, 0);
        assert_eq!(semantic.len().await, 1);
    }

    #[tokio::test]
    async fn test_reflect_accepts_any_fence_tag() {
        let llm = Arc::new(ScriptedLlmClient::from_texts(vec![
            "```jsonc\n{\"summary\": \"Chose tokio for the crawler\", \"entities\": [], \"relationships\": []}\n```",
        ]));
        let semantic = Arc::new(InMemorySemantic::default());
        let reflector = Reflector::new(llm, semantic.clone(), Arc::new(InMemoryGraph::new()));

        assert!(reflector.reflect(&state_with(2)).await.is_some());
        assert_eq!(semantic.search("tokio", 5).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_reflect_malformed_output_has_no_effect() {
        let llm = Arc::new(ScriptedLlmClient::from_texts(vec!["not json at all"]));
        let semantic = Arc::new(InMemorySemantic::default());
        let graph = Arc::new(InMemoryGraph::new());
        let reflector = Reflector::new(llm, semantic.clone(), graph.clone());
        assert!(reflector.reflect(&state_with(2)).await.is_none());
        assert!(semantic.is_empty().await);
        assert_eq!(graph.node_count().await, 0);
    }

    #[tokio::test]
    async fn test_reflect_llm_failure_is_swallowed() {
        let llm = Arc::new(ScriptedLlmClient::default());
        let reflector = Reflector::new(
            llm,
            Arc::new(InMemorySemantic::default()),
            Arc::new(InMemoryGraph::new()),
        );
        assert!(reflector.reflect(&state_with(2)).await.is_none());
    }
}
