//! Context Fusion：每条新的人类输入在路由前先检索记忆并拼接到原文之后
//!
//! 1. 用原文做语义检索
//! 2. 抽取候选实体（首字母大写的纯字母词），无候选时退化为前 50 个字符
//! 3. 每个候选各做一次节点查询与一跳关系查询
//!
//! 检索失败按空结果处理，永远不会中断本轮。

use std::sync::Arc;

use crate::memory::{render_records, render_rows, GraphMemory, GraphQuery, SemanticMemory};

/// 上下文段落之前的分隔标记
pub const CONTEXT_MARKER: &str =
    "[SYSTEM: The following context was automatically retrieved from your memory]";

const FALLBACK_CHARS: usize = 50;

/// 候选实体：按空白切分、去掉首尾 ASCII 标点，保留首字母大写的纯字母词（保序、不去重）。
/// 没有候选时返回输入前 50 个字符。
pub fn extract_keywords(text: &str) -> Vec<String> {
    let keywords: Vec<String> = text
        .split_whitespace()
        .map(|w| w.trim_matches(|c: char| c.is_ascii_punctuation()))
        .filter(|w| {
            w.chars().next().is_some_and(char::is_uppercase) && w.chars().all(char::is_alphabetic)
        })
        .map(String::from)
        .collect();

    if keywords.is_empty() {
        vec![text.chars().take(FALLBACK_CHARS).collect()]
    } else {
        keywords
    }
}

pub struct ContextFusion {
    semantic: Arc<dyn SemanticMemory>,
    graph: Arc<dyn GraphMemory>,
    search_limit: usize,
}

impl ContextFusion {
    pub fn new(
        semantic: Arc<dyn SemanticMemory>,
        graph: Arc<dyn GraphMemory>,
        search_limit: usize,
    ) -> Self {
        Self {
            semantic,
            graph,
            search_limit,
        }
    }

    async fn graph_section(&self, query: GraphQuery) -> Option<String> {
        match self.graph.query(&query).await {
            Ok(rows) if !rows.is_empty() => Some(render_rows(&rows)),
            Ok(_) => None,
            Err(e) => {
                tracing::warn!(error = %e, ?query, "graph lookup failed, treated as empty");
                None
            }
        }
    }

    /// 检索上下文；没有任何结果时返回空串
    pub async fn retrieve_context(&self, text: &str) -> String {
        let mut sections = Vec::new();

        match self.semantic.search(text, self.search_limit).await {
            Ok(records) if !records.is_empty() => {
                sections.push(format!("--- Semantic Memory ---\n{}", render_records(&records)));
            }
            Ok(_) => {}
            Err(e) => tracing::warn!(error = %e, "semantic search failed, treated as empty"),
        }

        for kw in extract_keywords(text) {
            if kw.trim().is_empty() {
                continue;
            }
            if let Some(found) = self
                .graph_section(GraphQuery::NodeByName { name: kw.clone() })
                .await
            {
                sections.push(format!("--- Knowledge Graph ({kw}) ---\n{found}"));
            }
            if let Some(found) = self
                .graph_section(GraphQuery::Relationships { name: kw.clone() })
                .await
            {
                sections.push(format!("--- Relationships ({kw}) ---\n{found}"));
            }
        }

        sections.join("\n\n")
    }

    /// 返回增强后的输入；无上下文时原样返回
    pub async fn augment(&self, text: &str) -> String {
        let context = self.retrieve_context(text).await;
        Self::attach(text, &context)
    }

    /// 把已检索的上下文拼到原文之后
    pub fn attach(text: &str, context: &str) -> String {
        if context.is_empty() {
            return text.to_string();
        }
        tracing::debug!(chars = context.len(), "context fused into input");
        format!("{text}\n\n{CONTEXT_MARKER}\n{context}")
    }
}
