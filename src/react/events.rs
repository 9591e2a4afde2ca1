//! 协作过程事件：供 REPL（或其它前端）实时展示路由、专家回复、工具调用与记忆更新

use serde::Serialize;
use tokio::sync::mpsc::UnboundedSender;

/// 事件发送端；未订阅时传 None
pub type EventSender = UnboundedSender<TeamEvent>;

/// 预览截断长度
pub const PREVIEW_CHARS: usize = 300;

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TeamEvent {
    /// 本轮开始（含 trace_id）
    TurnStarted { thread_id: String, trace_id: String },
    /// 自动检索到的上下文（预览）
    ContextRetrieved { preview: String },
    /// Supervisor 路由结果
    Routed { next: String },
    /// 专家的最终回复（thinking 已丢弃）
    AgentMessage { agent: String, text: String },
    ToolCall {
        agent: String,
        tool: String,
        args: serde_json::Value,
    },
    Observation {
        agent: String,
        tool: String,
        preview: String,
    },
    /// 反思写入了长期记忆
    MemoryUpdated,
    /// 整轮重试
    Retrying { attempt: u32, error: String },
    TurnFinished { messages: usize },
    Error { text: String },
}

pub fn send_event(tx: Option<&EventSender>, ev: TeamEvent) {
    if let Some(tx) = tx {
        let _ = tx.send(ev);
    }
}

/// 按字符截断并追加省略号
pub fn preview(text: &str) -> String {
    if text.chars().count() > PREVIEW_CHARS {
        format!("{}...", text.chars().take(PREVIEW_CHARS).collect::<String>())
    } else {
        text.to_string()
    }
}
