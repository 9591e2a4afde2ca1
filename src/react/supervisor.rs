//! Supervisor：根据最新一条消息决定下一位专家
//!
//! 纯函数，只看最后一条消息的角色与渲染文本（thinking 等非文本块已丢弃），按顺序匹配：
//!
//! 1. 人类消息 -> Planner
//! 2. 含 "plan" 且不含 "approved"/"implement" -> Coder
//! 3. 含 "implemented" 或 "code" -> Reviewer
//! 4. 含 "issue" 或 "bug" -> Coder
//! 5. 其余（含 "approved"/"finish"）-> Finish

use crate::core::{NextAgent, TurnState};
use crate::memory::{Message, Role};

/// 按角色与渲染文本路由
pub fn route_text(role: Role, text: &str) -> NextAgent {
    if role == Role::Human {
        return NextAgent::Planner;
    }
    let text = text.to_lowercase();
    let has = |needle: &str| text.contains(needle);

    if has("plan") && !has("approved") && !has("implement") {
        NextAgent::Coder
    } else if has("implemented") || has("code") {
        NextAgent::Reviewer
    } else if has("issue") || has("bug") {
        NextAgent::Coder
    } else {
        // "approved" / "finish" 与无法识别的文本都结束本轮
        NextAgent::Finish
    }
}

pub fn route_message(msg: &Message) -> NextAgent {
    route_text(msg.role, &msg.text())
}

/// 路由整个状态：空状态直接结束
pub fn route(state: &TurnState) -> NextAgent {
    let next = state.last().map(route_message).unwrap_or(NextAgent::Finish);
    tracing::info!(thread_id = %state.thread_id(), next = %next, "supervisor routed");
    next
}
