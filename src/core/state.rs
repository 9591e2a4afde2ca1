//! 轮次状态：TurnState（持久化与并发的基本单位）与路由决策 NextAgent
//!
//! messages 只能追加：字段私有，唯一的修改入口是 push，保证线程生命周期内单调增长、不重排、不删除。

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::memory::Message;

/// Supervisor 的路由决策
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NextAgent {
    Planner,
    Coder,
    Reviewer,
    Finish,
}

impl NextAgent {
    pub fn as_str(&self) -> &'static str {
        match self {
            NextAgent::Planner => "Planner",
            NextAgent::Coder => "Coder",
            NextAgent::Reviewer => "Reviewer",
            NextAgent::Finish => "FINISH",
        }
    }

    pub fn is_finish(&self) -> bool {
        matches!(self, NextAgent::Finish)
    }
}

impl fmt::Display for NextAgent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 一个会话线程的完整状态：有序消息日志 + 路由元数据
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TurnState {
    thread_id: String,
    messages: Vec<Message>,
    /// 仅在当前循环内有意义，持久化后不具语义
    #[serde(default)]
    pub next_agent: Option<NextAgent>,
}

impl TurnState {
    pub fn new(thread_id: impl Into<String>) -> Self {
        Self {
            thread_id: thread_id.into(),
            messages: Vec::new(),
            next_agent: None,
        }
    }

    pub fn thread_id(&self) -> &str {
        &self.thread_id
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    pub fn push(&mut self, msg: Message) {
        self.messages.push(msg);
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// 已完成的人类回合数（用于反思触发间隔）
    pub fn human_turns(&self) -> usize {
        self.messages.iter().filter(|m| m.is_human()).count()
    }

    /// self 是否为 earlier 的追加扩展（earlier 的消息是 self 的前缀）
    pub fn extends(&self, earlier: &TurnState) -> bool {
        self.thread_id == earlier.thread_id
            && self.messages.len() >= earlier.messages.len()
            && self.messages[..earlier.messages.len()] == earlier.messages[..]
    }
}
