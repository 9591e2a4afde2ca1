//! Mock / Scripted LLM 客户端（无需 API）
//!
//! - MockLlmClient：按 system prompt 识别角色，给出能驱动 Planner → Coder → Reviewer → FINISH 的固定回复，
//!   便于离线跑通整条协作流程；识别到反思提示时返回一段带代码围栏的 JSON。
//! - ScriptedLlmClient：按预设顺序逐条返回，并记录每次收到的消息，供测试断言。

use std::collections::VecDeque;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::llm::{LlmClient, LlmError};
use crate::memory::{Message, Role};

#[derive(Debug, Default)]
pub struct MockLlmClient;

impl MockLlmClient {
    fn reply_for(messages: &[Message]) -> String {
        let system = messages
            .iter()
            .find(|m| m.role == Role::System)
            .map(|m| m.text())
            .unwrap_or_default();
        let last_human = messages
            .iter()
            .rev()
            .find(|m| m.is_human())
            .map(|m| m.text())
            .unwrap_or_else(|| "(no input)".to_string());

        if last_human.contains("Subconscious Memory") {
            return "```json\n{\"summary\": \"Mock session: the team planned, implemented and approved a request.\", \"entities\": [], \"relationships\": []}\n```".to_string();
        }
        if system.contains("You are the Planner Agent") {
            "Here is the plan, step by step: 1. Clarify the goal. 2. Write the change. 3. Verify it.".to_string()
        } else if system.contains("You are the Coder Agent") {
            "I have implemented the code following the plan.".to_string()
        } else if system.contains("You are the Reviewer Agent") {
            "Review complete: everything looks good, approved.".to_string()
        } else {
            format!("Echo from Mock: {}", last_human)
        }
    }
}

#[async_trait]
impl LlmClient for MockLlmClient {
    async fn complete(&self, messages: &[Message]) -> Result<Message, LlmError> {
        Ok(Message::agent(Self::reply_for(messages)))
    }
}

/// 预设回复队列；队列耗尽后返回 EmptyResponse
#[derive(Debug, Default)]
pub struct ScriptedLlmClient {
    replies: Mutex<VecDeque<Result<Message, LlmError>>>,
    requests: Mutex<Vec<Vec<Message>>>,
}

impl ScriptedLlmClient {
    pub fn new<I>(replies: I) -> Self
    where
        I: IntoIterator<Item = Result<Message, LlmError>>,
    {
        Self {
            replies: Mutex::new(replies.into_iter().collect()),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// 便捷构造：全部为成功的纯文本回复
    pub fn from_texts<I, S>(texts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(texts.into_iter().map(|t| Ok(Message::agent(t.into()))))
    }

    /// 每次 complete 收到的完整消息序列
    pub async fn requests(&self) -> Vec<Vec<Message>> {
        self.requests.lock().await.clone()
    }

    pub async fn remaining(&self) -> usize {
        self.replies.lock().await.len()
    }
}

#[async_trait]
impl LlmClient for ScriptedLlmClient {
    async fn complete(&self, messages: &[Message]) -> Result<Message, LlmError> {
        self.requests.lock().await.push(messages.to_vec());
        self.replies
            .lock()
            .await
            .pop_front()
            .unwrap_or(Err(LlmError::EmptyResponse))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_replies_by_role() {
        let mock = MockLlmClient;
        let planner = vec![
            Message::system("You are the Planner Agent."),
            Message::human("build a CLI"),
        ];
        let reply = mock.complete(&planner).await.unwrap();
        assert!(reply.text().contains("plan"));

        let reviewer = vec![Message::system("You are the Reviewer Agent.")];
        let reply = mock.complete(&reviewer).await.unwrap();
        assert!(reply.text().contains("approved"));
    }

    #[tokio::test]
    async fn test_scripted_in_order_then_exhausted() {
        let scripted = ScriptedLlmClient::from_texts(["first", "second"]);
        let msgs = vec![Message::human("hi")];
        assert_eq!(scripted.complete(&msgs).await.unwrap().text(), "first");
        assert_eq!(scripted.complete(&msgs).await.unwrap().text(), "second");
        assert!(matches!(
            scripted.complete(&msgs).await,
            Err(LlmError::EmptyResponse)
        ));
        assert_eq!(scripted.requests().await.len(), 3);
    }
}
