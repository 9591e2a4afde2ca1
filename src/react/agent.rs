//! 专家智能体：Planner / Coder / Reviewer
//!
//! 每个专家是一个有步数上限的 ReAct 小循环：带角色 prompt 与固定工具子集调用 LLM，
//! 回复为工具调用则执行并把结果作为 observation 追加到草稿区，否则作为最终回复返回。
//! 草稿区（工具调用与 observation）只在本次调用内存在，不会写入 TurnState。
//! LLM 失败直接上抛，由整轮重试处理；工具失败与越权调用只变成 `Error: …` observation。

use std::sync::Arc;

use async_trait::async_trait;

use crate::core::{AgentError, NextAgent, TurnState};
use crate::llm::LlmClient;
use crate::memory::Message;
use crate::react::events::{preview, send_event, EventSender, TeamEvent};
use crate::react::parser::{parse_llm_output, AgentOutput};
use crate::tools::{tool_call_schema_json, ToolExecutor};

const PLANNER_PROMPT: &str = "You are the Planner Agent. Your job is to break down complex user requests into \
detailed, step-by-step technical implementation plans. \
You have access to Deep Memory: semantic memory (save_memory / recall_memory) for facts and context, \
and a knowledge graph (add_graph_node / add_graph_edge / query_graph) for dependencies and architecture. \
Store finished plans and specs as documents (save_document / read_document). \
Check the knowledge graph for existing context before starting a new plan. \
Output a clear plan that the Coder Agent can follow.";

const CODER_PROMPT: &str = "You are the Coder Agent. Your job is to implement code based on the plan provided. \
You can read and write files in the workspace, run allowlisted shell commands and check git_status. \
Write clean, efficient, and documented code. After implementing, verify your work \
and state that the code is implemented.";

const REVIEWER_PROMPT: &str = "You are the Reviewer Agent. Your job is to review the code written by the Coder Agent. \
Check for bugs, security vulnerabilities, and adherence to the plan. \
Verify that the architecture matches the knowledge graph definitions if applicable. \
If you find issues, describe each issue specifically for the Coder. \
If everything looks good, approve the changes.";

/// 角色的基础 system prompt
pub fn role_prompt(role: NextAgent) -> &'static str {
    match role {
        NextAgent::Planner => PLANNER_PROMPT,
        NextAgent::Coder => CODER_PROMPT,
        NextAgent::Reviewer => REVIEWER_PROMPT,
        NextAgent::Finish => "",
    }
}

/// 专家接口：读取完整状态，返回恰好一条新消息
#[async_trait]
pub trait Specialist: Send + Sync {
    fn role(&self) -> NextAgent;

    async fn invoke(
        &self,
        state: &TurnState,
        events: Option<&EventSender>,
    ) -> Result<Message, AgentError>;
}

pub struct SpecialistAgent {
    role: NextAgent,
    llm: Arc<dyn LlmClient>,
    executor: ToolExecutor,
    system_prompt: String,
    max_steps: usize,
}

impl SpecialistAgent {
    pub fn new(
        role: NextAgent,
        llm: Arc<dyn LlmClient>,
        executor: ToolExecutor,
        max_steps: usize,
    ) -> Self {
        let system_prompt = build_system_prompt(role_prompt(role), &executor);
        Self {
            role,
            llm,
            executor,
            system_prompt,
            max_steps: max_steps.max(1),
        }
    }

    pub fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    /// 执行一次工具调用，任何失败都转成 observation 文本
    async fn observe(&self, tool: &str, args: serde_json::Value) -> String {
        if !self.executor.can_run(tool) {
            return format!(
                "Error: tool '{}' is not available to {}. Available tools: {}",
                tool,
                self.role,
                self.executor.registry().tool_names().join(", ")
            );
        }
        match self.executor.execute(self.role.as_str(), tool, args).await {
            Ok(out) => out,
            Err(e) => format!("Error: {e}"),
        }
    }

    fn finalize(&self, reply: Message) -> Message {
        Message::agent(reply.content).with_name(self.role.as_str())
    }
}

fn build_system_prompt(base: &str, executor: &ToolExecutor) -> String {
    let registry = executor.registry();
    if registry.is_empty() {
        return base.to_string();
    }
    format!(
        "{base}\n\n## Tools\n{}\n\nTo call a tool, reply with ONLY a JSON object matching this schema:\n{}\n\
Example: {{\"tool\": \"ls\", \"args\": {{\"path\": \".\"}}}}\n\
When you are done, reply in plain text without any tool call.",
        registry.describe(),
        tool_call_schema_json()
    )
}

#[async_trait]
impl Specialist for SpecialistAgent {
    fn role(&self) -> NextAgent {
        self.role
    }

    async fn invoke(
        &self,
        state: &TurnState,
        events: Option<&EventSender>,
    ) -> Result<Message, AgentError> {
        let agent = self.role.as_str();
        let mut scratch: Vec<Message> = Vec::new();
        let mut last_reply: Option<Message> = None;

        for step in 0..self.max_steps {
            let mut request = Vec::with_capacity(state.len() + scratch.len() + 1);
            request.push(Message::system(self.system_prompt.clone()));
            request.extend(state.messages().iter().cloned());
            request.extend(scratch.iter().cloned());

            let reply = self.llm.complete(&request).await?;
            let text = reply.text();
            tracing::debug!(agent, step, reply = %preview(&text), "specialist step");

            match parse_llm_output(&text) {
                Ok(AgentOutput::Final) => return Ok(self.finalize(reply)),
                Ok(AgentOutput::ToolCall(call)) => {
                    send_event(
                        events,
                        TeamEvent::ToolCall {
                            agent: agent.to_string(),
                            tool: call.name.clone(),
                            args: call.args.clone(),
                        },
                    );
                    let observation = self.observe(&call.name, call.args.clone()).await;
                    send_event(
                        events,
                        TeamEvent::Observation {
                            agent: agent.to_string(),
                            tool: call.name.clone(),
                            preview: preview(&observation),
                        },
                    );
                    let tool = call.name.clone();
                    scratch.push(reply.clone().with_tool_calls(vec![call]));
                    scratch.push(Message::human(format!(
                        "Observation from {tool}:\n{observation}"
                    )));
                }
                Err(e) => {
                    tracing::warn!(agent, step, error = %e, "malformed tool call");
                    scratch.push(reply.clone());
                    scratch.push(Message::human(format!(
                        "Error: {e}\nReply with a single valid JSON tool call, or answer in plain text."
                    )));
                }
            }
            last_reply = Some(reply);
        }

        tracing::warn!(agent, max_steps = self.max_steps, "step budget exhausted, using last reply");
        last_reply
            .map(|r| self.finalize(r))
            .ok_or_else(|| AgentError::StepLimitExceeded(self.max_steps))
    }
}
