//! 团队循环：Supervisor 与专家交替，直到路由到 Finish
//!
//! Supervisor 是每个专家之后的必经点；单轮专家调用次数超过 max_cycle_steps 时以
//! StepLimitExceeded 失败（不可重试），防止 Coder 与 Reviewer 之间无限往返。

use std::collections::HashMap;
use std::sync::Arc;

use crate::core::{AgentError, NextAgent, TurnState};
use crate::react::agent::Specialist;
use crate::react::events::{send_event, EventSender, TeamEvent};
use crate::react::supervisor::route;

pub struct Team {
    agents: HashMap<NextAgent, Arc<dyn Specialist>>,
    max_cycle_steps: usize,
}

impl Team {
    pub fn new(max_cycle_steps: usize) -> Self {
        Self {
            agents: HashMap::new(),
            max_cycle_steps,
        }
    }

    pub fn with_agent(mut self, agent: Arc<dyn Specialist>) -> Self {
        self.agents.insert(agent.role(), agent);
        self
    }

    /// 跑一个完整循环；返回本循环调用专家的次数
    pub async fn run_cycle(
        &self,
        state: &mut TurnState,
        events: Option<&EventSender>,
    ) -> Result<usize, AgentError> {
        let mut invocations = 0usize;
        loop {
            let next = route(state);
            state.next_agent = Some(next);
            send_event(
                events,
                TeamEvent::Routed {
                    next: next.to_string(),
                },
            );
            if next.is_finish() {
                return Ok(invocations);
            }
            if invocations >= self.max_cycle_steps {
                return Err(AgentError::StepLimitExceeded(invocations));
            }
            let agent = self.agents.get(&next).ok_or_else(|| {
                AgentError::ConfigError(format!("no specialist registered for {next}"))
            })?;

            let msg = agent.invoke(state, events).await?;
            invocations += 1;
            send_event(
                events,
                TeamEvent::AgentMessage {
                    agent: next.to_string(),
                    text: msg.text(),
                },
            );
            state.push(msg);
        }
    }
}
