//! 轮次编排器：一次人类输入的完整生命周期
//!
//! 顺序：获取线程租约 → 上下文融合（每轮一次，重试复用）→ 读检查点 → 追加人类消息 →
//! 团队循环 → 按间隔反思 → 写回检查点。任一步失败交给 RecoveryEngine 决定整轮重试或上抛；
//! 失败的尝试不落盘，线程停留在上一个检查点。

use std::sync::Arc;

use tracing::Instrument;

use crate::core::{AgentError, RecoveryAction, RecoveryEngine, RetryPolicy, ThreadLeases, TurnState};
use crate::memory::{CheckpointStore, Message};
use crate::react::{preview, send_event, ContextFusion, EventSender, Reflector, Team, TeamEvent};

/// 一轮成功后的结果
#[derive(Debug, Clone)]
pub struct TurnOutcome {
    pub state: TurnState,
    /// 本轮新增的消息数（人类消息 + 专家回复 + 可选的记忆更新）
    pub appended: usize,
    pub attempts: u32,
    pub reflected: bool,
}

impl TurnOutcome {
    /// 本轮新增的消息
    pub fn new_messages(&self) -> &[Message] {
        let msgs = self.state.messages();
        &msgs[msgs.len() - self.appended..]
    }
}

pub struct TurnRunner {
    team: Team,
    fusion: ContextFusion,
    reflector: Reflector,
    checkpoints: Arc<dyn CheckpointStore>,
    leases: ThreadLeases,
    recovery: RecoveryEngine,
    policy: RetryPolicy,
    reflection_interval: usize,
}

impl TurnRunner {
    pub fn new(
        team: Team,
        fusion: ContextFusion,
        reflector: Reflector,
        checkpoints: Arc<dyn CheckpointStore>,
    ) -> Self {
        Self {
            team,
            fusion,
            reflector,
            checkpoints,
            leases: ThreadLeases::new(),
            recovery: RecoveryEngine::new(),
            policy: RetryPolicy::default(),
            reflection_interval: 0,
        }
    }

    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// 每 n 个人类回合反思一次；0 关闭
    pub fn with_reflection_interval(mut self, interval: usize) -> Self {
        self.reflection_interval = interval;
        self
    }

    pub fn checkpoints(&self) -> &Arc<dyn CheckpointStore> {
        &self.checkpoints
    }

    /// 处理一条人类输入
    pub async fn run_turn(
        &self,
        thread_id: &str,
        input: &str,
        events: Option<&EventSender>,
    ) -> Result<TurnOutcome, AgentError> {
        let trace_id = uuid::Uuid::new_v4().to_string();
        let span = tracing::info_span!("turn", thread_id = %thread_id, trace_id = %trace_id);
        async move {
            send_event(
                events,
                TeamEvent::TurnStarted {
                    thread_id: thread_id.to_string(),
                    trace_id: trace_id.clone(),
                },
            );
            let _lease = self.leases.acquire(thread_id).await;

            let context = self.fusion.retrieve_context(input).await;
            let augmented = if context.is_empty() {
                input.to_string()
            } else {
                send_event(
                    events,
                    TeamEvent::ContextRetrieved {
                        preview: preview(&context),
                    },
                );
                ContextFusion::attach(input, &context)
            };

            let mut attempt = 0u32;
            loop {
                attempt += 1;
                match self.attempt(thread_id, &augmented, events).await {
                    Ok((state, appended, reflected)) => {
                        tracing::info!(attempt, messages = state.len(), "turn finished");
                        send_event(
                            events,
                            TeamEvent::TurnFinished {
                                messages: state.len(),
                            },
                        );
                        return Ok(TurnOutcome {
                            state,
                            appended,
                            attempts: attempt,
                            reflected,
                        });
                    }
                    Err(e) => {
                        let action = self.recovery.handle(&e);
                        if action == RecoveryAction::RetryTurn && self.policy.should_retry(attempt) {
                            tracing::warn!(attempt, error = %e, "turn failed, retrying");
                            send_event(
                                events,
                                TeamEvent::Retrying {
                                    attempt,
                                    error: e.to_string(),
                                },
                            );
                            tokio::time::sleep(self.policy.backoff).await;
                            continue;
                        }
                        tracing::error!(attempt, error = %e, "turn failed");
                        send_event(events, TeamEvent::Error { text: e.to_string() });
                        return Err(match action {
                            RecoveryAction::RetryTurn => AgentError::RetriesExhausted {
                                attempts: attempt,
                                last: Box::new(e),
                            },
                            RecoveryAction::Surface => e,
                        });
                    }
                }
            }
        }
        .instrument(span)
        .await
    }

    /// 单次尝试：从检查点重新开始，成功才写回
    async fn attempt(
        &self,
        thread_id: &str,
        augmented: &str,
        events: Option<&EventSender>,
    ) -> Result<(TurnState, usize, bool), AgentError> {
        let mut state = self
            .checkpoints
            .get(thread_id)
            .await?
            .unwrap_or_else(|| TurnState::new(thread_id));
        let before = state.len();
        state.push(Message::human(augmented));

        self.team.run_cycle(&mut state, events).await?;

        let mut reflected = false;
        if Reflector::is_due(&state, self.reflection_interval) {
            if let Some(msg) = self.reflector.reflect(&state).await {
                state.push(msg);
                reflected = true;
                send_event(events, TeamEvent::MemoryUpdated);
            }
        }

        self.checkpoints.put(&state).await?;
        let appended = state.len() - before;
        Ok((state, appended, reflected))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::NextAgent;
    use crate::llm::{LlmError, MockLlmClient, ScriptedLlmClient};
    use crate::memory::{InMemoryCheckpointStore, InMemoryGraph, InMemorySemantic, Role, SemanticMemory};
    use crate::react::{SpecialistAgent, CONTEXT_MARKER};
    use crate::tools::{ToolExecutor, ToolRegistry};
    use std::time::Duration;

    fn team_with(llm: Arc<dyn crate::llm::LlmClient>) -> Team {
        let mut team = Team::new(20);
        for role in [NextAgent::Planner, NextAgent::Coder, NextAgent::Reviewer] {
            team = team.with_agent(Arc::new(SpecialistAgent::new(
                role,
                llm.clone(),
                ToolExecutor::new(ToolRegistry::new(), 5),
                3,
            )));
        }
        team
    }

    fn runner(llm: Arc<dyn crate::llm::LlmClient>, semantic: Arc<InMemorySemantic>) -> TurnRunner {
        let graph = Arc::new(InMemoryGraph::new());
        TurnRunner::new(
            team_with(llm.clone()),
            ContextFusion::new(semantic.clone(), graph.clone(), 5),
            Reflector::new(llm, semantic, graph),
            Arc::new(InMemoryCheckpointStore::new()),
        )
        .with_policy(RetryPolicy::new(3, Duration::ZERO))
    }

    #[tokio::test]
    async fn test_turn_runs_full_team_and_checkpoints() {
        let runner = runner(Arc::new(MockLlmClient), Arc::new(InMemorySemantic::default()));
        let outcome = runner.run_turn("sess-o1", "Write a hello world", None).await.unwrap();

        assert_eq!(outcome.attempts, 1);
        assert_eq!(outcome.appended, 4);
        let names: Vec<_> = outcome.new_messages()[1..]
            .iter()
            .filter_map(|m| m.name.clone())
            .collect();
        assert_eq!(names, vec!["Planner", "Coder", "Reviewer"]);

        let saved = runner.checkpoints().get("sess-o1").await.unwrap().unwrap();
        assert_eq!(saved, outcome.state);
    }

    #[tokio::test]
    async fn test_input_is_augmented_with_context() {
        let semantic = Arc::new(InMemorySemantic::default());
        semantic.write("The deploy target is Kubernetes").await.unwrap();
        let runner = runner(Arc::new(MockLlmClient), semantic);
        let outcome = runner
            .run_turn("sess-o2", "Where do we deploy Kubernetes jobs?", None)
            .await
            .unwrap();
        let human = &outcome.state.messages()[0];
        assert_eq!(human.role, Role::Human);
        assert!(human.text().contains(CONTEXT_MARKER));
        assert!(human.text().contains("The deploy target is Kubernetes"));
    }

    #[tokio::test]
    async fn test_llm_failure_is_retried_from_checkpoint() {
        let llm = Arc::new(ScriptedLlmClient::new([
            Ok(Message::agent("Here is the plan")),
            Err(LlmError::Request("connection reset".into())),
            Ok(Message::agent("Here is the plan")),
            Ok(Message::agent("I have implemented the code")),
            Ok(Message::agent("approved")),
        ]));
        let runner = runner(llm, Arc::new(InMemorySemantic::default()));
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        let outcome = runner.run_turn("sess-o3", "go", Some(&tx)).await.unwrap();

        assert_eq!(outcome.attempts, 2);
        // 失败尝试里的 Planner 回复没有留下
        assert_eq!(outcome.state.len(), 4);
        drop(tx);
        let mut retried = false;
        while let Some(ev) = rx.recv().await {
            if matches!(ev, TeamEvent::Retrying { attempt: 1, .. }) {
                retried = true;
            }
        }
        assert!(retried);
    }

    #[tokio::test]
    async fn test_retries_exhausted_keeps_last_checkpoint() {
        let llm = Arc::new(ScriptedLlmClient::default());
        let runner = runner(llm, Arc::new(InMemorySemantic::default()));
        let err = runner.run_turn("sess-o4", "go", None).await.unwrap_err();
        assert!(matches!(err, AgentError::RetriesExhausted { attempts: 3, .. }));
        assert!(runner.checkpoints().get("sess-o4").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_reflection_at_interval() {
        let runner = runner(Arc::new(MockLlmClient), Arc::new(InMemorySemantic::default()))
            .with_reflection_interval(2);
        let first = runner.run_turn("sess-o5", "one", None).await.unwrap();
        assert!(!first.reflected);
        let second = runner.run_turn("sess-o5", "two", None).await.unwrap();
        assert!(second.reflected);
        let last = second.state.last().unwrap();
        assert_eq!(last.role, Role::System);
        assert!(second.state.extends(&first.state));
    }
}
