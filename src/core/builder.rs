//! 运行时构建器：REPL 与测试共用同一套装配逻辑
//!
//! 一次构建产出一个 TeamRuntime：LLM、语义/图/文档三种记忆、检查点存储、完整工具注册表、
//! 三个专家（各自的工具子集）、团队循环与轮次编排器。重载时整体重建。

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crate::config::AppConfig;
use crate::core::{AgentError, NextAgent, ReloadSignal, RetryPolicy, TurnRunner};
use crate::llm::{create_llm_from_config, LlmClient};
use crate::memory::{
    create_checkpoint_store, create_document_store_from_config, create_graph_from_config,
    create_semantic_from_config, CheckpointStore, DocumentStore, GraphMemory, SemanticMemory,
};
use crate::react::{ContextFusion, Reflector, SpecialistAgent, Team};
use crate::tools::{build_registry, toolset_for, ToolDeps, ToolExecutor};

/// 工作目录：配置 > 当前目录下的 workspace；不存在则创建
pub fn resolve_workspace(cfg: &AppConfig) -> Result<PathBuf, AgentError> {
    let workspace = match cfg.app.workspace_root.clone() {
        Some(p) => p,
        None => std::env::current_dir()
            .map_err(|e| AgentError::ConfigError(format!("cannot read current dir: {e}")))?
            .join("workspace"),
    };
    std::fs::create_dir_all(&workspace).map_err(|e| {
        AgentError::ConfigError(format!("cannot create workspace {}: {e}", workspace.display()))
    })?;
    Ok(workspace.canonicalize().unwrap_or(workspace))
}

/// 构建完成的运行时
pub struct TeamRuntime {
    pub runner: TurnRunner,
    pub workspace: PathBuf,
    pub semantic: Arc<dyn SemanticMemory>,
    pub graph: Arc<dyn GraphMemory>,
    pub documents: Arc<dyn DocumentStore>,
}

pub struct TeamBuilder {
    config: AppConfig,
    workspace: PathBuf,
    reload: ReloadSignal,
    llm: Option<Arc<dyn LlmClient>>,
    checkpoints: Option<Arc<dyn CheckpointStore>>,
}

impl TeamBuilder {
    pub fn new(config: AppConfig, workspace: impl Into<PathBuf>, reload: ReloadSignal) -> Self {
        Self {
            config,
            workspace: workspace.into(),
            reload,
            llm: None,
            checkpoints: None,
        }
    }

    /// 覆盖按配置选择的 LLM（测试用 Scripted / Mock）
    pub fn with_llm(mut self, llm: Arc<dyn LlmClient>) -> Self {
        self.llm = Some(llm);
        self
    }

    pub fn with_checkpoints(mut self, store: Arc<dyn CheckpointStore>) -> Self {
        self.checkpoints = Some(store);
        self
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn workspace(&self) -> &Path {
        &self.workspace
    }

    pub async fn build(self) -> Result<TeamRuntime, AgentError> {
        let cfg = &self.config;
        let llm = self
            .llm
            .clone()
            .unwrap_or_else(|| create_llm_from_config(cfg));
        let semantic = create_semantic_from_config(cfg)?;
        let graph = create_graph_from_config(cfg)?;
        let documents = create_document_store_from_config(cfg)?;
        let checkpoints = match self.checkpoints.clone() {
            Some(store) => store,
            None => create_checkpoint_store(cfg).await?,
        };

        let registry = build_registry(ToolDeps {
            workspace: &self.workspace,
            semantic: semantic.clone(),
            graph: graph.clone(),
            documents: documents.clone(),
            search_limit: cfg.memory.search_limit,
            allowed_commands: cfg.tools.shell.allowed_commands.clone(),
            reload: self.reload.clone(),
        });

        let mut team = Team::new(cfg.team.max_cycle_steps);
        for role in [NextAgent::Planner, NextAgent::Coder, NextAgent::Reviewer] {
            let tools = registry.subset(toolset_for(role));
            tracing::debug!(agent = %role, tools = ?tools.tool_names(), "specialist toolset");
            let executor = ToolExecutor::new(tools, cfg.tools.tool_timeout_secs);
            team = team.with_agent(Arc::new(SpecialistAgent::new(
                role,
                llm.clone(),
                executor,
                cfg.team.max_agent_steps,
            )));
        }

        let fusion = ContextFusion::new(semantic.clone(), graph.clone(), cfg.memory.search_limit);
        let reflector = Reflector::new(llm, semantic.clone(), graph.clone());
        let runner = TurnRunner::new(team, fusion, reflector, checkpoints)
            .with_policy(RetryPolicy::new(
                cfg.team.max_turn_attempts,
                Duration::from_millis(cfg.team.retry_backoff_ms),
            ))
            .with_reflection_interval(cfg.memory.reflection_interval);

        tracing::info!(
            workspace = %self.workspace.display(),
            tools = registry.len(),
            "team runtime ready"
        );
        Ok(TeamRuntime {
            runner,
            workspace: self.workspace,
            semantic,
            graph,
            documents,
        })
    }
}
