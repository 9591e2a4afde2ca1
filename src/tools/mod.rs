//! 工具箱：注册表、执行器与各工具实现
//!
//! 启动时把全部工具注册进一个 ToolRegistry，再按角色切出固定子集交给各专家。

pub mod admin;
pub mod document;
pub mod executor;
pub mod filesystem;
pub mod git;
pub mod graph;
pub mod memory;
pub mod registry;
pub mod schema;
pub mod shell;

use std::path::Path;
use std::sync::Arc;

pub use admin::ReloadSystemTool;
pub use document::{ReadDocumentTool, SaveDocumentTool};
pub use executor::ToolExecutor;
pub use filesystem::{CatTool, LsTool, SafeFs, WriteFileTool};
pub use git::GitStatusTool;
pub use graph::{AddGraphEdgeTool, AddGraphNodeTool, QueryGraphTool};
pub use memory::{RecallMemoryTool, SaveMemoryTool};
pub use registry::{Tool, ToolRegistry};
pub use schema::tool_call_schema_json;
pub use shell::ShellTool;

use crate::core::{NextAgent, ReloadSignal};
use crate::memory::{DocumentStore, GraphMemory, SemanticMemory};

pub const PLANNER_TOOLS: &[&str] = &[
    "save_memory",
    "recall_memory",
    "add_graph_node",
    "add_graph_edge",
    "query_graph",
    "save_document",
    "read_document",
    "cat",
    "ls",
];

pub const CODER_TOOLS: &[&str] = &[
    "cat",
    "ls",
    "write_file",
    "shell",
    "git_status",
    "reload_system",
];

pub const REVIEWER_TOOLS: &[&str] = &[
    "cat",
    "ls",
    "shell",
    "add_graph_node",
    "add_graph_edge",
    "query_graph",
];

/// 角色对应的工具名
pub fn toolset_for(role: NextAgent) -> &'static [&'static str] {
    match role {
        NextAgent::Planner => PLANNER_TOOLS,
        NextAgent::Coder => CODER_TOOLS,
        NextAgent::Reviewer => REVIEWER_TOOLS,
        NextAgent::Finish => &[],
    }
}

/// 注册全部内置工具所需的依赖
pub struct ToolDeps<'a> {
    pub workspace: &'a Path,
    pub semantic: Arc<dyn SemanticMemory>,
    pub graph: Arc<dyn GraphMemory>,
    pub documents: Arc<dyn DocumentStore>,
    pub search_limit: usize,
    pub allowed_commands: Vec<String>,
    pub reload: ReloadSignal,
}

pub fn build_registry(deps: ToolDeps<'_>) -> ToolRegistry {
    let fs = SafeFs::new(deps.workspace);
    let mut registry = ToolRegistry::new();
    registry.register(CatTool::new(fs.clone()));
    registry.register(LsTool::new(fs.clone()));
    registry.register(WriteFileTool::new(fs.clone()));
    registry.register(GitStatusTool::new(fs));
    registry.register(ShellTool::new(deps.allowed_commands, deps.workspace));
    registry.register(SaveMemoryTool::new(deps.semantic.clone()));
    registry.register(RecallMemoryTool::new(deps.semantic, deps.search_limit));
    registry.register(AddGraphNodeTool::new(deps.graph.clone()));
    registry.register(AddGraphEdgeTool::new(deps.graph.clone()));
    registry.register(QueryGraphTool::new(deps.graph));
    registry.register(SaveDocumentTool::new(deps.documents.clone()));
    registry.register(ReadDocumentTool::new(deps.documents));
    registry.register(ReloadSystemTool::new(deps.reload));
    registry
}
