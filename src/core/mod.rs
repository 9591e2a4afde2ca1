//! 核心编排层：错误与恢复、轮次状态、线程标识、会话监管、线程租约、轮次编排与运行时装配

pub mod builder;
pub mod error;
pub mod orchestrator;
pub mod recovery;
pub mod session_supervisor;
pub mod state;
pub mod task_scheduler;
pub mod thread;

pub use builder::{resolve_workspace, TeamBuilder, TeamRuntime};
pub use error::{AgentError, CheckpointError, MemoryError, RecoveryAction};
pub use orchestrator::{TurnOutcome, TurnRunner};
pub use recovery::{RecoveryEngine, RetryPolicy};
pub use session_supervisor::{ReloadSignal, SessionSupervisor};
pub use state::{NextAgent, TurnState};
pub use task_scheduler::{ThreadLease, ThreadLeases};
pub use thread::{project_id_for, ThreadIdentity};
