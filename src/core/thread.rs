//! 会话线程标识
//!
//! thread_id 由 项目 ID + 智能体 ID + 工作目录 内容寻址得出：同一目录下重复运行会收敛到同一线程
//! （可跨重启恢复），不同目录下的并发实例互不干扰。显式配置 session_id 时直接使用。

use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};

use crate::config::AppConfig;

const DEFAULT_AGENT_ID: &str = "default-agent";

/// 线程标识的三个输入与可选覆盖
#[derive(Debug, Clone)]
pub struct ThreadIdentity {
    pub project_id: String,
    pub agent_id: String,
    pub working_dir: PathBuf,
    pub session_override: Option<String>,
}

fn sha256_hex(input: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    hex::encode(hasher.finalize())
}

/// 未配置项目 ID 时，按工作目录哈希得到稳定的项目 ID：proj-xxxxxxxx
pub fn project_id_for(working_dir: &Path) -> String {
    let hash = sha256_hex(&working_dir.display().to_string());
    format!("proj-{}", &hash[..8])
}

impl ThreadIdentity {
    pub fn new(project_id: impl Into<String>, agent_id: impl Into<String>, working_dir: impl Into<PathBuf>) -> Self {
        Self {
            project_id: project_id.into(),
            agent_id: agent_id.into(),
            working_dir: working_dir.into(),
            session_override: None,
        }
    }

    /// 从配置与工作目录构建：[app] project_id / agent_id / session_id 均可选
    pub fn from_config(cfg: &AppConfig, working_dir: &Path) -> Self {
        let project_id = cfg
            .app
            .project_id
            .clone()
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| project_id_for(working_dir));
        let agent_id = cfg
            .app
            .agent_id
            .clone()
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_AGENT_ID.to_string());
        Self {
            project_id,
            agent_id,
            working_dir: working_dir.to_path_buf(),
            session_override: cfg.app.session_id.clone().filter(|s| !s.trim().is_empty()),
        }
    }

    pub fn with_override(mut self, session_id: impl Into<String>) -> Self {
        self.session_override = Some(session_id.into());
        self
    }

    /// 线程 ID：sess- + SHA-256(project-agent-cwd) 前 12 位十六进制
    pub fn thread_id(&self) -> String {
        if let Some(ref id) = self.session_override {
            return id.clone();
        }
        let key = format!(
            "{}-{}-{}",
            self.project_id,
            self.agent_id,
            self.working_dir.display()
        );
        format!("sess-{}", &sha256_hex(&key)[..12])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_thread_id_is_stable() {
        let a = ThreadIdentity::new("proj-1", "agent", "/work/a");
        let b = ThreadIdentity::new("proj-1", "agent", "/work/a");
        assert_eq!(a.thread_id(), b.thread_id());
        assert!(a.thread_id().starts_with("sess-"));
        assert_eq!(a.thread_id().len(), "sess-".len() + 12);
    }

    #[test]
    fn test_thread_id_differs_per_directory_and_agent() {
        let a = ThreadIdentity::new("proj-1", "agent", "/work/a");
        let b = ThreadIdentity::new("proj-1", "agent", "/work/b");
        let c = ThreadIdentity::new("proj-1", "other-agent", "/work/a");
        assert_ne!(a.thread_id(), b.thread_id());
        assert_ne!(a.thread_id(), c.thread_id());
    }

    #[test]
    fn test_override_wins() {
        let id = ThreadIdentity::new("p", "a", "/w").with_override("sess-fixed");
        assert_eq!(id.thread_id(), "sess-fixed");
    }

    #[test]
    fn test_from_config_defaults() {
        let cfg = AppConfig::default();
        let id = ThreadIdentity::from_config(&cfg, Path::new("/srv/project"));
        assert_eq!(id.agent_id, DEFAULT_AGENT_ID);
        assert_eq!(id.project_id, project_id_for(Path::new("/srv/project")));
        assert!(id.project_id.starts_with("proj-"));
        assert!(id.session_override.is_none());
    }
}
