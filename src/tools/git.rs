//! git_status：在工作区内查看仓库状态
//!
//! 直接调用 git 可执行文件（不经 shell），仓库路径经 SafeFs 解析，不能指向工作区之外。

use async_trait::async_trait;
use serde_json::Value;
use tokio::process::Command;

use crate::tools::{SafeFs, Tool};

pub struct GitStatusTool {
    fs: SafeFs,
}

impl GitStatusTool {
    pub fn new(fs: SafeFs) -> Self {
        Self { fs }
    }
}

#[async_trait]
impl Tool for GitStatusTool {
    fn name(&self) -> &str {
        "git_status"
    }

    fn description(&self) -> &str {
        "Show git status of a repository inside the workspace. Args: {\"repo_path\": \".\"}"
    }

    fn parameters_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "repo_path": { "type": "string", "description": "Repository path relative to the workspace (default \".\")" }
            }
        })
    }

    async fn execute(&self, args: Value) -> Result<String, String> {
        let repo_path = args
            .get("repo_path")
            .and_then(|v| v.as_str())
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .unwrap_or(".");
        let dir = self.fs.resolve(repo_path).map_err(|e| e.to_string())?;
        tracing::info!(repo = %dir.display(), "git status");

        let output = Command::new("git")
            .arg("status")
            .current_dir(&dir)
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| format!("Error checking status: {e}"))?;
        if !output.status.success() {
            return Err(format!(
                "Error checking status: {}",
                String::from_utf8_lossy(&output.stderr).trim()
            ));
        }
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn git_available() -> bool {
        std::process::Command::new("git")
            .arg("--version")
            .output()
            .map(|o| o.status.success())
            .unwrap_or(false)
    }

    #[tokio::test]
    async fn test_rejects_paths_outside_workspace() {
        let dir = tempfile::tempdir().unwrap();
        let tool = GitStatusTool::new(SafeFs::new(dir.path()));
        assert!(tool.execute(json!({"repo_path": ".."})).await.is_err());
    }

    #[tokio::test]
    async fn test_status_of_fresh_repo() {
        if !git_available() {
            return;
        }
        let dir = tempfile::tempdir().unwrap();
        let tool = GitStatusTool::new(SafeFs::new(dir.path()));
        let init = std::process::Command::new("git")
            .arg("init")
            .current_dir(dir.path())
            .output()
            .unwrap();
        assert!(init.status.success());
        std::fs::write(dir.path().join("new.rs"), "fn main() {}").unwrap();
        let out = tool.execute(json!({"repo_path": "."})).await.unwrap();
        assert!(out.contains("new.rs"));
    }
}
