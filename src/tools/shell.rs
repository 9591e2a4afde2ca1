//! Shell 工具：白名单命令，在工作区目录下执行
//!
//! 命令经 shlex 切分后直接 spawn，不经过 sh -c；管道、重定向、命令拼接与替换一律拒绝。
//! 首个参数须与 [tools.shell].allowed_commands 精确匹配（区分大小写）。
//! 当前目录固定为工作区根，超时由 ToolExecutor 统一施加。

use std::collections::HashSet;
use std::path::PathBuf;

use async_trait::async_trait;
use serde_json::Value;
use tokio::process::Command;

use crate::tools::Tool;

/// 出现即拒绝的 shell 元字符
const SHELL_METACHARS: &[char] = &[';', '&', '|', '$', '`', '>', '<', '\n', '\r'];

const FORBIDDEN_SUBSTR: &[&str] = &["rm -rf", "rm -fr", "rm -r", "chmod 777", "chmod +s", "mkfs", "dd if="];

/// 输出截断长度
const MAX_OUTPUT_CHARS: usize = 8_000;

pub struct ShellTool {
    allowed_commands: HashSet<String>,
    working_dir: PathBuf,
}

impl ShellTool {
    pub fn new(allowed_commands: Vec<String>, working_dir: impl Into<PathBuf>) -> Self {
        Self {
            allowed_commands: allowed_commands.into_iter().collect(),
            working_dir: working_dir.into(),
        }
    }

    /// 校验并切分命令，返回 argv
    pub fn check(&self, raw: &str) -> Result<Vec<String>, String> {
        if let Some(c) = raw.chars().find(|c| SHELL_METACHARS.contains(c)) {
            return Err(format!("Shell metacharacter not allowed: {c:?}"));
        }
        let lower = raw.to_lowercase();
        if let Some(bad) = FORBIDDEN_SUBSTR.iter().find(|f| lower.contains(*f)) {
            return Err(format!("Forbidden pattern: {bad}"));
        }
        let argv = shlex::split(raw).ok_or_else(|| "Unbalanced quotes in command".to_string())?;
        match argv.first() {
            None => Err("Empty command".to_string()),
            Some(name) if self.allowed_commands.contains(name) => Ok(argv),
            Some(name) => Err(format!("Command '{name}' not in allowlist")),
        }
    }
}

fn truncate(s: &str) -> String {
    if s.chars().count() > MAX_OUTPUT_CHARS {
        format!("{}\n...[truncated]", s.chars().take(MAX_OUTPUT_CHARS).collect::<String>())
    } else {
        s.to_string()
    }
}

#[async_trait]
impl Tool for ShellTool {
    fn name(&self) -> &str {
        "shell"
    }

    fn description(&self) -> &str {
        "Run an allowlisted shell command in the workspace. Args: {\"command\": \"e.g. cargo test\"}"
    }

    fn parameters_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "command": {
                    "type": "string",
                    "description": "The command to execute (program must be allowlisted; no pipes, redirects or chaining)"
                }
            },
            "required": ["command"]
        })
    }

    async fn execute(&self, args: Value) -> Result<String, String> {
        let command = args
            .get("command")
            .and_then(|v| v.as_str())
            .unwrap_or("")
            .trim();
        let argv = self.check(command)?;
        tracing::info!(command, "shell tool execute");

        let output = Command::new(&argv[0])
            .args(&argv[1..])
            .current_dir(&self.working_dir)
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| format!("Execution failed: {e}"))?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);
        if !output.status.success() {
            return Err(truncate(&format!(
                "Exit {}\nstdout: {}\nstderr: {}",
                output.status.code().map_or("signal".to_string(), |c| c.to_string()),
                stdout.trim(),
                stderr.trim()
            )));
        }
        let combined = if stderr.trim().is_empty() {
            stdout.trim().to_string()
        } else {
            format!("{}\nstderr: {}", stdout.trim(), stderr.trim())
        };
        Ok(truncate(&combined))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn tool(dir: &std::path::Path) -> ShellTool {
        ShellTool::new(vec!["echo".into(), "ls".into(), "false".into()], dir)
    }

    #[test]
    fn test_check() {
        let t = tool(std::path::Path::new("."));
        assert_eq!(t.check("echo hi").unwrap(), vec!["echo", "hi"]);
        assert_eq!(t.check("echo 'a b' c").unwrap(), vec!["echo", "a b", "c"]);
        assert!(t.check("ECHO hi").unwrap_err().contains("allowlist"));
        assert!(t.check("python3 -c 1").unwrap_err().contains("allowlist"));
        assert!(t.check("ls -r -f").is_ok());
        assert!(t.check("echo 'open").unwrap_err().contains("quotes"));
        assert!(t.check("   ").is_err());
    }

    #[test]
    fn test_check_rejects_chaining_and_redirects() {
        let t = tool(std::path::Path::new("."));
        for cmd in [
            "echo ok; touch x",
            "echo ok && touch x",
            "echo ok || touch x",
            "echo ok | sh",
            "echo $(touch x)",
            "echo `touch x`",
            "echo ok > x",
            "ls < x",
            "echo ok\ntouch x",
            "ls & touch x",
        ] {
            assert!(t.check(cmd).unwrap_err().contains("metacharacter"), "{cmd}");
        }
    }

    #[tokio::test]
    async fn test_chained_command_does_not_run() {
        let dir = tempfile::tempdir().unwrap();
        let t = tool(dir.path());
        assert!(t.execute(json!({"command": "echo ok; touch created"})).await.is_err());
        assert!(!dir.path().join("created").exists());

        // 引号内的 ; 也不放行
        assert!(t.execute(json!({"command": "echo 'a;b'"})).await.is_err());
    }

    #[tokio::test]
    async fn test_runs_in_workspace() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("marker.txt"), "").unwrap();
        let t = tool(dir.path());
        let out = t.execute(json!({"command": "ls"})).await.unwrap();
        assert!(out.contains("marker.txt"));
        let err = t.execute(json!({"command": "false"})).await.unwrap_err();
        assert!(err.starts_with("Exit 1"));
    }
}
