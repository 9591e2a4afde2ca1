//! 工具执行器
//!
//! 持有某个专家的工具子集与超时；execute 超时返回 ToolTimeout，工具报错返回 ToolExecutionFailed，
//! 每次调用输出一行结构化审计日志（event=tool_audit）。

use std::time::{Duration, Instant};

use serde_json::Value;
use tokio::time::timeout;

use crate::core::AgentError;
use crate::tools::ToolRegistry;

pub struct ToolExecutor {
    registry: ToolRegistry,
    timeout: Duration,
}

impl ToolExecutor {
    pub fn new(registry: ToolRegistry, timeout_secs: u64) -> Self {
        Self {
            registry,
            timeout: Duration::from_secs(timeout_secs),
        }
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    pub fn can_run(&self, tool_name: &str) -> bool {
        self.registry.contains(tool_name)
    }

    /// 执行指定工具（作用域外的工具也会以 ToolExecutionFailed 返回）
    pub async fn execute(
        &self,
        agent: &str,
        tool_name: &str,
        args: Value,
    ) -> Result<String, AgentError> {
        let start = Instant::now();
        let preview = args_preview(&args);
        let result = timeout(self.timeout, self.registry.execute(tool_name, args)).await;

        let outcome = match &result {
            Ok(Ok(_)) => "ok",
            Ok(Err(_)) => "error",
            Err(_) => "timeout",
        };
        let audit = serde_json::json!({
            "event": "tool_audit",
            "agent": agent,
            "tool": tool_name,
            "ok": outcome == "ok",
            "outcome": outcome,
            "duration_ms": start.elapsed().as_millis() as u64,
            "args_preview": preview,
        });
        tracing::info!(audit = %audit, "tool");

        match result {
            Ok(Ok(content)) => Ok(content),
            Ok(Err(e)) => Err(AgentError::ToolExecutionFailed(e)),
            Err(_) => Err(AgentError::ToolTimeout(tool_name.to_string())),
        }
    }
}

fn args_preview(args: &Value) -> String {
    let s = args.to_string();
    if s.chars().count() > 200 {
        format!("{}...", s.chars().take(200).collect::<String>())
    } else {
        s
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::Tool;
    use async_trait::async_trait;

    struct Sleepy;

    #[async_trait]
    impl Tool for Sleepy {
        fn name(&self) -> &str {
            "sleepy"
        }

        fn description(&self) -> &str {
            "sleeps"
        }

        async fn execute(&self, _args: Value) -> Result<String, String> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok("woke".into())
        }
    }

    struct Failing;

    #[async_trait]
    impl Tool for Failing {
        fn name(&self) -> &str {
            "failing"
        }

        fn description(&self) -> &str {
            "always fails"
        }

        async fn execute(&self, _args: Value) -> Result<String, String> {
            Err("boom".into())
        }
    }

    #[tokio::test]
    async fn test_timeout_maps_to_tool_timeout() {
        let mut reg = ToolRegistry::new();
        reg.register(Sleepy);
        let exec = ToolExecutor::new(reg, 1);
        let err = exec.execute("Coder", "sleepy", Value::Null).await.unwrap_err();
        assert!(matches!(err, AgentError::ToolTimeout(ref t) if t == "sleepy"));
    }

    #[tokio::test]
    async fn test_failure_and_unknown() {
        let mut reg = ToolRegistry::new();
        reg.register(Failing);
        let exec = ToolExecutor::new(reg, 5);
        assert!(matches!(
            exec.execute("Coder", "failing", Value::Null).await,
            Err(AgentError::ToolExecutionFailed(ref m)) if m == "boom"
        ));
        assert!(!exec.can_run("shell"));
        assert!(exec.execute("Coder", "shell", Value::Null).await.is_err());
    }
}
