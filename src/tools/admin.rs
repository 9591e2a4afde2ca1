//! 管理工具：reload_system
//!
//! 只置位 ReloadSignal，不打断当前轮；REPL 在两轮之间检查并重建运行时。

use async_trait::async_trait;
use serde_json::Value;

use crate::core::ReloadSignal;
use crate::tools::Tool;

pub struct ReloadSystemTool {
    signal: ReloadSignal,
}

impl ReloadSystemTool {
    pub fn new(signal: ReloadSignal) -> Self {
        Self { signal }
    }
}

#[async_trait]
impl Tool for ReloadSystemTool {
    fn name(&self) -> &str {
        "reload_system"
    }

    fn description(&self) -> &str {
        "Reload configuration and tools after this turn completes. Args: {}"
    }

    async fn execute(&self, _args: Value) -> Result<String, String> {
        self.signal.request();
        tracing::info!("reload requested");
        Ok("System reload requested. The agent will re-initialize after this turn.".into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_sets_signal() {
        let signal = ReloadSignal::new();
        let tool = ReloadSystemTool::new(signal.clone());
        assert!(!signal.is_requested());
        tool.execute(Value::Null).await.unwrap();
        assert!(signal.take());
        assert!(!signal.is_requested());
    }
}
