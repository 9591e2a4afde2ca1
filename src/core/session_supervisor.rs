//! 会话监管：退出与重载信号
//!
//! 两种协作式信号，都只在两轮之间检查，绝不打断进行中的轮次：
//! - CancellationToken：Ctrl+C / quit，结束会话循环
//! - ReloadSignal：由 reload_system 工具（或外部控制通道）置位，外层循环据此重建运行时

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

/// 重载请求：显式句柄，置位后由 take() 读取并清除
#[derive(Debug, Clone, Default)]
pub struct ReloadSignal {
    requested: Arc<AtomicBool>,
}

impl ReloadSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request(&self) {
        self.requested.store(true, Ordering::SeqCst);
    }

    /// 读取并清除；返回 true 表示需要在本轮结束后重载
    pub fn take(&self) -> bool {
        self.requested.swap(false, Ordering::SeqCst)
    }

    pub fn is_requested(&self) -> bool {
        self.requested.load(Ordering::SeqCst)
    }
}

/// 会话级生命周期：取消令牌 + 重载信号
#[derive(Debug, Clone)]
pub struct SessionSupervisor {
    cancel_token: CancellationToken,
    reload: ReloadSignal,
}

impl SessionSupervisor {
    pub fn new() -> Self {
        Self {
            cancel_token: CancellationToken::new(),
            reload: ReloadSignal::new(),
        }
    }

    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel_token.clone()
    }

    pub fn reload_signal(&self) -> ReloadSignal {
        self.reload.clone()
    }

    /// 触发退出（Ctrl+C）；当前轮次仍会完整结束
    pub fn cancel(&self) {
        self.cancel_token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel_token.is_cancelled()
    }

    /// 轮次边界检查：是否有待处理的重载请求（读取后清除）
    pub fn take_reload(&self) -> bool {
        self.reload.take()
    }
}

impl Default for SessionSupervisor {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reload_is_consumed_once() {
        let supervisor = SessionSupervisor::new();
        let handle = supervisor.reload_signal();
        assert!(!supervisor.take_reload());
        handle.request();
        assert!(supervisor.take_reload());
        assert!(!supervisor.take_reload());
    }

    #[test]
    fn test_cancel_is_visible_through_token() {
        let supervisor = SessionSupervisor::new();
        let token = supervisor.cancel_token();
        supervisor.cancel();
        assert!(token.is_cancelled());
        assert!(supervisor.is_cancelled());
    }
}
