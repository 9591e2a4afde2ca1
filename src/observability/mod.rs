//! 可观测性：tracing 订阅器
//!
//! 默认 info 级别，RUST_LOG 可覆盖；日志写 stderr，不与 REPL 的 stdout 输出混在一起。

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const DEFAULT_FILTER: &str = "info";

/// 安装全局订阅器；重复调用时静默忽略
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
        .try_init();
}
