//! Hive - 多智能体协作 REPL
//!
//! 入口：加载密钥与配置、初始化日志、装配团队运行时，然后逐行读取 stdin 驱动轮次。
//! 外层循环负责重载（reload_system 工具置位后在两轮之间整体重建），内层循环负责对话。

use std::io::Write;
use std::path::PathBuf;

use anyhow::Context;
use hive::config::{load_config, load_env_files, reload_config, AppConfig};
use hive::core::{resolve_workspace, SessionSupervisor, TeamBuilder, ThreadIdentity};
use hive::react::{EventSender, TeamEvent};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

/// 内层循环的退出原因
enum SessionEnd {
    Quit,
    Reload,
}

fn is_quit(input: &str) -> bool {
    matches!(input.to_lowercase().as_str(), "quit" | "exit" | "q")
}

/// 一轮是否已结束（每轮恰好以 TurnFinished 或 Error 收尾）
fn is_turn_end(ev: &TeamEvent) -> bool {
    matches!(ev, TeamEvent::TurnFinished { .. } | TeamEvent::Error { .. })
}

fn render_event(ev: &TeamEvent) -> Option<String> {
    match ev {
        TeamEvent::TurnStarted { .. } | TeamEvent::TurnFinished { .. } => None,
        TeamEvent::ContextRetrieved { preview } => {
            Some(format!("[memory] retrieved context:\n{preview}\n"))
        }
        TeamEvent::Routed { next } => Some(format!("--> {next}")),
        TeamEvent::AgentMessage { agent, text } => Some(format!("[{agent}]\n{text}\n")),
        TeamEvent::ToolCall { agent, tool, args } => Some(format!("[{agent}] calling {tool} {args}")),
        TeamEvent::Observation { tool, preview, .. } => Some(format!("[{tool}] {preview}")),
        TeamEvent::MemoryUpdated => Some("[System] Episodic memory updated.".to_string()),
        TeamEvent::Retrying { attempt, error } => {
            Some(format!("[retry] attempt {attempt} failed: {error}"))
        }
        TeamEvent::Error { text } => Some(format!("[error] {text}")),
    }
}

/// 打印协作事件到 stdout；每轮的事件打印完后经 `turn_done` 通知 REPL
async fn print_events(mut rx: mpsc::UnboundedReceiver<TeamEvent>, turn_done: mpsc::UnboundedSender<()>) {
    while let Some(ev) = rx.recv().await {
        if let Some(line) = render_event(&ev) {
            println!("{line}");
        }
        if is_turn_end(&ev) {
            let _ = turn_done.send(());
        }
    }
}

fn load_app_config(config_path: Option<PathBuf>, reload: bool) -> anyhow::Result<AppConfig> {
    let cfg = if reload {
        reload_config(config_path.clone())
    } else {
        load_config(config_path.clone())
    }
    .context("Failed to load config")?;
    if cfg.app.secrets_files.is_empty() {
        return Ok(cfg);
    }
    // 密钥文件里可能有 HIVE__* 覆盖，加载后再读一次
    load_env_files(&cfg.app.secrets_files);
    load_config(config_path).context("Failed to load config")
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    load_env_files(&[".env"]);
    hive::observability::init();

    let config_path = std::env::args().nth(1).map(PathBuf::from);
    let mut cfg = load_app_config(config_path.clone(), false)?;
    let cwd = std::env::current_dir().context("Failed to read current directory")?;

    let supervisor = SessionSupervisor::new();
    {
        let supervisor = supervisor.clone();
        tokio::spawn(async move {
            if let Ok(()) = tokio::signal::ctrl_c().await {
                tracing::info!("Received Ctrl+C, exiting after the current turn");
                supervisor.cancel();
            }
        });
    }
    let cancel = supervisor.cancel_token();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        let workspace = resolve_workspace(&cfg).context("Failed to prepare workspace")?;
        let thread_id = ThreadIdentity::from_config(&cfg, &cwd).thread_id();
        let runtime = TeamBuilder::new(cfg.clone(), workspace, supervisor.reload_signal())
            .build()
            .await
            .context("Failed to build team runtime")?;

        let (tx, rx): (EventSender, _) = mpsc::unbounded_channel();
        let (done_tx, mut done_rx) = mpsc::unbounded_channel();
        let printer = tokio::spawn(print_events(rx, done_tx));
        println!(
            "{} ready (thread {thread_id}, workspace {}). Type 'quit' to exit.",
            cfg.app.name.as_deref().unwrap_or("hive"),
            runtime.workspace.display()
        );

        let end = loop {
            print!("\nYou: ");
            std::io::stdout().flush().context("Failed to flush stdout")?;
            let line = tokio::select! {
                _ = cancel.cancelled() => break SessionEnd::Quit,
                line = lines.next_line() => line.context("Failed to read stdin")?,
            };
            let Some(line) = line else {
                break SessionEnd::Quit;
            };
            let input = line.trim();
            if input.is_empty() {
                continue;
            }
            if is_quit(input) {
                break SessionEnd::Quit;
            }

            if let Err(e) = runtime.runner.run_turn(&thread_id, input, Some(&tx)).await {
                tracing::error!(error = %e, "turn failed, thread kept at last checkpoint");
            }
            // 等本轮事件全部打印完再出提示符
            let _ = done_rx.recv().await;

            if supervisor.is_cancelled() {
                break SessionEnd::Quit;
            }
            if supervisor.take_reload() {
                break SessionEnd::Reload;
            }
        };

        drop(tx);
        let _ = printer.await;

        match end {
            SessionEnd::Quit => break,
            SessionEnd::Reload => {
                tracing::info!("Reload requested, rebuilding runtime");
                cfg = match load_app_config(config_path.clone(), true) {
                    Ok(new_cfg) => new_cfg,
                    Err(e) => {
                        tracing::warn!(error = %e, "Reload failed, keeping previous config");
                        cfg
                    }
                };
            }
        }
    }

    println!("Bye.");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_quit() {
        assert!(is_quit("quit"));
        assert!(is_quit("EXIT"));
        assert!(is_quit("q"));
        assert!(!is_quit("quite"));
    }

    #[tokio::test]
    async fn test_printer_signals_after_turn_events() {
        let (tx, rx) = mpsc::unbounded_channel();
        let (done_tx, mut done_rx) = mpsc::unbounded_channel();
        let printer = tokio::spawn(print_events(rx, done_tx));

        tx.send(TeamEvent::AgentMessage {
            agent: "Planner".into(),
            text: "Here is the plan".into(),
        })
        .unwrap();
        tx.send(TeamEvent::TurnFinished { messages: 2 }).unwrap();
        tx.send(TeamEvent::Error { text: "boom".into() }).unwrap();
        assert_eq!(done_rx.recv().await, Some(()));
        assert_eq!(done_rx.recv().await, Some(()));

        tx.send(TeamEvent::MemoryUpdated).unwrap();
        drop(tx);
        printer.await.unwrap();
        // 非收尾事件不发信号
        assert_eq!(done_rx.recv().await, None);
    }

    #[test]
    fn test_render_event_skips_bookkeeping() {
        assert!(render_event(&TeamEvent::TurnFinished { messages: 3 }).is_none());
        assert_eq!(
            render_event(&TeamEvent::Error { text: "boom".into() }).as_deref(),
            Some("[error] boom")
        );
        assert!(is_turn_end(&TeamEvent::Error { text: String::new() }));
        assert!(!is_turn_end(&TeamEvent::MemoryUpdated));
    }
}
