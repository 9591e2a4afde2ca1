//! 检查点持久化
//!
//! CheckpointStore 以 thread_id 为键存取完整 TurnState。每次尝试开始时读取、成功结束后写回，
//! 它是线程状态的唯一事实来源。本模块提供内存与文件两种实现，SQLite 实现见 async_persistence。

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::core::{CheckpointError, TurnState};

/// 检查点存储接口：get 缺失表示新线程
#[async_trait]
pub trait CheckpointStore: Send + Sync {
    async fn get(&self, thread_id: &str) -> Result<Option<TurnState>, CheckpointError>;

    async fn put(&self, state: &TurnState) -> Result<(), CheckpointError>;
}

/// 内存检查点（进程退出即丢失），测试与 mock 运行用
#[derive(Clone, Default)]
pub struct InMemoryCheckpointStore {
    states: Arc<RwLock<HashMap<String, TurnState>>>,
}

impl InMemoryCheckpointStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CheckpointStore for InMemoryCheckpointStore {
    async fn get(&self, thread_id: &str) -> Result<Option<TurnState>, CheckpointError> {
        Ok(self.states.read().await.get(thread_id).cloned())
    }

    async fn put(&self, state: &TurnState) -> Result<(), CheckpointError> {
        self.states
            .write()
            .await
            .insert(state.thread_id().to_string(), state.clone());
        Ok(())
    }
}

/// 文件检查点：每个线程一个 JSON 文件，先写临时文件再 rename，避免写到一半的状态
#[derive(Debug, Clone)]
pub struct FileCheckpointStore {
    dir: PathBuf,
}

impl FileCheckpointStore {
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// thread_id 中非 [A-Za-z0-9_-] 的字符替换为 '_'，防止路径穿越
    fn path_for(&self, thread_id: &str) -> PathBuf {
        let safe: String = thread_id
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
            .collect();
        self.dir.join(format!("{safe}.json"))
    }
}

#[async_trait]
impl CheckpointStore for FileCheckpointStore {
    async fn get(&self, thread_id: &str) -> Result<Option<TurnState>, CheckpointError> {
        let path = self.path_for(thread_id);
        let data = match tokio::fs::read_to_string(&path).await {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let state: TurnState = serde_json::from_str(&data)?;
        if state.thread_id() != thread_id {
            return Err(CheckpointError::ThreadMismatch {
                expected: thread_id.to_string(),
                found: state.thread_id().to_string(),
            });
        }
        Ok(Some(state))
    }

    async fn put(&self, state: &TurnState) -> Result<(), CheckpointError> {
        tokio::fs::create_dir_all(&self.dir).await?;
        let path = self.path_for(state.thread_id());
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, serde_json::to_string_pretty(state)?).await?;
        tokio::fs::rename(&tmp, &path).await?;
        tracing::debug!(thread_id = %state.thread_id(), messages = state.len(), "checkpoint written");
        Ok(())
    }
}
