//! 异步 SQLite 检查点（sqlx）
//!
//! 每个线程一行：thread_id 主键，state 为 TurnState 的 JSON。需要启用 `async-sqlite` feature（默认开启）。

#[cfg(feature = "async-sqlite")]
mod sqlx_impl {
    use std::path::Path;

    use async_trait::async_trait;
    use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};
    use sqlx::Row;

    use crate::core::{CheckpointError, TurnState};
    use crate::memory::CheckpointStore;

    /// SQLite 检查点存储
    pub struct SqliteCheckpointStore {
        pool: SqlitePool,
    }

    impl SqliteCheckpointStore {
        /// 打开（必要时创建）数据库文件并建表
        pub async fn new(db_path: impl AsRef<Path>) -> Result<Self, CheckpointError> {
            if let Some(parent) = db_path.as_ref().parent() {
                if !parent.as_os_str().is_empty() {
                    tokio::fs::create_dir_all(parent).await?;
                }
            }
            let db_url = format!("sqlite:{}?mode=rwc", db_path.as_ref().display());
            let pool = SqlitePoolOptions::new()
                .max_connections(5)
                .connect(&db_url)
                .await?;
            let store = Self { pool };
            store.init_tables().await?;
            Ok(store)
        }

        pub async fn from_pool(pool: SqlitePool) -> Result<Self, CheckpointError> {
            let store = Self { pool };
            store.init_tables().await?;
            Ok(store)
        }

        async fn init_tables(&self) -> Result<(), sqlx::Error> {
            sqlx::query(
                "CREATE TABLE IF NOT EXISTS checkpoints (
                    thread_id TEXT PRIMARY KEY,
                    state TEXT NOT NULL,
                    message_count INTEGER NOT NULL,
                    updated_at TEXT NOT NULL
                )",
            )
            .execute(&self.pool)
            .await?;
            Ok(())
        }

        /// 列出全部线程 ID（按最近更新排序）
        pub async fn list_threads(&self) -> Result<Vec<String>, CheckpointError> {
            let rows = sqlx::query("SELECT thread_id FROM checkpoints ORDER BY updated_at DESC")
                .fetch_all(&self.pool)
                .await?;
            Ok(rows.into_iter().map(|r| r.get("thread_id")).collect())
        }
    }

    #[async_trait]
    impl CheckpointStore for SqliteCheckpointStore {
        async fn get(&self, thread_id: &str) -> Result<Option<TurnState>, CheckpointError> {
            let row = sqlx::query("SELECT state FROM checkpoints WHERE thread_id = ?")
                .bind(thread_id)
                .fetch_optional(&self.pool)
                .await?;
            match row {
                Some(row) => {
                    let data: String = row.get("state");
                    Ok(Some(serde_json::from_str(&data)?))
                }
                None => Ok(None),
            }
        }

        async fn put(&self, state: &TurnState) -> Result<(), CheckpointError> {
            let data = serde_json::to_string(state)?;
            let now = chrono::Utc::now().to_rfc3339();
            sqlx::query(
                "INSERT INTO checkpoints (thread_id, state, message_count, updated_at)
                 VALUES (?, ?, ?, ?)
                 ON CONFLICT(thread_id) DO UPDATE SET
                    state = excluded.state,
                    message_count = excluded.message_count,
                    updated_at = excluded.updated_at",
            )
            .bind(state.thread_id())
            .bind(&data)
            .bind(state.len() as i64)
            .bind(&now)
            .execute(&self.pool)
            .await?;
            Ok(())
        }
    }

}

#[cfg(feature = "async-sqlite")]
pub use sqlx_impl::SqliteCheckpointStore;
