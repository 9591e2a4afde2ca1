//! 线程租约：同一 thread_id 的轮次必须串行
//!
//! 不同线程可在同一运行时并发处理；同一线程的第二个请求会在 acquire 处等待前一轮结束。

use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex, MutexGuard};

use tokio::sync::{Mutex, OwnedMutexGuard};

type LockMap = HashMap<String, Arc<Mutex<()>>>;

/// 按线程 ID 分配的独占租约
///
/// 释放租约且无人排队时移除登记表中的条目。
#[derive(Debug, Default)]
pub struct ThreadLeases {
    locks: Arc<StdMutex<LockMap>>,
}

/// 持有期间独占该线程；drop 即释放
#[derive(Debug)]
pub struct ThreadLease {
    guard: Option<OwnedMutexGuard<()>>,
    thread_id: String,
    locks: Arc<StdMutex<LockMap>>,
}

impl ThreadLease {
    pub fn thread_id(&self) -> &str {
        &self.thread_id
    }
}

impl Drop for ThreadLease {
    fn drop(&mut self) {
        drop(self.guard.take());
        let mut locks = lock_map(&self.locks);
        // 只剩登记表自己持有时才移除；其它等待者已 clone 过 Arc
        if locks
            .get(&self.thread_id)
            .is_some_and(|lock| Arc::strong_count(lock) == 1)
        {
            locks.remove(&self.thread_id);
        }
    }
}

// 临界区内不会 panic，中毒时直接取回数据
fn lock_map(locks: &StdMutex<LockMap>) -> MutexGuard<'_, LockMap> {
    locks.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl ThreadLeases {
    pub fn new() -> Self {
        Self::default()
    }

    /// 获取线程租约（可能等待同线程的前一轮结束）
    pub async fn acquire(&self, thread_id: &str) -> ThreadLease {
        let lock = lock_map(&self.locks)
            .entry(thread_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        let guard = lock.lock_owned().await;
        ThreadLease {
            guard: Some(guard),
            thread_id: thread_id.to_string(),
            locks: self.locks.clone(),
        }
    }

    /// 当前已登记的线程数
    pub fn tracked(&self) -> usize {
        lock_map(&self.locks).len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_same_thread_is_serialized() {
        let leases = Arc::new(ThreadLeases::new());
        let first = leases.acquire("sess-1").await;

        let leases2 = leases.clone();
        let waiter = tokio::spawn(async move {
            let _lease = leases2.acquire("sess-1").await;
        });

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!waiter.is_finished());
        drop(first);
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("second lease should be granted")
            .unwrap();
    }

    #[tokio::test]
    async fn test_different_threads_do_not_block() {
        let leases = ThreadLeases::new();
        let _a = leases.acquire("sess-a").await;
        let b = tokio::time::timeout(Duration::from_millis(200), leases.acquire("sess-b")).await;
        assert!(b.is_ok());
        assert_eq!(leases.tracked(), 2);
    }

    #[tokio::test]
    async fn test_released_leases_are_pruned() {
        let leases = ThreadLeases::new();
        for i in 0..100 {
            let lease = leases.acquire(&format!("sess-{i}")).await;
            assert_eq!(lease.thread_id(), format!("sess-{i}"));
        }
        assert_eq!(leases.tracked(), 0);

        let a = leases.acquire("sess-a").await;
        let b = leases.acquire("sess-b").await;
        assert_eq!(leases.tracked(), 2);
        drop(a);
        assert_eq!(leases.tracked(), 1);
        drop(b);
        assert_eq!(leases.tracked(), 0);
    }

    #[tokio::test]
    async fn test_entry_kept_while_a_waiter_is_queued() {
        let leases = Arc::new(ThreadLeases::new());
        let first = leases.acquire("sess-1").await;

        let leases2 = leases.clone();
        let waiter = tokio::spawn(async move {
            let _lease = leases2.acquire("sess-1").await;
            tokio::time::sleep(Duration::from_millis(20)).await;
        });
        tokio::time::sleep(Duration::from_millis(50)).await;

        drop(first);
        // 等待者仍持有同一把锁，条目保留
        assert_eq!(leases.tracked(), 1);
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("waiter should finish")
            .unwrap();
        assert_eq!(leases.tracked(), 0);
    }
}
