//! 按 key 加锁
//!
//! 同一个 key 的临界区严格按到达顺序逐个执行，不同 key 之间完全并发。
//! 每个 key 对应一个 `tokio::sync::Mutex`，其等待队列是 FIFO 的；
//! 最后一个持有者 / 等待者离开时删除该 key 的条目。
//!
//! 仅在单进程内有效，跨进程需要分布式锁或存储层的事务。

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tracing::trace;

type Slot = Arc<AsyncMutex<()>>;

/// 按 key 的异步互斥锁
#[derive(Debug, Default)]
pub struct LockById {
    slots: Mutex<HashMap<String, Slot>>,
}

/// 持有中的锁，drop 时释放
#[derive(Debug)]
pub struct LockGuard<'a> {
    owner: &'a LockById,
    key: String,
    slot: Slot,
    guard: Option<OwnedMutexGuard<()>>,
}

impl LockById {
    /// 创建新的锁表
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self, key: &str) -> Slot {
        let mut slots = self.slots.lock().unwrap_or_else(|e| e.into_inner());
        slots
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(AsyncMutex::new(())))
            .clone()
    }

    /// 获取 key 对应的锁
    ///
    /// 排队等待直到之前到达的同 key 调用全部释放。
    pub async fn acquire(&self, key: &str) -> LockGuard<'_> {
        let slot = self.slot(key);
        let guard = slot.clone().lock_owned().await;
        trace!(key, "lock acquired");
        LockGuard {
            owner: self,
            key: key.to_string(),
            slot,
            guard: Some(guard),
        }
    }

    /// 在 key 的锁内执行 `f`
    ///
    /// 锁覆盖 `f` 的整个执行过程（包括其中的挂起点），
    /// 无论 `f` 成功、失败还是 panic 都会释放。
    pub async fn with_lock<F, Fut, T>(&self, key: &str, f: F) -> T
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        let _guard = self.acquire(key).await;
        f().await
    }

    /// key 当前是否被持有
    pub fn is_locked(&self, key: &str) -> bool {
        let slots = self.slots.lock().unwrap_or_else(|e| e.into_inner());
        slots.get(key).is_some_and(|slot| slot.try_lock().is_err())
    }

    /// 当前有持有者或等待者的 key 数量
    pub fn len(&self) -> usize {
        self.slots.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// 是否没有任何 key 被持有
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl LockGuard<'_> {
    /// 锁对应的 key
    pub fn key(&self) -> &str {
        &self.key
    }
}

impl Drop for LockGuard<'_> {
    fn drop(&mut self) {
        let mut slots = self.owner.slots.lock().unwrap_or_else(|e| e.into_inner());
        self.guard.take();
        // 只剩表和本 guard 的引用：没有等待者
        if Arc::strong_count(&self.slot) == 2 {
            slots.remove(&self.key);
        }
        trace!(key = %self.key, "lock released");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn test_with_lock_returns_value() {
        let locks = LockById::new();
        let value = locks.with_lock("a", || async { 42 }).await;
        assert_eq!(value, 42);
        assert!(locks.is_empty());
    }

    #[tokio::test]
    async fn test_guard_releases_entry() {
        let locks = LockById::new();
        {
            let guard = locks.acquire("a").await;
            assert_eq!(guard.key(), "a");
            assert!(locks.is_locked("a"));
            assert!(!locks.is_locked("b"));
            assert_eq!(locks.len(), 1);
        }
        assert!(!locks.is_locked("a"));
        assert!(locks.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_same_key_is_serialized() {
        let locks = Arc::new(LockById::new());
        let active = Arc::new(AtomicUsize::new(0));
        let max_active = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..5 {
            let locks = locks.clone();
            let active = active.clone();
            let max_active = max_active.clone();
            handles.push(tokio::spawn(async move {
                locks
                    .with_lock("same", || async {
                        let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                        max_active.fetch_max(now, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(10)).await;
                        active.fetch_sub(1, Ordering::SeqCst);
                    })
                    .await;
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(max_active.load(Ordering::SeqCst), 1);
        assert!(locks.is_empty());
    }
}
