//! 限流状态存储
//!
//! 每个 [`RateLimiter`](super::RateLimiter) 实例使用一个独立的存储。
//! `load` + `save` 是否原子取决于实现：默认的 [`RateLimitStore::transact`]
//! 只是顺序调用两者，同一 key 并发时存在竞争；需要原子性的实现应重写它
//! （例如放进数据库事务）。

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::RwLock;

use super::algorithm::RateLimitState;
use crate::error::{Error, Result};

/// 事务内的状态转换
///
/// 接收当前状态，返回需要持久化的新状态；返回 `None` 表示放弃写入（回滚）。
pub type Transition<'a> = dyn FnMut(Option<RateLimitState>) -> Option<RateLimitState> + Send + 'a;

/// 限流状态存储接口
///
/// 实现此 trait 以提供自定义的存储后端（如 Redis、数据库等）
#[async_trait]
pub trait RateLimitStore: Send + Sync {
    /// 读取状态
    async fn load(&self, id: &str) -> Result<Option<RateLimitState>>;

    /// 保存状态
    async fn save(&self, id: &str, state: RateLimitState) -> Result<()>;

    /// 删除状态
    async fn remove(&self, id: &str) -> Result<()>;

    /// 在事务边界内执行 读取 -> 转换 -> 保存
    ///
    /// 默认实现不是原子的。
    async fn transact(&self, id: &str, transition: &mut Transition<'_>) -> Result<()> {
        let current = self.load(id).await?;
        if let Some(next) = transition(current) {
            self.save(id, next).await?;
        }
        Ok(())
    }
}

/// 内存存储实现
///
/// `transact` 在同一把写锁内完成，单进程内是原子的。
/// 多实例部署需要使用带事务隔离的共享存储。
#[derive(Debug, Default)]
pub struct InMemoryRateLimitStore {
    states: RwLock<HashMap<String, RateLimitState>>,
}

impl InMemoryRateLimitStore {
    /// 创建新的内存存储
    pub fn new() -> Self {
        Self::default()
    }

    /// 当前存储的 key 数量
    pub fn len(&self) -> usize {
        self.states.read().map(|s| s.len()).unwrap_or(0)
    }

    /// 检查存储是否为空
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl RateLimitStore for InMemoryRateLimitStore {
    async fn load(&self, id: &str) -> Result<Option<RateLimitState>> {
        let states = self
            .states
            .read()
            .map_err(|_| Error::internal("Failed to acquire lock"))?;
        Ok(states.get(id).copied())
    }

    async fn save(&self, id: &str, state: RateLimitState) -> Result<()> {
        let mut states = self
            .states
            .write()
            .map_err(|_| Error::internal("Failed to acquire lock"))?;
        states.insert(id.to_string(), state);
        Ok(())
    }

    async fn remove(&self, id: &str) -> Result<()> {
        let mut states = self
            .states
            .write()
            .map_err(|_| Error::internal("Failed to acquire lock"))?;
        states.remove(id);
        Ok(())
    }

    async fn transact(&self, id: &str, transition: &mut Transition<'_>) -> Result<()> {
        let mut states = self
            .states
            .write()
            .map_err(|_| Error::internal("Failed to acquire lock"))?;
        if let Some(next) = transition(states.get(id).copied()) {
            states.insert(id.to_string(), next);
        }
        Ok(())
    }
}
