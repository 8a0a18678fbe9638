//! 基于存储的限流器
//!
//! 把一个 [`Algorithm`] 和一个 [`RateLimitStore`] 组合起来，提供
//! consume / try_consume / next_time / reset 协议。

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, instrument};

use super::algorithm::{Algorithm, RateLimitState};
use super::store::{InMemoryRateLimitStore, RateLimitStore};
use crate::clock::{Clock, SystemClock};
use crate::error::{Error, Result};

/// consume 的默认最长等待时间
pub const DEFAULT_CONSUME_TIMEOUT: Duration = Duration::from_millis(4000);

/// consume 选项
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConsumeOptions {
    /// 调用方愿意等待的最长时间，超过则拒绝
    pub timeout: Duration,
}

impl Default for ConsumeOptions {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_CONSUME_TIMEOUT,
        }
    }
}

impl ConsumeOptions {
    /// 指定超时时间
    pub fn with_timeout(timeout: Duration) -> Self {
        Self { timeout }
    }

    /// 不接受任何等待：只有立即可用时才通过
    pub fn immediate() -> Self {
        Self {
            timeout: Duration::ZERO,
        }
    }
}

/// try_consume 的结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TryConsume {
    /// 已消费
    Consumed,
    /// 被拒绝，未记录本次尝试
    Denied {
        /// 下一个令牌可用的时间（Unix 毫秒）
        next_token_timestamp: i64,
        /// 距离可用还需等待的毫秒数
        delay: i64,
    },
}

impl TryConsume {
    /// 是否已消费
    pub fn is_consumed(&self) -> bool {
        matches!(self, TryConsume::Consumed)
    }
}

/// 一次计算的结果
#[derive(Debug, Clone, Copy)]
struct Decision {
    state: RateLimitState,
    delay: i64,
    committed: bool,
}

/// 限流器
///
/// ## 示例
///
/// ```rust
/// # tokio::runtime::Runtime::new().unwrap().block_on(async {
/// use passcode::rate_limit::{Algorithm, RateLimiter, TryConsume, ConsumeOptions};
///
/// let limiter = RateLimiter::new(Algorithm::bucket(1000, 2).unwrap());
///
/// let options = ConsumeOptions::immediate();
/// assert!(limiter.try_consume("ip_1", options).await.unwrap().is_consumed());
/// assert!(limiter.try_consume("ip_1", options).await.unwrap().is_consumed());
/// assert!(matches!(
///     limiter.try_consume("ip_1", options).await.unwrap(),
///     TryConsume::Denied { .. }
/// ));
/// # });
/// ```
pub struct RateLimiter {
    algorithm: Algorithm,
    store: Arc<dyn RateLimitStore>,
    clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimiter")
            .field("algorithm", &self.algorithm)
            .finish_non_exhaustive()
    }
}

impl RateLimiter {
    /// 使用内存存储和系统时钟创建限流器
    pub fn new(algorithm: Algorithm) -> Self {
        Self::with_store(algorithm, Arc::new(InMemoryRateLimitStore::new()))
    }

    /// 使用自定义存储创建限流器
    pub fn with_store(algorithm: Algorithm, store: Arc<dyn RateLimitStore>) -> Self {
        Self {
            algorithm,
            store,
            clock: Arc::new(SystemClock),
        }
    }

    /// 替换时间源
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// 获取算法
    pub fn algorithm(&self) -> &Algorithm {
        &self.algorithm
    }

    /// 计算新状态；等待时间不超过 `timeout` 时提交，否则回滚
    async fn decide(&self, id: &str, timeout: Duration) -> Result<Decision> {
        let now = self.clock.now_millis();
        let timeout = i64::try_from(timeout.as_millis()).unwrap_or(i64::MAX);
        let algorithm = self.algorithm;
        let mut decision = None;

        self.store
            .transact(id, &mut |current| {
                let state = algorithm.take(current, now);
                let delay = (state.timestamp - now).max(0);
                let committed = delay <= timeout;
                decision = Some(Decision {
                    state,
                    delay,
                    committed,
                });
                committed.then_some(state)
            })
            .await?;

        decision.ok_or_else(|| Error::internal("rate limit store skipped the transition"))
    }

    /// 消费一个令牌
    ///
    /// 需要等待且等待时间不超过 `options.timeout` 时，先提交再挂起调用方；
    /// 超过时不记录本次尝试，返回 [`Error::RateLimitExceeded`]。
    #[instrument(skip(self), fields(algorithm = ?self.algorithm))]
    pub async fn consume(&self, id: &str, options: ConsumeOptions) -> Result<()> {
        let decision = self.decide(id, options.timeout).await?;

        if !decision.committed {
            debug!(
                delay = decision.delay,
                next_token_timestamp = decision.state.timestamp,
                "rate limit exceeded"
            );
            return Err(Error::rate_limited(decision.state.timestamp));
        }

        if decision.delay > 0 {
            debug!(delay = decision.delay, "delaying caller");
            tokio::time::sleep(Duration::from_millis(decision.delay as u64)).await;
        }

        Ok(())
    }

    /// 尝试消费一个令牌，不挂起也不返回限流错误
    ///
    /// 等待时间不超过 `options.timeout` 时提交并返回 [`TryConsume::Consumed`]，
    /// 调用方自行决定是否等待。
    #[instrument(skip(self), fields(algorithm = ?self.algorithm))]
    pub async fn try_consume(&self, id: &str, options: ConsumeOptions) -> Result<TryConsume> {
        let decision = self.decide(id, options.timeout).await?;

        if decision.committed {
            return Ok(TryConsume::Consumed);
        }

        debug!(
            delay = decision.delay,
            next_token_timestamp = decision.state.timestamp,
            "rate limit denied"
        );
        Ok(TryConsume::Denied {
            next_token_timestamp: decision.state.timestamp,
            delay: decision.delay,
        })
    }

    /// 下一次 consume 会得到的时间戳（只读，不记录）
    pub async fn next_time(&self, id: &str) -> Result<i64> {
        let now = self.clock.now_millis();
        let current = self.store.load(id).await?;
        Ok(self.algorithm.take(current, now).timestamp)
    }

    /// 清除状态，恢复满额
    pub async fn reset(&self, id: &str) -> Result<()> {
        debug!(id, "rate limit reset");
        self.store.remove(id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;

    fn limiter(algorithm: Algorithm, clock: &ManualClock) -> (RateLimiter, Arc<InMemoryRateLimitStore>) {
        let store = Arc::new(InMemoryRateLimitStore::new());
        let limiter =
            RateLimiter::with_store(algorithm, store.clone()).with_clock(Arc::new(clock.clone()));
        (limiter, store)
    }

    #[tokio::test]
    async fn test_consume_until_exceeded() {
        let clock = ManualClock::new(0);
        let (limiter, _) = limiter(Algorithm::bucket(10_000, 2).unwrap(), &clock);
        let options = ConsumeOptions::with_timeout(Duration::from_millis(100));

        limiter.consume("k", options).await.unwrap();
        limiter.consume("k", options).await.unwrap();

        let err = limiter.consume("k", options).await.unwrap_err();
        assert!(matches!(
            err,
            Error::RateLimitExceeded {
                next_token_timestamp: 10_000
            }
        ));
    }

    #[tokio::test]
    async fn test_rejected_attempt_is_not_persisted() {
        let clock = ManualClock::new(0);
        let (limiter, store) = limiter(Algorithm::bucket(10_000, 1).unwrap(), &clock);

        limiter.consume("k", ConsumeOptions::immediate()).await.unwrap();
        let before = store.load("k").await.unwrap();

        for _ in 0..5 {
            assert!(limiter.consume("k", ConsumeOptions::immediate()).await.is_err());
        }
        assert_eq!(store.load("k").await.unwrap(), before);
    }

    #[tokio::test(start_paused = true)]
    async fn test_consume_waits_within_timeout() {
        let clock = ManualClock::new(0);
        let (limiter, store) = limiter(Algorithm::bucket(1000, 1).unwrap(), &clock);

        limiter.consume("k", ConsumeOptions::default()).await.unwrap();

        let started = tokio::time::Instant::now();
        limiter.consume("k", ConsumeOptions::default()).await.unwrap();
        assert_eq!(started.elapsed(), Duration::from_millis(1000));

        // 等待前已提交
        assert_eq!(
            store.load("k").await.unwrap(),
            Some(RateLimitState::new(0, 1000))
        );
    }

    #[tokio::test]
    async fn test_try_consume() {
        let clock = ManualClock::new(500);
        let (limiter, _) = limiter(Algorithm::bucket(1000, 1).unwrap(), &clock);

        assert_eq!(
            limiter
                .try_consume("k", ConsumeOptions::immediate())
                .await
                .unwrap(),
            TryConsume::Consumed
        );
        assert_eq!(
            limiter
                .try_consume("k", ConsumeOptions::immediate())
                .await
                .unwrap(),
            TryConsume::Denied {
                next_token_timestamp: 1500,
                delay: 1000
            }
        );

        clock.advance(1000);
        assert!(
            limiter
                .try_consume("k", ConsumeOptions::immediate())
                .await
                .unwrap()
                .is_consumed()
        );
    }

    #[tokio::test]
    async fn test_next_time_is_read_only() {
        let clock = ManualClock::new(0);
        let (limiter, store) = limiter(Algorithm::exponential(1000, 2.0, 1).unwrap(), &clock);

        assert_eq!(limiter.next_time("user").await.unwrap(), 0);
        assert!(store.is_empty());

        limiter.consume("user", ConsumeOptions::immediate()).await.unwrap();
        assert_eq!(limiter.next_time("user").await.unwrap(), 1000);
        assert_eq!(limiter.next_time("user").await.unwrap(), 1000);
    }

    #[tokio::test]
    async fn test_reset_restores_capacity() {
        let clock = ManualClock::new(0);
        let (limiter, store) = limiter(Algorithm::exponential(5000, 2.0, 1).unwrap(), &clock);

        limiter.consume("user", ConsumeOptions::immediate()).await.unwrap();
        assert!(
            limiter
                .consume("user", ConsumeOptions::immediate())
                .await
                .is_err()
        );

        limiter.reset("user").await.unwrap();
        assert!(store.is_empty());
        limiter.consume("user", ConsumeOptions::immediate()).await.unwrap();
    }
}
