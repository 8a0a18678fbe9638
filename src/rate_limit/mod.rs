//! 速率限制模块
//!
//! 提供两种通用限流算法及其提交 / 回滚协议，用于防止暴力破解和滥用。
//!
//! ## 组成
//!
//! - **algorithm**: 纯函数状态转移（令牌桶、指数退避）
//! - **store**: 可插拔的状态存储，默认内存实现
//! - **limiter**: 组合算法与存储的 [`RateLimiter`]
//!
//! ## 示例
//!
//! ```rust
//! # tokio::runtime::Runtime::new().unwrap().block_on(async {
//! use passcode::rate_limit::{Algorithm, ConsumeOptions, RateLimiter};
//! use passcode::Error;
//!
//! // 前 2 次尝试免费，之后延迟 30 秒、60 秒……
//! let limiter = RateLimiter::new(Algorithm::exponential(30_000, 2.0, 2).unwrap());
//!
//! let key = "create_user_alice@example.com";
//! limiter.consume(key, ConsumeOptions::default()).await.unwrap();
//! limiter.consume(key, ConsumeOptions::default()).await.unwrap();
//!
//! // 第三次需要等待 30 秒，超过默认 4 秒超时，直接拒绝
//! match limiter.consume(key, ConsumeOptions::default()).await {
//!     Err(Error::RateLimitExceeded { next_token_timestamp }) => {
//!         println!("请在 {} 之后重试", next_token_timestamp);
//!     }
//!     other => panic!("unexpected: {:?}", other),
//! }
//!
//! // 登录成功后清除退避状态
//! limiter.reset(key).await.unwrap();
//! # });
//! ```
//!
//! ## 多进程部署
//!
//! 内存存储只在单进程内有效。多实例部署时应提供带事务隔离的
//! [`RateLimitStore`] 实现并重写 [`RateLimitStore::transact`]。

pub mod algorithm;
pub mod limiter;
pub mod store;

pub use algorithm::{
    Algorithm, BucketParams, ExponentialParams, RateLimitState, bucket_take, exponential_take,
};
pub use limiter::{ConsumeOptions, DEFAULT_CONSUME_TIMEOUT, RateLimiter, TryConsume};
pub use store::{InMemoryRateLimitStore, RateLimitStore, Transition};
