//! # passcode
//!
//! 基于一次性验证码的无密码认证库。
//!
//! ## 功能特性
//!
//! - **无密码认证**: Token 创建、验证码发送接口、验证码验证
//! - **速率限制**: 令牌桶和指数退避两种算法，状态存放在可替换的存储中
//! - **按 key 加锁**: 同一 key 的异步操作按到达顺序串行执行
//! - **安全随机数**: 密码学安全的验证码和 Token ID 生成
//!
//! 邮件 / 短信发送、HTTP 接口和会话管理不在本库范围内。
//!
//! ## 速率限制示例
//!
//! ```rust
//! # tokio::runtime::Runtime::new().unwrap().block_on(async {
//! use passcode::rate_limit::{Algorithm, ConsumeOptions, RateLimiter};
//!
//! // 每 10 秒补充一个令牌，最多 2 个
//! let limiter = RateLimiter::new(Algorithm::bucket(10_000, 2).unwrap());
//!
//! limiter.consume("ip_203.0.113.7", ConsumeOptions::immediate()).await.unwrap();
//! limiter.consume("ip_203.0.113.7", ConsumeOptions::immediate()).await.unwrap();
//! assert!(limiter.consume("ip_203.0.113.7", ConsumeOptions::immediate()).await.is_err());
//! # });
//! ```
//!
//! ## 按 key 加锁示例
//!
//! ```rust
//! # tokio::runtime::Runtime::new().unwrap().block_on(async {
//! use passcode::lock::LockById;
//!
//! let locks = LockById::new();
//! let value = locks.with_lock("user:alice", || async { 1 + 1 }).await;
//! assert_eq!(value, 2);
//! assert!(locks.is_empty());
//! # });
//! ```
//!
//! 无密码认证的完整示例见 [`passwordless`] 模块。

pub mod clock;
pub mod error;
pub mod lock;
pub mod passwordless;
pub mod random;
pub mod rate_limit;

pub use error::{
    ConfigError, CryptoError, Error, Result, StorageError, ValidationError,
};

// ============================================================================
// 基础设施导出
// ============================================================================

pub use clock::{Clock, ManualClock, SystemClock};
pub use lock::{LockById, LockGuard};

// ============================================================================
// 随机数生成函数导出
// ============================================================================

pub use random::{
    CharClasses, PassCodeEncoding, constant_time_compare, constant_time_compare_str,
    generate_pass_code, generate_random_base64_url, generate_random_bytes, generate_token_id,
    hash_pass_code,
};

// ============================================================================
// 速率限制导出
// ============================================================================

pub use rate_limit::{
    Algorithm, BucketParams, ConsumeOptions, ExponentialParams, InMemoryRateLimitStore,
    RateLimitState, RateLimitStore, RateLimiter, TryConsume,
};

// ============================================================================
// 无密码认证导出
// ============================================================================

pub use passwordless::{
    CreateTokenRequest, CreateTokenStatus, InMemoryTokenStore, PasswordlessAuthentication,
    PasswordlessConfig, TokenDelivery, TokenSender, TokenStore, VerifyPassCodeRequest,
    VerifyPassCodeStatus,
};
