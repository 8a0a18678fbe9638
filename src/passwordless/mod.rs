//! 无密码认证模块
//!
//! 通过一次性验证码完成登录：服务端生成 Token 和验证码，把验证码发给用户，
//! 用户提交 Token ID 和验证码后完成验证。
//!
//! ## 功能特性
//!
//! - **验证码**: 可配置长度和字符集，只保存 SHA-256 摘要
//! - **尝试次数**: 每次尝试都先持久化递减，再比较验证码
//! - **限流**: 创建按 IP / 用户限流，验证按 IP 限流
//! - **并发安全**: 同一用户 / 同一 Token 的操作串行执行，存储写入带版本号检查
//! - **登录链接**: 把 Token ID 和验证码附加到应用的登录地址上
//!
//! ## 设计原则
//!
//! 本模块只负责 Token 的生成和验证逻辑，**不包含**实际的邮件/短信发送功能。
//! 发送功能由应用层实现 [`TokenSender`]。
//!
//! ## 示例
//!
//! ```rust
//! # tokio::runtime::Runtime::new().unwrap().block_on(async {
//! use async_trait::async_trait;
//! use passcode::passwordless::{
//!     CreateTokenRequest, CreateTokenStatus, PasswordlessAuthentication, PasswordlessConfig,
//!     TokenDelivery, TokenSender, VerifyPassCodeRequest, VerifyPassCodeStatus,
//! };
//!
//! struct EmailSender;
//!
//! #[async_trait]
//! impl TokenSender for EmailSender {
//!     async fn send_token_to_user(&self, delivery: TokenDelivery) -> passcode::Result<()> {
//!         let link = delivery.with_code("https://example.com/auth/verify")?;
//!         // send_email(&delivery.user_id, &delivery.pass_code, &link);
//!         assert!(link.contains("code="));
//!         Ok(())
//!     }
//! }
//!
//! let auth = PasswordlessAuthentication::new(PasswordlessConfig::default()).unwrap();
//!
//! match auth
//!     .create_token(CreateTokenRequest::new("user@example.com", "203.0.113.7"), &EmailSender)
//!     .await
//!     .unwrap()
//! {
//!     CreateTokenStatus::CreatedToken { token_id } => {
//!         // 用户输入错误的验证码
//!         let status = auth
//!             .verify_pass_code(VerifyPassCodeRequest::new(token_id, "------", "203.0.113.7"))
//!             .await
//!             .unwrap();
//!         assert_eq!(
//!             status,
//!             VerifyPassCodeStatus::IncorrectPassCode { attempts_remaining: 2 }
//!         );
//!     }
//!     other => panic!("unexpected status: {other:?}"),
//! }
//! # });
//! ```
//!
//! ## 安全考虑
//!
//! - 验证码使用操作系统 CSPRNG 生成
//! - 存储中只有验证码摘要，比较使用常量时间
//! - 非开发模式下只生成 https 链接
//! - 过期或耗尽的 Token 在下一次访问时删除，也可以调用
//!   [`PasswordlessAuthentication::cleanup_expired`] 批量清理

pub mod config;
pub mod email;
pub mod generator;
pub mod link;
pub mod manager;
pub mod sender;
pub mod status;
pub mod token;

pub use config::PasswordlessConfig;
pub use email::is_valid_email;
pub use generator::{PassCodeGenerator, RandomPassCodeGenerator};
pub use link::{LinkBuilder, PASS_CODE_PARAM, TOKEN_ID_PARAM};
pub use manager::{
    CreateTokenRequest, PasswordlessAuthentication, PasswordlessBuilder, VerifyPassCodeRequest,
};
pub use sender::{TokenDelivery, TokenSender};
pub use status::{CreateTokenStatus, VerifyPassCodeStatus};
pub use token::{InMemoryTokenStore, Token, TokenStore};
