//! 验证码发送接口
//!
//! 核心不负责邮件 / 短信的格式化和投递，只把验证码和链接构建器交给应用层。

use async_trait::async_trait;

use super::link::LinkBuilder;
use crate::error::Result;

/// 交给发送方的内容
#[derive(Debug, Clone)]
pub struct TokenDelivery {
    /// 接收方
    pub user_id: String,
    /// 验证码明文
    pub pass_code: String,
    /// 构建带验证码的登录链接
    pub link: LinkBuilder,
}

impl TokenDelivery {
    /// 在应用的登录地址上附加 Token ID 和验证码
    pub fn with_code(&self, url: &str) -> Result<String> {
        self.link.with_code(url)
    }
}

/// 验证码发送方
///
/// 通过集成第三方服务（如 SendGrid、Twilio 等）实现。返回的错误会原样
/// 传给 `create_token` 的调用方。
#[async_trait]
pub trait TokenSender: Send + Sync {
    /// 发送验证码
    async fn send_token_to_user(&self, delivery: TokenDelivery) -> Result<()>;
}
