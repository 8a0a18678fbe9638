//! 业务结果
//!
//! 邮箱无效、限流、过期、验证码错误都是预期结果，以枚举返回而不是错误。

use serde::{Deserialize, Serialize};

/// `create_token` 的结果
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CreateTokenStatus {
    /// 已创建并发送
    CreatedToken { token_id: String },
    /// 用户标识不是合法邮箱
    InvalidEmail { email: String },
    /// 触发限流
    RateLimitExceeded { next_token_timestamp: i64 },
}

impl CreateTokenStatus {
    /// 创建成功时返回 Token ID
    pub fn token_id(&self) -> Option<&str> {
        match self {
            CreateTokenStatus::CreatedToken { token_id } => Some(token_id),
            _ => None,
        }
    }
}

/// `verify_pass_code` 的结果
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum VerifyPassCodeStatus {
    /// 验证码正确
    CorrectPassCode {
        user_id: String,
        state: Option<String>,
    },
    /// Token 不存在、已过期或已耗尽
    ExpiredToken,
    /// 验证码错误
    IncorrectPassCode { attempts_remaining: u32 },
    /// 触发限流
    RateLimitExceeded { next_token_timestamp: i64 },
}

impl VerifyPassCodeStatus {
    /// 是否验证成功
    pub fn is_correct(&self) -> bool {
        matches!(self, VerifyPassCodeStatus::CorrectPassCode { .. })
    }
}
