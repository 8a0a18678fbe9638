//! 统一错误类型模块
//!
//! 预期的业务结果（验证码错误、过期、限流等）以状态枚举返回，
//! 这里只定义调用方契约违规和外部协作方（存储、发送、随机数）失败。

/// passcode 库的统一结果类型
pub type Result<T> = std::result::Result<T, Error>;

/// passcode 库的错误类型
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// 参数校验错误
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// 配置错误
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    /// 存储错误
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// 加密 / 随机数错误
    #[error("Crypto error: {0}")]
    Crypto(#[from] CryptoError),

    /// 速率限制超出
    ///
    /// `next_token_timestamp` 为下一次允许请求的时间（Unix 毫秒）。
    #[error("Rate limit exceeded, next token available at {next_token_timestamp}")]
    RateLimitExceeded {
        /// 下一个令牌可用的时间戳（毫秒）
        next_token_timestamp: i64,
    },

    /// 发送验证码失败
    #[error("Delivery error: {0}")]
    Delivery(String),

    /// 内部错误
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// 创建一个内部错误
    pub fn internal(msg: impl Into<String>) -> Self {
        Error::Internal(msg.into())
    }

    /// 创建一个验证错误
    ///
    /// 供 [`TokenSender`](crate::passwordless::TokenSender) 等应用侧实现拒绝输入时使用。
    pub fn validation(msg: impl Into<String>) -> Self {
        Error::Validation(ValidationError::Custom(msg.into()))
    }

    /// 创建一个速率限制错误
    pub fn rate_limited(next_token_timestamp: i64) -> Self {
        Error::RateLimitExceeded {
            next_token_timestamp,
        }
    }

    /// 创建一个发送错误
    pub fn delivery(msg: impl Into<String>) -> Self {
        Error::Delivery(msg.into())
    }

    /// 是否为乐观并发版本冲突
    pub fn is_version_conflict(&self) -> bool {
        matches!(self, Error::Storage(StorageError::VersionConflict { .. }))
    }
}

/// 验证相关错误
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    /// 字段为空
    #[error("field '{0}' cannot be empty")]
    EmptyField(String),
    /// 链接无法解析
    #[error("invalid link: {0}")]
    InvalidLink(String),
    /// 非开发模式下拒绝生成非 HTTPS 链接
    #[error("refusing to build a non-https link outside development mode: {0}")]
    InsecureLink(String),
    /// 自定义验证错误
    #[error("{0}")]
    Custom(String),
}

/// 配置相关错误
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// 无效的配置值
    #[error("invalid configuration value for '{key}': {message}")]
    InvalidValue { key: String, message: String },
}

impl ConfigError {
    pub(crate) fn invalid(key: impl Into<String>, message: impl Into<String>) -> Self {
        ConfigError::InvalidValue {
            key: key.into(),
            message: message.into(),
        }
    }
}

/// 存储相关错误
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StorageError {
    /// 连接失败
    ///
    /// 内置存储不会产生，供自定义 [`TokenStore`](crate::passwordless::TokenStore) /
    /// [`RateLimitStore`](crate::rate_limit::RateLimitStore) 实现使用。
    #[error("storage connection failed: {0}")]
    ConnectionFailed(String),
    /// 记录未找到
    #[error("not found: {0}")]
    NotFound(String),
    /// 记录已存在
    #[error("already exists: {0}")]
    AlreadyExists(String),
    /// 乐观并发检查失败：存储中的版本与调用方预期不一致
    #[error("version conflict for token {token_id}: expected {expected}, found {actual}")]
    VersionConflict {
        token_id: String,
        expected: u64,
        actual: u64,
    },
    /// 操作失败
    ///
    /// 同 [`StorageError::ConnectionFailed`]，供自定义存储实现使用。
    #[error("storage operation failed: {0}")]
    OperationFailed(String),
}

/// 加密相关错误
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CryptoError {
    /// 随机数生成失败
    #[error("random number generation failed: {0}")]
    RngFailed(String),
    /// 无效的字符集
    #[error("invalid alphabet: {0}")]
    InvalidAlphabet(String),
    /// 验证码生成器返回的长度与配置不符
    #[error("pass code generator returned {actual} characters, expected {expected}")]
    InvalidPassCodeLength { expected: usize, actual: usize },
}
