//! 无密码认证配置

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{ConfigError, Result};
use crate::rate_limit::{BucketParams, DEFAULT_CONSUME_TIMEOUT, ExponentialParams};
use crate::random::PassCodeEncoding;

/// 无密码认证配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PasswordlessConfig {
    /// 验证码长度（字符数）
    pub pass_code_length: usize,

    /// 验证码字符集
    pub pass_code_encoding: PassCodeEncoding,

    /// 每个 Token 允许的最大尝试次数
    pub max_attempts: u32,

    /// Token 有效期
    pub max_age: Duration,

    /// 验证成功后 Token 是否继续有效（直到过期）
    pub multi_use: bool,

    /// 用户标识是否必须是邮箱
    pub email_identities: bool,

    /// 开发模式：允许生成非 HTTPS 链接
    pub development_mode: bool,

    /// 每个用户最多同时存在的 Token 数量，超过时删除最旧的
    pub max_active_per_user: Option<usize>,

    /// 按 IP 限制创建 Token 的频率
    pub create_ip_limit: BucketParams,

    /// 按用户限制创建 Token 的频率，验证成功后清零
    pub create_user_limit: ExponentialParams,

    /// 按 IP 限制验证码尝试的频率
    pub verify_ip_limit: BucketParams,

    /// 创建 Token 时愿意等待限流的最长时间
    pub consume_timeout: Duration,
}

impl Default for PasswordlessConfig {
    fn default() -> Self {
        Self {
            pass_code_length: 6,
            pass_code_encoding: PassCodeEncoding::Decimal,
            max_attempts: 3,
            max_age: Duration::from_secs(5 * 60), // 5 分钟
            multi_use: false,
            email_identities: true,
            development_mode: false,
            max_active_per_user: Some(3),
            create_ip_limit: BucketParams {
                interval: 10_000,
                max_size: 20,
            },
            create_user_limit: ExponentialParams {
                base_delay: 2_000,
                factor: 2.0,
                free_attempts: 2,
            },
            verify_ip_limit: BucketParams {
                interval: 1_000,
                max_size: 10,
            },
            consume_timeout: DEFAULT_CONSUME_TIMEOUT,
        }
    }
}

impl PasswordlessConfig {
    /// 创建新配置
    pub fn new() -> Self {
        Self::default()
    }

    /// 设置验证码长度
    pub fn with_pass_code_length(mut self, length: usize) -> Self {
        self.pass_code_length = length;
        self
    }

    /// 设置验证码字符集
    pub fn with_pass_code_encoding(mut self, encoding: PassCodeEncoding) -> Self {
        self.pass_code_encoding = encoding;
        self
    }

    /// 设置最大尝试次数
    pub fn with_max_attempts(mut self, max: u32) -> Self {
        self.max_attempts = max;
        self
    }

    /// 设置有效期
    pub fn with_max_age(mut self, max_age: Duration) -> Self {
        self.max_age = max_age;
        self
    }

    /// 设置是否允许多次使用
    pub fn with_multi_use(mut self, multi_use: bool) -> Self {
        self.multi_use = multi_use;
        self
    }

    /// 设置是否要求邮箱格式的用户标识
    pub fn with_email_identities(mut self, enabled: bool) -> Self {
        self.email_identities = enabled;
        self
    }

    /// 设置开发模式
    pub fn with_development_mode(mut self, enabled: bool) -> Self {
        self.development_mode = enabled;
        self
    }

    /// 设置每用户最大活跃 Token 数
    pub fn with_max_active_per_user(mut self, max: Option<usize>) -> Self {
        self.max_active_per_user = max;
        self
    }

    /// 设置按 IP 的创建限流
    pub fn with_create_ip_limit(mut self, params: BucketParams) -> Self {
        self.create_ip_limit = params;
        self
    }

    /// 设置按用户的创建限流
    pub fn with_create_user_limit(mut self, params: ExponentialParams) -> Self {
        self.create_user_limit = params;
        self
    }

    /// 设置按 IP 的验证限流
    pub fn with_verify_ip_limit(mut self, params: BucketParams) -> Self {
        self.verify_ip_limit = params;
        self
    }

    /// 设置创建 Token 时的限流等待上限
    pub fn with_consume_timeout(mut self, timeout: Duration) -> Self {
        self.consume_timeout = timeout;
        self
    }

    /// 高安全性配置
    ///
    /// - 8 位验证码
    /// - 3 分钟过期
    /// - 最多 3 次尝试
    /// - 每用户 1 个活跃 Token
    pub fn high_security() -> Self {
        Self {
            pass_code_length: 8,
            max_age: Duration::from_secs(3 * 60),
            max_attempts: 3,
            max_active_per_user: Some(1),
            create_user_limit: ExponentialParams {
                base_delay: 5_000,
                factor: 2.0,
                free_attempts: 1,
            },
            ..Self::default()
        }
    }

    /// 宽松配置（适用于开发/测试）
    ///
    /// - 4 位验证码
    /// - 30 分钟过期
    /// - 10 次尝试
    /// - 允许 http 链接
    pub fn relaxed() -> Self {
        Self {
            pass_code_length: 4,
            max_age: Duration::from_secs(30 * 60),
            max_attempts: 10,
            development_mode: true,
            max_active_per_user: None,
            ..Self::default()
        }
    }

    /// 验证配置有效性
    pub fn validate(&self) -> Result<()> {
        if self.pass_code_length == 0 {
            return Err(ConfigError::invalid("pass_code_length", "must be greater than 0").into());
        }
        if self.max_attempts == 0 {
            return Err(ConfigError::invalid("max_attempts", "must be greater than 0").into());
        }
        if self.max_age.is_zero() {
            return Err(ConfigError::invalid("max_age", "must be greater than 0").into());
        }
        if self.max_active_per_user == Some(0) {
            return Err(
                ConfigError::invalid("max_active_per_user", "must be greater than 0").into(),
            );
        }
        self.pass_code_encoding.alphabet()?;
        self.create_ip_limit.validate()?;
        self.create_user_limit.validate()?;
        self.verify_ip_limit.validate()?;
        Ok(())
    }

    /// 有效期（毫秒）
    pub(crate) fn max_age_millis(&self) -> i64 {
        i64::try_from(self.max_age.as_millis()).unwrap_or(i64::MAX)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    #[test]
    fn test_default_config_is_valid() {
        let config = PasswordlessConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.pass_code_length, 6);
        assert_eq!(config.max_attempts, 3);
        assert_eq!(config.consume_timeout, Duration::from_millis(4000));
        assert_eq!(config.max_age_millis(), 300_000);
    }

    #[test]
    fn test_presets() {
        let config = PasswordlessConfig::high_security();
        assert_eq!(config.pass_code_length, 8);
        assert_eq!(config.max_age, Duration::from_secs(180));
        assert!(config.validate().is_ok());

        let config = PasswordlessConfig::relaxed();
        assert_eq!(config.pass_code_length, 4);
        assert!(config.development_mode);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_invalid_config() {
        assert!(matches!(
            PasswordlessConfig::new().with_max_attempts(0).validate(),
            Err(Error::Config(_))
        ));
        assert!(
            PasswordlessConfig::new()
                .with_pass_code_length(0)
                .validate()
                .is_err()
        );
        assert!(
            PasswordlessConfig::new()
                .with_max_age(Duration::ZERO)
                .validate()
                .is_err()
        );
        assert!(
            PasswordlessConfig::new()
                .with_max_active_per_user(Some(0))
                .validate()
                .is_err()
        );
        assert!(
            PasswordlessConfig::new()
                .with_verify_ip_limit(BucketParams {
                    interval: 0,
                    max_size: 1
                })
                .validate()
                .is_err()
        );
    }

    #[test]
    fn test_config_roundtrips_through_json() {
        let config = PasswordlessConfig::high_security().with_multi_use(true);
        let json = serde_json::to_string(&config).unwrap();
        let parsed: PasswordlessConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, config);
    }
}
