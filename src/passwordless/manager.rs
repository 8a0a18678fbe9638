//! 无密码认证编排
//!
//! 组合三个独立的限流器和 [`LockById`]，实现 Token 的创建与验证：
//!
//! - `create_ip_*`：按 IP 的令牌桶，限制创建频率
//! - `create_user_*`：按用户的指数退避，验证成功后清零
//! - `verify_ip_*`：按 IP 的令牌桶，限制验证码猜测频率（与具体 Token 无关）
//!
//! Token 状态机：`Created -> {Verified | Exhausted | Expired}`，
//! 多次使用的 Token 验证成功后回到 `Created`，其余终态都会删除 Token。

use std::sync::Arc;

use tracing::{debug, info, instrument, warn};

use super::config::PasswordlessConfig;
use super::email::is_valid_email;
use super::generator::{PassCodeGenerator, RandomPassCodeGenerator};
use super::link::LinkBuilder;
use super::sender::{TokenDelivery, TokenSender};
use super::status::{CreateTokenStatus, VerifyPassCodeStatus};
use super::token::{InMemoryTokenStore, Token, TokenStore};
use crate::clock::{Clock, SystemClock};
use crate::error::{CryptoError, Error, Result, StorageError, ValidationError};
use crate::lock::LockById;
use crate::random::{constant_time_compare_str, hash_pass_code};
use crate::rate_limit::{
    Algorithm, ConsumeOptions, InMemoryRateLimitStore, RateLimitStore, RateLimiter, TryConsume,
};

fn create_ip_key(ip_address: &str) -> String {
    format!("create_ip_{ip_address}")
}

fn create_user_key(user_id: &str) -> String {
    format!("create_user_{user_id}")
}

fn verify_ip_key(ip_address: &str) -> String {
    format!("verify_ip_{ip_address}")
}

fn user_lock_key(user_id: &str) -> String {
    format!("user:{user_id}")
}

fn token_lock_key(token_id: &str) -> String {
    format!("token:{token_id}")
}

/// 创建 Token 的请求
#[derive(Debug, Clone, Default)]
pub struct CreateTokenRequest {
    /// 用户标识
    pub user_id: String,
    /// 客户端 IP
    pub ip_address: String,
    /// 不透明数据，验证成功后原样返回
    pub state: Option<String>,
    /// 客户端 User-Agent
    pub user_agent: Option<String>,
}

impl CreateTokenRequest {
    pub fn new(user_id: impl Into<String>, ip_address: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            ip_address: ip_address.into(),
            ..Self::default()
        }
    }

    /// 附带不透明数据
    pub fn with_state(mut self, state: impl Into<String>) -> Self {
        self.state = Some(state.into());
        self
    }

    /// 附带 User-Agent
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }
}

/// 验证验证码的请求
#[derive(Clone, Default)]
pub struct VerifyPassCodeRequest {
    /// Token ID
    pub token_id: String,
    /// 用户输入的验证码
    pub pass_code: String,
    /// 客户端 IP
    pub ip_address: String,
}

impl VerifyPassCodeRequest {
    pub fn new(
        token_id: impl Into<String>,
        pass_code: impl Into<String>,
        ip_address: impl Into<String>,
    ) -> Self {
        Self {
            token_id: token_id.into(),
            pass_code: pass_code.into(),
            ip_address: ip_address.into(),
        }
    }
}

impl std::fmt::Debug for VerifyPassCodeRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VerifyPassCodeRequest")
            .field("token_id", &self.token_id)
            .field("pass_code", &"[REDACTED]")
            .field("ip_address", &self.ip_address)
            .finish()
    }
}

/// [`PasswordlessAuthentication`] 构建器
pub struct PasswordlessBuilder {
    config: PasswordlessConfig,
    tokens: Arc<dyn TokenStore>,
    create_ip_store: Arc<dyn RateLimitStore>,
    create_user_store: Arc<dyn RateLimitStore>,
    verify_ip_store: Arc<dyn RateLimitStore>,
    generator: Arc<dyn PassCodeGenerator>,
    clock: Arc<dyn Clock>,
}

impl PasswordlessBuilder {
    fn new(config: PasswordlessConfig) -> Self {
        Self {
            config,
            tokens: Arc::new(InMemoryTokenStore::new()),
            create_ip_store: Arc::new(InMemoryRateLimitStore::new()),
            create_user_store: Arc::new(InMemoryRateLimitStore::new()),
            verify_ip_store: Arc::new(InMemoryRateLimitStore::new()),
            generator: Arc::new(RandomPassCodeGenerator),
            clock: Arc::new(SystemClock),
        }
    }

    /// 使用自定义 Token 存储
    pub fn token_store(mut self, store: Arc<dyn TokenStore>) -> Self {
        self.tokens = store;
        self
    }

    /// 按 IP 创建限流的存储
    pub fn create_ip_store(mut self, store: Arc<dyn RateLimitStore>) -> Self {
        self.create_ip_store = store;
        self
    }

    /// 按用户创建限流的存储
    pub fn create_user_store(mut self, store: Arc<dyn RateLimitStore>) -> Self {
        self.create_user_store = store;
        self
    }

    /// 按 IP 验证限流的存储
    pub fn verify_ip_store(mut self, store: Arc<dyn RateLimitStore>) -> Self {
        self.verify_ip_store = store;
        self
    }

    /// 使用自定义验证码生成器
    pub fn generator(mut self, generator: Arc<dyn PassCodeGenerator>) -> Self {
        self.generator = generator;
        self
    }

    /// 使用自定义时间源
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// 校验配置并构建
    pub fn build(self) -> Result<PasswordlessAuthentication> {
        self.config.validate()?;

        let clock = self.clock;
        let limiter = |algorithm: Algorithm, store: Arc<dyn RateLimitStore>| {
            RateLimiter::with_store(algorithm, store).with_clock(clock.clone())
        };

        Ok(PasswordlessAuthentication {
            create_ip_limiter: limiter(self.config.create_ip_limit.into(), self.create_ip_store),
            create_user_limiter: limiter(
                self.config.create_user_limit.into(),
                self.create_user_store,
            ),
            verify_ip_limiter: limiter(self.config.verify_ip_limit.into(), self.verify_ip_store),
            tokens: self.tokens,
            locks: LockById::new(),
            generator: self.generator,
            clock,
            config: self.config,
        })
    }
}

/// 无密码认证
///
/// ## 示例
///
/// ```rust
/// # tokio::runtime::Runtime::new().unwrap().block_on(async {
/// use async_trait::async_trait;
/// use passcode::passwordless::{
///     CreateTokenRequest, PasswordlessAuthentication, PasswordlessConfig, TokenDelivery,
///     TokenSender, VerifyPassCodeRequest, VerifyPassCodeStatus,
/// };
/// use std::sync::Mutex;
///
/// #[derive(Default)]
/// struct Outbox(Mutex<Vec<TokenDelivery>>);
///
/// #[async_trait]
/// impl TokenSender for Outbox {
///     async fn send_token_to_user(&self, delivery: TokenDelivery) -> passcode::Result<()> {
///         // 应用层负责发送邮件
///         let _link = delivery.with_code("https://example.com/login")?;
///         self.0.lock().unwrap().push(delivery);
///         Ok(())
///     }
/// }
///
/// let auth = PasswordlessAuthentication::new(PasswordlessConfig::default()).unwrap();
/// let outbox = Outbox::default();
///
/// let status = auth
///     .create_token(CreateTokenRequest::new("user@example.com", "203.0.113.7"), &outbox)
///     .await
///     .unwrap();
/// let token_id = status.token_id().unwrap().to_string();
/// let code = outbox.0.lock().unwrap()[0].pass_code.clone();
///
/// let status = auth
///     .verify_pass_code(VerifyPassCodeRequest::new(token_id, code, "203.0.113.7"))
///     .await
///     .unwrap();
/// assert!(matches!(status, VerifyPassCodeStatus::CorrectPassCode { .. }));
/// # });
/// ```
pub struct PasswordlessAuthentication {
    config: PasswordlessConfig,
    tokens: Arc<dyn TokenStore>,
    create_ip_limiter: RateLimiter,
    create_user_limiter: RateLimiter,
    verify_ip_limiter: RateLimiter,
    locks: LockById,
    generator: Arc<dyn PassCodeGenerator>,
    clock: Arc<dyn Clock>,
}

impl PasswordlessAuthentication {
    /// 使用内存存储创建
    pub fn new(config: PasswordlessConfig) -> Result<Self> {
        Self::builder(config).build()
    }

    /// 自定义存储、生成器或时间源
    pub fn builder(config: PasswordlessConfig) -> PasswordlessBuilder {
        PasswordlessBuilder::new(config)
    }

    /// 获取配置
    pub fn config(&self) -> &PasswordlessConfig {
        &self.config
    }

    /// 创建 Token 并通过 `sender` 发送验证码
    ///
    /// 依次检查：邮箱格式、按 IP 限流、按用户限流。限流可能让调用方等待
    /// 不超过 `consume_timeout` 的时间，超过时返回
    /// [`CreateTokenStatus::RateLimitExceeded`]。
    ///
    /// # Errors
    ///
    /// - 非邮箱模式下 `user_id` 为空
    /// - 生成器返回的验证码长度与配置不一致
    /// - 存储、生成器或发送方失败（原样返回）
    #[instrument(skip(self, request, sender), fields(user_id = %request.user_id, ip = %request.ip_address))]
    pub async fn create_token(
        &self,
        request: CreateTokenRequest,
        sender: &dyn TokenSender,
    ) -> Result<CreateTokenStatus> {
        if self.config.email_identities {
            if !is_valid_email(&request.user_id) {
                debug!("rejecting invalid email");
                return Ok(CreateTokenStatus::InvalidEmail {
                    email: request.user_id,
                });
            }
        } else if request.user_id.is_empty() {
            return Err(ValidationError::EmptyField("user_id".to_string()).into());
        }

        let options = ConsumeOptions::with_timeout(self.config.consume_timeout);
        let checks = [
            (&self.create_ip_limiter, create_ip_key(&request.ip_address)),
            (&self.create_user_limiter, create_user_key(&request.user_id)),
        ];
        for (limiter, key) in checks {
            match limiter.consume(&key, options).await {
                Ok(()) => {}
                Err(Error::RateLimitExceeded {
                    next_token_timestamp,
                }) => {
                    return Ok(CreateTokenStatus::RateLimitExceeded {
                        next_token_timestamp,
                    });
                }
                Err(e) => return Err(e),
            }
        }

        let pass_code = self
            .generator
            .generate(self.config.pass_code_length, &self.config.pass_code_encoding)?;
        let actual = pass_code.chars().count();
        if actual != self.config.pass_code_length {
            return Err(CryptoError::InvalidPassCodeLength {
                expected: self.config.pass_code_length,
                actual,
            }
            .into());
        }

        let token_id = self
            .locks
            .with_lock(&user_lock_key(&request.user_id), || {
                self.insert_token(&request, &pass_code)
            })
            .await?;

        let delivery = TokenDelivery {
            user_id: request.user_id,
            link: LinkBuilder::new(&token_id, &pass_code, self.config.development_mode),
            pass_code,
        };
        sender.send_token_to_user(delivery).await?;

        info!(token_id = %token_id, "token created");
        Ok(CreateTokenStatus::CreatedToken { token_id })
    }

    /// 在用户锁内写入新 Token，必要时先淘汰最旧的 Token
    async fn insert_token(&self, request: &CreateTokenRequest, pass_code: &str) -> Result<String> {
        let now = self.clock.now_millis();

        if let Some(max_active) = self.config.max_active_per_user {
            let mut active = self.tokens.list_for_user(&request.user_id).await?;
            if active.len() >= max_active {
                active.sort_by_key(|(_, token)| token.created);
                let excess = active.len() + 1 - max_active;
                for (token_id, _) in active.into_iter().take(excess) {
                    debug!(token_id = %token_id, "evicting oldest token");
                    // 锁顺序固定为 user -> token，验证路径只持有 token 锁
                    self.locks
                        .with_lock(&token_lock_key(&token_id), || self.tokens.remove(&token_id))
                        .await?;
                }
            }
        }

        self.tokens
            .insert(Token {
                user_id: request.user_id.clone(),
                pass_code_hash: hash_pass_code(pass_code),
                attempts_remaining: self.config.max_attempts,
                created: now,
                expiry: now.saturating_add(self.config.max_age_millis()),
                user_agent: request.user_agent.clone(),
                state: request.state.clone(),
                version: 1,
            })
            .await
    }

    /// 验证验证码
    ///
    /// 每次尝试都会先持久化递减后的尝试次数，再比较验证码。
    ///
    /// # Errors
    ///
    /// - `token_id` 或 `pass_code` 为空
    /// - 存储检测到版本冲突（[`crate::StorageError::VersionConflict`]）
    /// - 存储失败（原样返回）
    #[instrument(skip(self), fields(token_id = %request.token_id, ip = %request.ip_address))]
    pub async fn verify_pass_code(
        &self,
        request: VerifyPassCodeRequest,
    ) -> Result<VerifyPassCodeStatus> {
        if request.token_id.is_empty() {
            return Err(ValidationError::EmptyField("token_id".to_string()).into());
        }
        if request.pass_code.is_empty() {
            return Err(ValidationError::EmptyField("pass_code".to_string()).into());
        }

        let decision = self
            .verify_ip_limiter
            .try_consume(&verify_ip_key(&request.ip_address), ConsumeOptions::immediate())
            .await?;
        if let TryConsume::Denied {
            next_token_timestamp,
            ..
        } = decision
        {
            return Ok(VerifyPassCodeStatus::RateLimitExceeded {
                next_token_timestamp,
            });
        }

        self.locks
            .with_lock(&token_lock_key(&request.token_id), || {
                self.attempt(&request.token_id, &request.pass_code)
            })
            .await
    }

    /// 在 Token 锁内完成一次尝试
    async fn attempt(&self, token_id: &str, pass_code: &str) -> Result<VerifyPassCodeStatus> {
        let now = self.clock.now_millis();

        let Some(token) = self.tokens.load(token_id).await? else {
            return Ok(VerifyPassCodeStatus::ExpiredToken);
        };

        if token.is_expired(now) || token.is_exhausted() {
            debug!("removing expired token");
            self.tokens.remove(token_id).await?;
            return Ok(VerifyPassCodeStatus::ExpiredToken);
        }

        let attempted = token.attempted();
        match self
            .tokens
            .update(token_id, attempted.clone(), &token)
            .await
        {
            Ok(()) => {}
            // 读取之后被其他写入方删除
            Err(Error::Storage(StorageError::NotFound(_))) => {
                debug!("token removed during attempt");
                return Ok(VerifyPassCodeStatus::ExpiredToken);
            }
            Err(e) => {
                if e.is_version_conflict() {
                    warn!(error = %e, "concurrent token update detected");
                }
                return Err(e);
            }
        }

        if !self.pass_code_matches(pass_code, &attempted.pass_code_hash) {
            if attempted.is_exhausted() {
                warn!("token exhausted");
                self.tokens.remove(token_id).await?;
            }
            return Ok(VerifyPassCodeStatus::IncorrectPassCode {
                attempts_remaining: attempted.attempts_remaining,
            });
        }

        self.create_user_limiter
            .reset(&create_user_key(&attempted.user_id))
            .await?;

        if self.config.multi_use {
            let restored = Token {
                attempts_remaining: self.config.max_attempts,
                version: attempted.version + 1,
                ..attempted.clone()
            };
            self.tokens.update(token_id, restored, &attempted).await?;
        } else {
            self.tokens.remove(token_id).await?;
        }

        info!(user_id = %attempted.user_id, "pass code verified");
        Ok(VerifyPassCodeStatus::CorrectPassCode {
            user_id: attempted.user_id,
            state: attempted.state,
        })
    }

    /// 长度不同时直接拒绝，否则常量时间比较摘要
    fn pass_code_matches(&self, pass_code: &str, expected_hash: &str) -> bool {
        if pass_code.chars().count() != self.config.pass_code_length {
            return false;
        }
        constant_time_compare_str(&hash_pass_code(pass_code), expected_hash)
    }

    /// 撤销 Token
    pub async fn revoke_token(&self, token_id: &str) -> Result<()> {
        self.locks
            .with_lock(&token_lock_key(token_id), || self.tokens.remove(token_id))
            .await
    }

    /// 清理过期的 Token，返回删除数量
    ///
    /// 从未再次验证的过期 Token 只会在这里被删除，建议定期调用。
    pub async fn cleanup_expired(&self) -> Result<usize> {
        let removed = self.tokens.remove_expired(self.clock.now_millis()).await?;
        if removed > 0 {
            debug!(removed, "expired tokens removed");
        }
        Ok(removed)
    }

    /// 下一次可以为该 IP / 用户创建 Token 的时间（Unix 毫秒），不消耗配额
    pub async fn next_token_time(&self, ip_address: &str, user_id: &str) -> Result<i64> {
        let by_ip = self
            .create_ip_limiter
            .next_time(&create_ip_key(ip_address))
            .await?;
        let by_user = self
            .create_user_limiter
            .next_time(&create_user_key(user_id))
            .await?;
        Ok(by_ip.max(by_user))
    }
}
