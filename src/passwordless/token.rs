//! Token 与 Token 存储
//!
//! Token 记录一次验证码发放：所属用户、验证码摘要、剩余尝试次数、
//! 有效期和乐观并发版本号。Token 只由存储持有，核心逻辑不跨调用缓存。

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::RwLock;

use crate::error::{Error, Result, StorageError};
use crate::random::generate_token_id;

/// 一次进行中的无密码登录
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    /// 用户标识（通常是邮箱）
    pub user_id: String,

    /// 验证码的 SHA-256 摘要
    pub pass_code_hash: String,

    /// 剩余尝试次数，只减不增（多次使用的 Token 验证成功后除外）
    pub attempts_remaining: u32,

    /// 创建时间（Unix 毫秒）
    pub created: i64,

    /// 过期时间（Unix 毫秒）
    pub expiry: i64,

    /// 发起请求的 User-Agent
    pub user_agent: Option<String>,

    /// 调用方附带的不透明数据，例如登录后的跳转地址
    pub state: Option<String>,

    /// 乐观并发版本号，每次写入递增
    pub version: u64,
}

impl Token {
    /// 是否已过期
    pub fn is_expired(&self, now: i64) -> bool {
        self.expiry < now
    }

    /// 是否已耗尽尝试次数
    pub fn is_exhausted(&self) -> bool {
        self.attempts_remaining == 0
    }

    /// 记录一次尝试后的新版本
    pub fn attempted(&self) -> Self {
        Self {
            attempts_remaining: self.attempts_remaining.saturating_sub(1),
            version: self.version + 1,
            ..self.clone()
        }
    }
}

impl std::fmt::Debug for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Token")
            .field("user_id", &self.user_id)
            .field("pass_code_hash", &"[REDACTED]")
            .field("attempts_remaining", &self.attempts_remaining)
            .field("created", &self.created)
            .field("expiry", &self.expiry)
            .field("user_agent", &self.user_agent)
            .field("state", &self.state)
            .field("version", &self.version)
            .finish()
    }
}

// ============================================================================
// 存储接口
// ============================================================================

/// Token 存储接口
///
/// 实现此 trait 以提供自定义的存储后端（如 Redis、数据库等）。
/// `update` 必须比较 `expected.version` 与已存储的版本，不一致时拒绝写入。
#[async_trait]
pub trait TokenStore: Send + Sync {
    /// 插入 Token，返回新的 Token ID
    async fn insert(&self, token: Token) -> Result<String>;

    /// 读取 Token
    async fn load(&self, token_id: &str) -> Result<Option<Token>>;

    /// 按版本号比较后更新
    ///
    /// 存储中的版本与 `expected.version` 不一致时返回
    /// [`StorageError::VersionConflict`]；Token 不存在时返回
    /// [`StorageError::NotFound`]。
    async fn update(&self, token_id: &str, token: Token, expected: &Token) -> Result<()>;

    /// 删除 Token
    async fn remove(&self, token_id: &str) -> Result<()>;

    /// 用户的全部 Token
    async fn list_for_user(&self, user_id: &str) -> Result<Vec<(String, Token)>>;

    /// 删除所有在 `now` 之前过期的 Token，返回删除数量
    async fn remove_expired(&self, now: i64) -> Result<usize>;
}

// ============================================================================
// 内存存储实现
// ============================================================================

/// 内存存储实现
///
/// 适用于单实例部署或测试环境。
/// 生产环境建议使用带事务的数据库等共享存储。
#[derive(Debug, Default)]
pub struct InMemoryTokenStore {
    /// token id -> Token
    tokens: RwLock<HashMap<String, Token>>,
}

impl InMemoryTokenStore {
    /// 创建新的内存存储
    pub fn new() -> Self {
        Self::default()
    }

    /// 获取当前存储的 Token 数量
    pub fn len(&self) -> usize {
        self.tokens.read().map(|t| t.len()).unwrap_or(0)
    }

    /// 检查存储是否为空
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl TokenStore for InMemoryTokenStore {
    async fn insert(&self, token: Token) -> Result<String> {
        let token_id = generate_token_id()?;
        let mut tokens = self
            .tokens
            .write()
            .map_err(|_| Error::internal("Failed to acquire lock"))?;
        if tokens.contains_key(&token_id) {
            return Err(StorageError::AlreadyExists(token_id).into());
        }
        tokens.insert(token_id.clone(), token);
        Ok(token_id)
    }

    async fn load(&self, token_id: &str) -> Result<Option<Token>> {
        let tokens = self
            .tokens
            .read()
            .map_err(|_| Error::internal("Failed to acquire lock"))?;
        Ok(tokens.get(token_id).cloned())
    }

    async fn update(&self, token_id: &str, token: Token, expected: &Token) -> Result<()> {
        let mut tokens = self
            .tokens
            .write()
            .map_err(|_| Error::internal("Failed to acquire lock"))?;
        let stored = tokens
            .get_mut(token_id)
            .ok_or_else(|| StorageError::NotFound(token_id.to_string()))?;
        if stored.version != expected.version {
            return Err(StorageError::VersionConflict {
                token_id: token_id.to_string(),
                expected: expected.version,
                actual: stored.version,
            }
            .into());
        }
        *stored = token;
        Ok(())
    }

    async fn remove(&self, token_id: &str) -> Result<()> {
        let mut tokens = self
            .tokens
            .write()
            .map_err(|_| Error::internal("Failed to acquire lock"))?;
        tokens.remove(token_id);
        Ok(())
    }

    async fn list_for_user(&self, user_id: &str) -> Result<Vec<(String, Token)>> {
        let tokens = self
            .tokens
            .read()
            .map_err(|_| Error::internal("Failed to acquire lock"))?;
        Ok(tokens
            .iter()
            .filter(|(_, token)| token.user_id == user_id)
            .map(|(id, token)| (id.clone(), token.clone()))
            .collect())
    }

    async fn remove_expired(&self, now: i64) -> Result<usize> {
        let mut tokens = self
            .tokens
            .write()
            .map_err(|_| Error::internal("Failed to acquire lock"))?;
        let before = tokens.len();
        tokens.retain(|_, token| !token.is_expired(now));
        Ok(before - tokens.len())
    }
}
