//! 限流算法
//!
//! 纯函数状态转移：`(state, params, now) -> new_state`，不做任何 I/O。
//! 同样的输入总是得到同样的输出，因此可以直接用字面量元组测试。
//!
//! 时间戳均为 Unix 毫秒。`value` / `timestamp` 的溢出不做处理。

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, Result};

/// 限流状态
///
/// - 令牌桶：`value` 为剩余令牌数，`timestamp` 为上次补充时间
/// - 指数退避：`value` 为已尝试次数，`timestamp` 为下一次允许尝试的最早时间
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitState {
    pub value: u64,
    pub timestamp: i64,
}

impl RateLimitState {
    pub fn new(value: u64, timestamp: i64) -> Self {
        Self { value, timestamp }
    }
}

/// 令牌桶参数
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BucketParams {
    /// 补充一个令牌所需的毫秒数
    pub interval: i64,
    /// 桶容量
    pub max_size: u64,
}

impl BucketParams {
    /// 创建并校验参数
    pub fn new(interval: i64, max_size: u64) -> Result<Self> {
        let params = Self { interval, max_size };
        params.validate()?;
        Ok(params)
    }

    /// 校验参数有效性
    pub fn validate(&self) -> Result<()> {
        if self.interval <= 0 {
            return Err(ConfigError::invalid("interval", "must be greater than 0").into());
        }
        if self.max_size == 0 {
            return Err(ConfigError::invalid("max_size", "must be greater than 0").into());
        }
        Ok(())
    }
}

/// 指数退避参数
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ExponentialParams {
    /// 第一次需要等待时的延迟（毫秒）
    pub base_delay: i64,
    /// 每次尝试的延迟倍数
    pub factor: f64,
    /// 不产生延迟的尝试次数
    pub free_attempts: u64,
}

impl ExponentialParams {
    /// 创建并校验参数
    pub fn new(base_delay: i64, factor: f64, free_attempts: u64) -> Result<Self> {
        let params = Self {
            base_delay,
            factor,
            free_attempts,
        };
        params.validate()?;
        Ok(params)
    }

    /// 校验参数有效性
    pub fn validate(&self) -> Result<()> {
        if self.base_delay <= 0 {
            return Err(ConfigError::invalid("base_delay", "must be greater than 0").into());
        }
        if !self.factor.is_finite() || self.factor <= 0.0 {
            return Err(ConfigError::invalid("factor", "must be a positive number").into());
        }
        Ok(())
    }

    /// 第 `attempt_number` 次尝试（从 1 开始计数已完成的次数）对应的延迟
    pub fn delay_for(&self, attempt_number: u64) -> i64 {
        if attempt_number < self.free_attempts {
            return 0;
        }
        let exponent = (attempt_number - self.free_attempts) as f64;
        // f64 -> i64 在越界时饱和
        (self.base_delay as f64 * self.factor.powf(exponent)) as i64
    }
}

/// 令牌桶补充
fn bucket_refill(state: Option<RateLimitState>, params: &BucketParams, now: i64) -> RateLimitState {
    let Some(state) = state else {
        return RateLimitState::new(params.max_size, now);
    };

    // now 早于 timestamp 时不能减少令牌
    let elapsed = now.saturating_sub(state.timestamp).max(0);
    let increments = elapsed / params.interval;
    let value = state
        .value
        .saturating_add(increments as u64)
        .min(params.max_size);
    let timestamp = if value < params.max_size {
        state.timestamp + params.interval * increments
    } else {
        now
    };

    RateLimitState::new(value, timestamp)
}

/// 令牌桶取令牌
///
/// 有可用令牌时 `value - 1`；否则 `timestamp` 推进一个 `interval`，
/// 表示下一个令牌可用的时间。
pub fn bucket_take(state: Option<RateLimitState>, params: &BucketParams, now: i64) -> RateLimitState {
    let mut state = bucket_refill(state, params, now);
    if state.value > 0 && now >= state.timestamp {
        state.value -= 1;
    } else {
        state.timestamp += params.interval;
    }
    state
}

/// 指数退避取令牌
///
/// 前 `free_attempts` 次不产生延迟，之后延迟为
/// `base_delay * factor^(attempt - free_attempts)`。
pub fn exponential_take(
    state: Option<RateLimitState>,
    params: &ExponentialParams,
    now: i64,
) -> RateLimitState {
    let Some(state) = state else {
        return RateLimitState::new(1, now);
    };

    let delay = params.delay_for(state.value);
    RateLimitState::new(
        state.value + 1,
        state.timestamp.saturating_add(delay).max(now),
    )
}

/// 限流算法
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Algorithm {
    /// 令牌桶
    Bucket(BucketParams),
    /// 指数退避
    Exponential(ExponentialParams),
}

impl Algorithm {
    /// 创建令牌桶算法
    pub fn bucket(interval: i64, max_size: u64) -> Result<Self> {
        Ok(Algorithm::Bucket(BucketParams::new(interval, max_size)?))
    }

    /// 创建指数退避算法
    pub fn exponential(base_delay: i64, factor: f64, free_attempts: u64) -> Result<Self> {
        Ok(Algorithm::Exponential(ExponentialParams::new(
            base_delay,
            factor,
            free_attempts,
        )?))
    }

    /// 校验参数
    pub fn validate(&self) -> Result<()> {
        match self {
            Algorithm::Bucket(params) => params.validate(),
            Algorithm::Exponential(params) => params.validate(),
        }
    }

    /// 状态转移
    pub fn take(&self, state: Option<RateLimitState>, now: i64) -> RateLimitState {
        match self {
            Algorithm::Bucket(params) => bucket_take(state, params, now),
            Algorithm::Exponential(params) => exponential_take(state, params, now),
        }
    }
}

impl From<BucketParams> for Algorithm {
    fn from(params: BucketParams) -> Self {
        Algorithm::Bucket(params)
    }
}

impl From<ExponentialParams> for Algorithm {
    fn from(params: ExponentialParams) -> Self {
        Algorithm::Exponential(params)
    }
}
