//! 验证码生成器

use crate::error::Result;
use crate::random::{PassCodeEncoding, generate_pass_code};

/// 验证码生成接口
///
/// 必须使用密码学安全的随机源，并且恰好返回 `length` 个字符。
pub trait PassCodeGenerator: Send + Sync {
    /// 生成验证码
    fn generate(&self, length: usize, encoding: &PassCodeEncoding) -> Result<String>;
}

/// 默认生成器：由操作系统熵源播种的 CSPRNG（`rand::rng()`）
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomPassCodeGenerator;

impl PassCodeGenerator for RandomPassCodeGenerator {
    fn generate(&self, length: usize, encoding: &PassCodeEncoding) -> Result<String> {
        generate_pass_code(length, encoding)
    }
}
