//! 安全随机数生成模块
//!
//! 提供密码学安全的随机数生成功能，用于生成验证码和 Token ID，
//! 以及验证码摘要和常量时间比较。

use rand::{Rng, TryRngCore, rngs::OsRng};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::{CryptoError, Error, Result};

const DECIMAL: &str = "0123456789";
const HEX: &str = "0123456789abcdef";
const BASE32: &str = "ABCDEFGHIJKLMNOPQRSTUVWXYZ234567";
const BASE64_URL: &str = "ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789-_";
const BASE91: &str = "ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789!#$%&()*+,./:;<=>?@[]^_`{|}~\"";
const LOWERCASE: &str = "abcdefghijklmnopqrstuvwxyz";
const UPPERCASE: &str = "ABCDEFGHIJKLMNOPQRSTUVWXYZ";
const SYMBOLS: &str = "!#$%&()*+,-./:;<=>?@[]^_{|}~";

/// 自定义字符集组合
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CharClasses {
    pub lowercase: bool,
    pub uppercase: bool,
    pub digits: bool,
    pub symbols: bool,
}

impl CharClasses {
    /// 生成字符表，至少需要选中一类
    pub fn alphabet(&self) -> Result<String> {
        let mut alphabet = String::new();
        if self.lowercase {
            alphabet.push_str(LOWERCASE);
        }
        if self.uppercase {
            alphabet.push_str(UPPERCASE);
        }
        if self.digits {
            alphabet.push_str(DECIMAL);
        }
        if self.symbols {
            alphabet.push_str(SYMBOLS);
        }
        if alphabet.is_empty() {
            return Err(CryptoError::InvalidAlphabet(
                "at least one character class must be enabled".to_string(),
            )
            .into());
        }
        Ok(alphabet)
    }
}

/// 验证码字符集
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PassCodeEncoding {
    /// 数字 0-9
    #[default]
    Decimal,
    /// 小写十六进制
    Hex,
    /// RFC 4648 base32 字母表（大写）
    Base32,
    /// URL 安全的 base64 字母表
    Base64,
    /// basE91 字母表
    Base91,
    /// 自定义字符类组合
    Custom(CharClasses),
}

impl PassCodeEncoding {
    /// 对应的字符表
    pub fn alphabet(&self) -> Result<String> {
        Ok(match self {
            PassCodeEncoding::Decimal => DECIMAL.to_string(),
            PassCodeEncoding::Hex => HEX.to_string(),
            PassCodeEncoding::Base32 => BASE32.to_string(),
            PassCodeEncoding::Base64 => BASE64_URL.to_string(),
            PassCodeEncoding::Base91 => BASE91.to_string(),
            PassCodeEncoding::Custom(classes) => classes.alphabet()?,
        })
    }
}

/// 生成指定长度的随机字节数组
///
/// 使用操作系统提供的密码学安全随机数生成器 (CSPRNG)
///
/// # Example
///
/// ```rust
/// use passcode::random::generate_random_bytes;
///
/// let bytes = generate_random_bytes(32).unwrap();
/// assert_eq!(bytes.len(), 32);
/// ```
pub fn generate_random_bytes(length: usize) -> Result<Vec<u8>> {
    let mut bytes = vec![0u8; length];
    OsRng
        .try_fill_bytes(&mut bytes)
        .map_err(|e| Error::Crypto(CryptoError::RngFailed(format!("{:?}", e))))?;
    Ok(bytes)
}

/// 生成指定长度的 Base64 URL 安全随机字符串
///
/// 使用 URL 安全的 Base64 编码（不含填充），可直接放进查询参数
pub fn generate_random_base64_url(byte_length: usize) -> Result<String> {
    use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
    let bytes = generate_random_bytes(byte_length)?;
    Ok(URL_SAFE_NO_PAD.encode(&bytes))
}

/// 生成 Token ID（128 位随机数）
pub fn generate_token_id() -> Result<String> {
    generate_random_base64_url(16)
}

/// 生成验证码
///
/// 每个字符独立、均匀地从字符表中选取，结果恰好 `length` 个字符。
///
/// # Example
///
/// ```rust
/// use passcode::random::{generate_pass_code, PassCodeEncoding};
///
/// let code = generate_pass_code(6, &PassCodeEncoding::Decimal).unwrap();
/// assert_eq!(code.len(), 6);
/// assert!(code.chars().all(|c| c.is_ascii_digit()));
/// ```
pub fn generate_pass_code(length: usize, encoding: &PassCodeEncoding) -> Result<String> {
    let alphabet: Vec<char> = encoding.alphabet()?.chars().collect();
    let mut rng = rand::rng();
    Ok((0..length)
        .map(|_| alphabet[rng.random_range(0..alphabet.len())])
        .collect())
}

/// 计算验证码摘要（SHA-256，小写十六进制）
///
/// 存储中只保存摘要，不保存验证码明文。
pub fn hash_pass_code(pass_code: &str) -> String {
    let digest = Sha256::digest(pass_code.as_bytes());
    hex_encode(&digest)
}

// ============================================================================
// 辅助函数
// ============================================================================

/// 将字节数组编码为十六进制字符串
fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

/// 常量时间比较两个字节切片
///
/// 长度不同时立即返回 false，长度本身不是秘密。
///
/// # Example
///
/// ```rust
/// use passcode::random::constant_time_compare;
///
/// assert!(constant_time_compare(b"secret_token", b"secret_token"));
/// assert!(!constant_time_compare(b"secret_token", b"other_token!"));
/// ```
pub fn constant_time_compare(a: &[u8], b: &[u8]) -> bool {
    use subtle::ConstantTimeEq;
    if a.len() != b.len() {
        return false;
    }
    a.ct_eq(b).into()
}

/// 常量时间比较两个字符串
pub fn constant_time_compare_str(a: &str, b: &str) -> bool {
    constant_time_compare(a.as_bytes(), b.as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_generate_random_bytes() {
        let bytes = generate_random_bytes(32).unwrap();
        assert_eq!(bytes.len(), 32);

        // 两次生成不应相同
        let bytes2 = generate_random_bytes(32).unwrap();
        assert_ne!(bytes, bytes2);
    }

    #[test]
    fn test_generate_token_id() {
        let id = generate_token_id().unwrap();
        // 16 字节 -> 22 个 base64 字符
        assert_eq!(id.len(), 22);
        assert!(!id.contains('+'));
        assert!(!id.contains('/'));
        assert!(!id.contains('='));
    }

    #[test]
    fn test_alphabet_sizes() {
        assert_eq!(PassCodeEncoding::Decimal.alphabet().unwrap().len(), 10);
        assert_eq!(PassCodeEncoding::Hex.alphabet().unwrap().len(), 16);
        assert_eq!(PassCodeEncoding::Base32.alphabet().unwrap().len(), 32);
        assert_eq!(PassCodeEncoding::Base64.alphabet().unwrap().len(), 64);
        assert_eq!(PassCodeEncoding::Base91.alphabet().unwrap().len(), 91);

        let unique: HashSet<char> = BASE91.chars().collect();
        assert_eq!(unique.len(), 91);
    }

    #[test]
    fn test_generate_pass_code_lengths() {
        for encoding in [
            PassCodeEncoding::Decimal,
            PassCodeEncoding::Hex,
            PassCodeEncoding::Base32,
            PassCodeEncoding::Base64,
            PassCodeEncoding::Base91,
        ] {
            let alphabet = encoding.alphabet().unwrap();
            for length in [1, 6, 12, 32] {
                let code = generate_pass_code(length, &encoding).unwrap();
                assert_eq!(code.chars().count(), length);
                assert!(code.chars().all(|c| alphabet.contains(c)));
            }
        }
    }

    #[test]
    fn test_custom_char_classes() {
        let encoding = PassCodeEncoding::Custom(CharClasses {
            lowercase: false,
            uppercase: true,
            digits: true,
            symbols: false,
        });
        let code = generate_pass_code(64, &encoding).unwrap();
        assert!(
            code.chars()
                .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit())
        );

        let empty = PassCodeEncoding::Custom(CharClasses {
            lowercase: false,
            uppercase: false,
            digits: false,
            symbols: false,
        });
        assert!(matches!(
            generate_pass_code(6, &empty),
            Err(Error::Crypto(CryptoError::InvalidAlphabet(_)))
        ));
    }

    #[test]
    fn test_hash_pass_code() {
        let hash = hash_pass_code("123456");
        assert_eq!(hash.len(), 64);
        assert_eq!(
            hash,
            "8d969eef6ecad3c29a3a629280e686cf0c3f5d5a86aff3ca12020c923adc6c92"
        );
        assert_ne!(hash, hash_pass_code("123457"));
    }

    #[test]
    fn test_constant_time_compare() {
        assert!(constant_time_compare(b"hello", b"hello"));
        assert!(!constant_time_compare(b"hello", b"world"));
        assert!(!constant_time_compare(b"hello", b"hell"));
    }

    #[test]
    fn test_constant_time_compare_str() {
        assert!(constant_time_compare_str("secret", "secret"));
        assert!(!constant_time_compare_str("secret", "Secret"));
    }

    #[test]
    fn test_hex_encode() {
        assert_eq!(hex_encode(&[0x00, 0xff, 0x10]), "00ff10");
        assert_eq!(hex_encode(&[0xde, 0xad, 0xbe, 0xef]), "deadbeef");
    }
}
