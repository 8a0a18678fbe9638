//! 邮箱格式检查

use regex::Regex;
use std::sync::LazyLock;

static EMAIL: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").ok());

/// 基本的邮箱语法检查（`local@domain.tld`，不含空白）
pub fn is_valid_email(email: &str) -> bool {
    EMAIL
        .as_ref()
        .is_some_and(|regex| regex.is_match(email))
}
