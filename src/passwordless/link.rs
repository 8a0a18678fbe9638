//! 登录链接构建
//!
//! 把 Token ID 和验证码作为查询参数 `id` / `code` 附加到应用提供的 URL 上。
//! 非开发模式下只接受 `https` 链接。

use url::Url;

use crate::error::{Result, ValidationError};

/// 查询参数：Token ID
pub const TOKEN_ID_PARAM: &str = "id";
/// 查询参数：验证码
pub const PASS_CODE_PARAM: &str = "code";

/// 登录链接构建器
#[derive(Clone)]
pub struct LinkBuilder {
    token_id: String,
    pass_code: String,
    development_mode: bool,
}

impl std::fmt::Debug for LinkBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LinkBuilder")
            .field("token_id", &self.token_id)
            .field("pass_code", &"[REDACTED]")
            .field("development_mode", &self.development_mode)
            .finish()
    }
}

impl LinkBuilder {
    pub(crate) fn new(
        token_id: impl Into<String>,
        pass_code: impl Into<String>,
        development_mode: bool,
    ) -> Self {
        Self {
            token_id: token_id.into(),
            pass_code: pass_code.into(),
            development_mode,
        }
    }

    /// Token ID
    pub fn token_id(&self) -> &str {
        &self.token_id
    }

    /// 在 `url` 上附加 Token ID 和验证码
    ///
    /// 已有的查询参数保留；已有的 `id` / `code` 参数被替换。
    ///
    /// # Errors
    ///
    /// - URL 无法解析
    /// - 非开发模式下 scheme 不是 `https`
    pub fn with_code(&self, url: &str) -> Result<String> {
        let mut parsed =
            Url::parse(url).map_err(|e| ValidationError::InvalidLink(format!("{url}: {e}")))?;

        if parsed.scheme() != "https" && !self.development_mode {
            return Err(ValidationError::InsecureLink(url.to_string()).into());
        }

        let retained: Vec<(String, String)> = parsed
            .query_pairs()
            .filter(|(key, _)| key != TOKEN_ID_PARAM && key != PASS_CODE_PARAM)
            .map(|(key, value)| (key.into_owned(), value.into_owned()))
            .collect();

        parsed
            .query_pairs_mut()
            .clear()
            .extend_pairs(retained)
            .append_pair(TOKEN_ID_PARAM, &self.token_id)
            .append_pair(PASS_CODE_PARAM, &self.pass_code);

        Ok(parsed.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    #[test]
    fn test_with_code_https() {
        let builder = LinkBuilder::new("tok123", "654321", false);
        let link = builder.with_code("https://example.com/login").unwrap();
        assert_eq!(link, "https://example.com/login?id=tok123&code=654321");
    }

    #[test]
    fn test_with_code_keeps_existing_query() {
        let builder = LinkBuilder::new("tok123", "654321", false);
        let link = builder
            .with_code("https://example.com/login?next=%2Fhome&code=old")
            .unwrap();
        assert_eq!(
            link,
            "https://example.com/login?next=%2Fhome&id=tok123&code=654321"
        );
    }

    #[test]
    fn test_with_code_encodes_values() {
        let builder = LinkBuilder::new("tok", "a+b&c", false);
        let link = builder.with_code("https://example.com/").unwrap();
        assert_eq!(link, "https://example.com/?id=tok&code=a%2Bb%26c");
    }

    #[test]
    fn test_insecure_link_rejected() {
        let builder = LinkBuilder::new("tok123", "654321", false);
        let err = builder.with_code("http://example.com/login").unwrap_err();
        assert!(matches!(
            err,
            Error::Validation(ValidationError::InsecureLink(_))
        ));
    }

    #[test]
    fn test_insecure_link_allowed_in_development() {
        let builder = LinkBuilder::new("tok123", "654321", true);
        let link = builder.with_code("http://localhost:3000/login").unwrap();
        assert_eq!(link, "http://localhost:3000/login?id=tok123&code=654321");
    }

    #[test]
    fn test_invalid_link() {
        let builder = LinkBuilder::new("tok123", "654321", true);
        assert!(matches!(
            builder.with_code("not a url"),
            Err(Error::Validation(ValidationError::InvalidLink(_)))
        ));
    }

    #[test]
    fn test_debug_redacts_code() {
        let builder = LinkBuilder::new("tok123", "654321", false);
        assert!(!format!("{:?}", builder).contains("654321"));
    }
}
