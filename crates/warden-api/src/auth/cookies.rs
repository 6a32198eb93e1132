//! Token cookies
//!
//! Both tokens are also delivered as `HttpOnly; SameSite=Strict` cookies so
//! browser clients never handle them in script.

use axum::http::header::{HeaderValue, COOKIE, SET_COOKIE};
use axum::http::HeaderMap;

pub const ACCESS_TOKEN_COOKIE: &str = "accessToken";
pub const REFRESH_TOKEN_COOKIE: &str = "refreshToken";
pub const SESSION_COOKIE: &str = "session-id";

/// One `Set-Cookie` value
#[derive(Debug, Clone)]
pub struct SecureCookie {
    pub name: String,
    pub value: String,
    pub path: String,
    /// Lifetime in seconds; 0 clears the cookie
    pub max_age: u64,
    pub http_only: bool,
    /// HTTPS only
    pub secure: bool,
}

impl SecureCookie {
    pub fn new(name: impl Into<String>, value: impl Into<String>, max_age: u64) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            path: "/".to_string(),
            max_age,
            http_only: true,
            secure: false,
        }
    }

    /// Expired, empty cookie that makes the browser drop `name`
    pub fn cleared(name: impl Into<String>) -> Self {
        Self::new(name, "", 0)
    }

    pub fn with_secure(mut self, secure: bool) -> Self {
        self.secure = secure;
        self
    }

    pub fn build(&self) -> String {
        let mut cookie = format!(
            "{}={}; Path={}; Max-Age={}",
            self.name, self.value, self.path, self.max_age
        );

        if self.http_only {
            cookie.push_str("; HttpOnly");
        }
        if self.secure {
            cookie.push_str("; Secure");
        }
        cookie.push_str("; SameSite=Strict");

        cookie
    }

    /// Append as a `Set-Cookie` header (several cookies may be set at once)
    pub fn append_to(&self, headers: &mut HeaderMap) {
        match HeaderValue::from_str(&self.build()) {
            Ok(value) => {
                headers.append(SET_COOKIE, value);
            }
            Err(e) => tracing::warn!(cookie = %self.name, error = %e, "Cookie value not representable"),
        }
    }
}

/// Value of cookie `name` from the request's `Cookie` headers
pub fn read_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value.trim().to_string())
        .filter(|value| !value.is_empty())
}
