//! Response cache key layout
//!
//! Keys are colon-delimited: `<METHOD>:<user id | anonymous>:<original url>`.
//! The URL keeps its query string so `/products?page=1` and
//! `/products?page=2` are cached separately.

use std::fmt;

use super::pattern::escape_glob;

/// User segment used when the request carries no authenticated user
pub const ANONYMOUS_USER: &str = "anonymous";

/// Cache key for one HTTP response
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResponseCacheKey {
    method: String,
    user: String,
    url: String,
}

impl ResponseCacheKey {
    /// Builds a key from the request method, optional user id and original URL
    pub fn new(method: impl Into<String>, user: Option<&str>, url: impl Into<String>) -> Self {
        let user = match user {
            Some(id) if !id.is_empty() => id.to_string(),
            _ => ANONYMOUS_USER.to_string(),
        };

        Self {
            method: method.into().to_uppercase(),
            user,
            url: url.into(),
        }
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    pub fn user(&self) -> &str {
        &self.user
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn is_anonymous(&self) -> bool {
        self.user == ANONYMOUS_USER
    }

    /// Splits a stored key back into its segments
    ///
    /// The method ends at the first `:` and the URL starts at the first `:/`
    /// after it, so colons inside the URL or the user id stay where they belong.
    pub fn parse(key: &str) -> Option<Self> {
        let (method, rest) = key.split_once(':')?;
        let split = rest.find(":/")?;
        let (user, url) = (&rest[..split], &rest[split + 1..]);

        if method.is_empty() || user.is_empty() {
            return None;
        }

        Some(Self {
            method: method.to_string(),
            user: user.to_string(),
            url: url.to_string(),
        })
    }
}

impl fmt::Display for ResponseCacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.method, self.user, self.url)
    }
}

impl From<ResponseCacheKey> for String {
    fn from(key: ResponseCacheKey) -> Self {
        key.to_string()
    }
}

/// Pattern matching every entry owned by `user_id`, whatever the method or URL
pub fn user_pattern(user_id: &str) -> String {
    format!("*:{}:*", escape_glob(user_id))
}

/// Pattern matching every GET entry whose URL starts with `endpoint`, for any user
pub fn endpoint_pattern(endpoint: &str) -> String {
    format!("GET:*:{}*", escape_glob(endpoint))
}

/// Group of cached responses targeted by an invalidation
///
/// [`pattern`](Self::pattern) narrows the store scan. A glob `*` also spans
/// the `:` separators, so every candidate is confirmed with
/// [`matches`](Self::matches) before it is deleted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeySelector {
    /// Every entry owned by one user, any method or URL
    User(String),
    /// Every GET entry whose URL starts with the prefix, any user
    Endpoint(String),
}

impl KeySelector {
    pub fn pattern(&self) -> String {
        match self {
            Self::User(id) => user_pattern(id),
            Self::Endpoint(endpoint) => endpoint_pattern(endpoint),
        }
    }

    pub fn matches(&self, key: &str) -> bool {
        let Some(key) = ResponseCacheKey::parse(key) else {
            return false;
        };

        match self {
            Self::User(id) => key.user == *id,
            Self::Endpoint(endpoint) => {
                key.method == "GET" && key.url.starts_with(endpoint.as_str())
            }
        }
    }
}
