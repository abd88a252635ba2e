use std::fmt;

use http::request::Parts;

/// Identity of a cacheable request.
///
/// Two requests share cache entries and in-flight fetches iff both the
/// method and the request target (path + query, exactly as received) are
/// byte-equal. No normalization is applied.
#[derive(Clone, Hash, Eq, PartialEq, Debug)]
pub struct CacheKey {
    pub method: String,
    pub uri: String,
}

impl CacheKey {
    pub fn new(method: &str, uri: &str) -> Self {
        Self {
            method: method.to_string(),
            uri: uri.to_string(),
        }
    }

    pub fn from_parts(parts: &Parts) -> Self {
        Self::new(parts.method.as_str(), &parts.uri.to_string())
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.method, self.uri)
    }
}
