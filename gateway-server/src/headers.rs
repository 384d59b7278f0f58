use axum::http::HeaderValue;
use axum::response::Response;
use http::header::{CACHE_CONTROL, EXPIRES, PRAGMA};

/// Cache-Control directives
#[derive(Debug, Clone, Default)]
pub struct CacheControl {
    pub no_cache: bool,
    pub no_store: bool,
    pub private: bool,
    pub max_age: Option<u32>,
}

impl CacheControl {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn no_cache(mut self) -> Self {
        self.no_cache = true;
        self
    }

    pub fn no_store(mut self) -> Self {
        self.no_store = true;
        self
    }

    pub fn private(mut self) -> Self {
        self.private = true;
        self
    }

    pub fn max_age(mut self, seconds: u32) -> Self {
        self.max_age = Some(seconds);
        self
    }

    pub fn to_header_value(&self) -> HeaderValue {
        let mut parts = Vec::new();

        if self.no_cache {
            parts.push("no-cache".to_string());
        }
        if self.no_store {
            parts.push("no-store".to_string());
        }
        if self.private {
            parts.push("private".to_string());
        }
        if let Some(max_age) = self.max_age {
            parts.push(format!("max-age={max_age}"));
        }

        HeaderValue::from_str(&parts.join(", ")).unwrap_or(HeaderValue::from_static("no-store"))
    }

    /// Apply the directives to a response. `no-cache` also sets the legacy
    /// `Pragma` header, and non-cacheable responses expire immediately.
    pub fn apply(&self, response: &mut Response) {
        let headers = response.headers_mut();
        headers.insert(CACHE_CONTROL, self.to_header_value());

        if self.no_cache {
            headers.insert(PRAGMA, HeaderValue::from_static("no-cache"));
        }
        if self.no_store || self.no_cache {
            headers.insert(EXPIRES, HeaderValue::from_static("0"));
        }
    }
}

/// Common cache control presets
pub mod presets {
    use super::*;

    /// Token endpoint responses must never be cached (RFC 6749 section 5.1)
    pub fn no_store() -> CacheControl {
        CacheControl::new().no_store().no_cache()
    }

    /// Device data is per-credential
    pub fn private_short(max_age_seconds: u32) -> CacheControl {
        CacheControl::new().private().max_age(max_age_seconds)
    }
}
