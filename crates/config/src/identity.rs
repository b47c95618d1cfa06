//! Identity service configuration.

use std::{borrow::Cow, time::Duration};

use duration_str::deserialize_duration;
use serde::Deserialize;
use url::Url;

/// Where and how bearer credentials are verified.
///
/// Every protected request results in exactly one call to
/// `{url}{verify_path}`, bounded by `timeout`. Outcomes are never cached.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct IdentityConfig {
    /// Base URL of the identity service.
    pub url: Url,
    /// Path of the token verification endpoint.
    pub verify_path: Cow<'static, str>,
    /// Upper bound for a single verification call.
    #[serde(deserialize_with = "deserialize_duration")]
    pub timeout: Duration,
}

impl IdentityConfig {
    /// The full URL of the verification endpoint.
    ///
    /// The path is appended to any path prefix already present on `url`.
    pub fn verify_url(&self) -> Result<Url, url::ParseError> {
        crate::append_path(&self.url, &self.verify_path)
    }
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            url: Url::parse("http://localhost:8001").expect("static url is valid"),
            verify_path: Cow::Borrowed("/verify-token"),
            timeout: Duration::from_secs(5),
        }
    }
}
