use http::{HeaderMap, header::AUTHORIZATION};
use secrecy::{ExposeSecret, SecretString};

/// An opaque bearer token taken from the `Authorization` header.
///
/// The token is only ever forwarded to the identity service. Its `Debug` output is redacted.
#[derive(Debug, Clone)]
pub struct Credential(SecretString);

impl Credential {
    /// Wraps a raw token. Blank tokens are treated as absent.
    pub fn new(token: impl Into<String>) -> Option<Self> {
        let token = token.into();

        if token.trim().is_empty() {
            return None;
        }

        Some(Self(SecretString::from(token)))
    }

    /// Extracts the bearer token from request headers.
    ///
    /// A missing header, a non-bearer scheme or an empty token all yield `None`, which callers
    /// must reject locally without contacting the identity service.
    pub fn from_headers(headers: &HeaderMap) -> Option<Self> {
        let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
        let (scheme, token) = value.trim().split_once(' ')?;

        if !scheme.eq_ignore_ascii_case("bearer") {
            return None;
        }

        Self::new(token.trim())
    }

    pub(crate) fn expose(&self) -> &str {
        self.0.expose_secret()
    }
}
