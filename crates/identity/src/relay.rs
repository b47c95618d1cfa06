use anyhow::Context;
use config::IdentityConfig;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::Credential;

/// Reason attached to every rejection, regardless of what the identity service replied.
pub const REJECTION_REASON: &str = "invalid authentication credentials";

/// The identity confirmed by the identity service for a single request.
///
/// Only valid for the request that obtained it. It is never cached.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerifiedIdentity {
    /// Numeric user identifier. The identity service replies with `user_id`.
    #[serde(alias = "user_id")]
    pub id: i64,
    /// Login name.
    pub username: String,
    /// Contact address.
    pub email: String,
}

/// The verdict of a single verification call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthOutcome {
    /// The identity service accepted the credential.
    Authenticated(VerifiedIdentity),
    /// The identity service answered, but not with success.
    Rejected(String),
    /// The identity service could not be reached, timed out or replied with garbage.
    RelayUnavailable,
}

/// Forwards bearer credentials to the identity service.
///
/// Cloning is cheap; the underlying HTTP client is pooled and safe to share between requests.
#[derive(Clone)]
pub struct AuthRelay {
    client: reqwest::Client,
    verify_url: Url,
}

impl AuthRelay {
    /// Creates a relay from configuration. The timeout bounds the whole call, body included.
    pub fn new(config: &IdentityConfig) -> anyhow::Result<Self> {
        let verify_url = config
            .verify_url()
            .with_context(|| format!("invalid identity verification path '{}'", config.verify_path))?;

        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .context("failed to build identity service client")?;

        Ok(Self { client, verify_url })
    }

    /// The endpoint credentials are verified against.
    pub fn verify_url(&self) -> &Url {
        &self.verify_url
    }

    /// Performs exactly one verification call. Never retries.
    pub async fn verify(&self, credential: &Credential) -> AuthOutcome {
        let response = self
            .client
            .get(self.verify_url.clone())
            .bearer_auth(credential.expose())
            .send()
            .await;

        let response = match response {
            Ok(response) => response,
            Err(e) if e.is_timeout() => {
                log::warn!("Identity service at {} timed out", self.verify_url);
                return AuthOutcome::RelayUnavailable;
            }
            Err(e) => {
                log::warn!("Identity service at {} is unreachable: {e}", self.verify_url);
                return AuthOutcome::RelayUnavailable;
            }
        };

        let status = response.status();

        if !status.is_success() {
            log::debug!("Identity service rejected credential with status {status}");
            return AuthOutcome::Rejected(REJECTION_REASON.to_string());
        }

        match response.json::<VerifiedIdentity>().await {
            Ok(identity) => AuthOutcome::Authenticated(identity),
            Err(e) => {
                log::warn!("Identity service returned an unreadable verification reply: {e}");
                AuthOutcome::RelayUnavailable
            }
        }
    }
}
