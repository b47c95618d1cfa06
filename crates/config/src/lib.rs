//! Bookstore edge configuration structures to map the bookstore.toml configuration.

#![deny(missing_docs)]

mod health;
mod identity;
mod loader;
mod metrics;
mod server;
mod telemetry;

use std::path::Path;

pub use health::HealthConfig;
pub use identity::IdentityConfig;
pub use metrics::{MetricsConfig, OtlpExporterConfig, OtlpProtocol};
pub use server::ServerConfig;
pub use telemetry::TelemetryConfig;

use serde::Deserialize;
use url::Url;

/// Main configuration structure for a bookstore service.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// HTTP server configuration settings.
    #[serde(default)]
    pub server: ServerConfig,
    /// Remote identity service used to verify bearer credentials.
    #[serde(default)]
    pub identity: IdentityConfig,
    /// Remote record sink receiving one telemetry record per request.
    #[serde(default)]
    pub telemetry: TelemetryConfig,
    /// Export of local request and dispatch metrics.
    #[serde(default)]
    pub metrics: MetricsConfig,
}

impl Config {
    /// Load configuration from a file path.
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Config> {
        loader::load(path)
    }

    /// Validates timeouts and dispatch limits, logging any non-fatal warnings.
    pub fn validate(&self) -> anyhow::Result<()> {
        for warning in loader::validate(self)? {
            log::warn!("{warning}");
        }

        Ok(())
    }
}

/// Appends `path` to the path of `base`, keeping any prefix `base` already carries.
///
/// `Url::join` would replace the prefix when `path` is absolute.
pub(crate) fn append_path(base: &Url, path: &str) -> Result<Url, url::ParseError> {
    if base.cannot_be_a_base() {
        return Err(url::ParseError::RelativeUrlWithCannotBeABaseBase);
    }

    let prefix = base.path().trim_end_matches('/');
    let path = path.trim_start_matches('/');

    let mut url = base.clone();
    url.set_path(&format!("{prefix}/{path}"));

    Ok(url)
}
