//! Telemetry sink configuration.

use std::{borrow::Cow, time::Duration};

use duration_str::deserialize_duration;
use serde::Deserialize;
use url::Url;

/// Remote record sink configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TelemetryConfig {
    /// Whether records are shipped to the sink. When disabled they are only logged locally.
    pub enabled: bool,
    /// Base URL of the sink service.
    pub url: Url,
    /// Path of the ingestion endpoint.
    pub path: Cow<'static, str>,
    /// Upper bound for a single detached dispatch.
    #[serde(deserialize_with = "deserialize_duration")]
    pub timeout: Duration,
    /// Maximum number of dispatches in flight at once. Records beyond this are dropped.
    pub max_in_flight: usize,
}

impl TelemetryConfig {
    /// The full URL of the ingestion endpoint.
    ///
    /// The path is appended to any path prefix already present on `url`.
    pub fn ingest_url(&self) -> Result<Url, url::ParseError> {
        crate::append_path(&self.url, &self.path)
    }
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            url: Url::parse("http://localhost:8004").expect("static url is valid"),
            path: Cow::Borrowed("/logs"),
            timeout: Duration::from_secs(5),
            max_in_flight: 256,
        }
    }
}
