//! Local OpenTelemetry metrics export.

use std::time::Duration;

use duration_str::deserialize_duration;
use serde::Deserialize;
use url::Url;

/// Export of the envelope and emitter instruments to an OTLP collector.
///
/// Disabled by default. Without it the instruments record into a no-op meter.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MetricsConfig {
    /// Whether a meter provider is installed at startup.
    pub enabled: bool,
    /// OTLP exporter settings.
    pub otlp: OtlpExporterConfig,
}

/// OTLP exporter configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OtlpExporterConfig {
    /// Collector endpoint.
    pub endpoint: Url,
    /// Wire protocol spoken to the collector.
    pub protocol: OtlpProtocol,
    /// Upper bound for a single export.
    #[serde(deserialize_with = "deserialize_duration")]
    pub timeout: Duration,
    /// Delay between periodic exports.
    #[serde(deserialize_with = "deserialize_duration")]
    pub interval: Duration,
}

impl Default for OtlpExporterConfig {
    fn default() -> Self {
        Self {
            endpoint: Url::parse("http://localhost:4317").expect("static url is valid"),
            protocol: OtlpProtocol::default(),
            timeout: Duration::from_secs(10),
            interval: Duration::from_secs(5),
        }
    }
}

/// OTLP protocol selection.
#[derive(Debug, Clone, Copy, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum OtlpProtocol {
    /// gRPC protocol (default)
    #[default]
    Grpc,
    /// HTTP/protobuf protocol
    Http,
}
