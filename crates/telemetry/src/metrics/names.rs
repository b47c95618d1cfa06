//! Metric names recorded by the envelope and the emitter.
//! HTTP names follow https://opentelemetry.io/docs/specs/semconv/http/http-metrics/

/// HTTP server request duration in milliseconds, one sample per enveloped operation
pub const HTTP_SERVER_REQUEST_DURATION: &str = "http.server.request.duration";

/// Duration of a detached telemetry dispatch in milliseconds
pub const TELEMETRY_DISPATCH_DURATION: &str = "telemetry.dispatch.duration";

/// Telemetry records discarded before dispatch
pub const TELEMETRY_RECORDS_DROPPED: &str = "telemetry.records.dropped";
