use jiff::Timestamp;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The outcome of one request, as shipped to the record sink.
///
/// Field names on the wire follow the sink's ingestion contract: summaries travel as
/// `request_data`/`response_data` and the duration as `execution_time_ms`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetryRecord {
    /// The service that handled the request.
    pub service_name: String,
    /// Route template of the operation, e.g. `/orders/{order_id}`.
    pub endpoint: String,
    /// HTTP method.
    pub method: String,
    /// The status returned to the caller.
    pub status_code: u16,
    /// The verified user, when authentication succeeded.
    #[serde(default)]
    pub user_id: Option<i64>,
    /// Serialization-safe projection of the request payload.
    #[serde(default, rename = "request_data")]
    pub request_summary: Option<Value>,
    /// Serialization-safe projection of the response payload.
    #[serde(default, rename = "response_data")]
    pub response_summary: Option<Value>,
    /// What went wrong, when something did.
    #[serde(default)]
    pub error_message: Option<String>,
    /// Wall time of the whole envelope in milliseconds.
    #[serde(default, rename = "execution_time_ms")]
    pub duration_ms: Option<f64>,
    /// Emission time when not set explicitly.
    #[serde(default)]
    pub timestamp: Option<Timestamp>,
}

impl TelemetryRecord {
    /// Creates a record with only the mandatory fields set.
    pub fn new(
        service_name: impl Into<String>,
        endpoint: impl Into<String>,
        method: impl Into<String>,
        status_code: u16,
    ) -> Self {
        Self {
            service_name: service_name.into(),
            endpoint: endpoint.into(),
            method: method.into(),
            status_code,
            user_id: None,
            request_summary: None,
            response_summary: None,
            error_message: None,
            duration_ms: None,
            timestamp: None,
        }
    }
}
