use axum::{
    extract::{MatchedPath, State},
    response::Response,
};
use http::{HeaderMap, Method};
use serde::Serialize;

use crate::{
    envelope::{Envelope, Operation},
    error::ServiceError,
};

#[derive(Debug, Serialize)]
#[serde(rename_all = "lowercase")]
pub(crate) enum HealthState {
    /// Indicates that the server is healthy and operational.
    Healthy,
}

#[derive(Debug, Serialize)]
pub(crate) struct HealthReport {
    status: HealthState,
    service: String,
}

/// Handles health check requests. Runs through the envelope like any other public operation.
pub(crate) async fn health(State(envelope): State<Envelope>, path: MatchedPath, headers: HeaderMap) -> Response {
    let operation = Operation::public(Method::GET, path.as_str().to_owned());
    let service = envelope.service_name().to_owned();

    envelope
        .run(operation, &headers, (), |(), _| async move {
            Ok::<_, ServiceError>(HealthReport {
                status: HealthState::Healthy,
                service,
            })
        })
        .await
}
