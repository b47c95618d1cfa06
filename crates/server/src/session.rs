use anyhow::anyhow;
use axum::{extract::State, response::Response};
use http::{HeaderMap, Method};

use crate::{
    envelope::{Envelope, Operation},
    error::ServiceError,
};

pub(crate) const ME_PATH: &str = "/me";

/// Returns the identity the caller's credential was verified as.
pub(crate) async fn me(State(envelope): State<Envelope>, headers: HeaderMap) -> Response {
    let operation = Operation::protected(Method::GET, ME_PATH);

    envelope
        .run(operation, &headers, (), |(), identity| async move {
            identity.ok_or_else(|| ServiceError::unexpected(anyhow!("protected operation ran without an identity")))
        })
        .await
}
