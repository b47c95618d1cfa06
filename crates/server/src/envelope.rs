//! The instrumented operation envelope.
//!
//! Every endpoint runs its business logic through [`Envelope::run`] or
//! [`Envelope::run_extracted`], which authenticate the caller (unless the operation is public),
//! execute the operation, and emit exactly one telemetry record whichever way the request ends.

use std::{
    any::Any,
    borrow::Cow,
    fmt::Debug,
    future::Future,
    panic::AssertUnwindSafe,
    sync::Arc,
};

use anyhow::anyhow;
use axum::{
    Json,
    response::{IntoResponse, Response},
};
use config::Config;
use futures::FutureExt;
use http::{HeaderMap, Method, StatusCode};
use identity::{AuthOutcome, AuthRelay, Credential, VerifiedIdentity};
use serde::Serialize;
use serde_json::Value;
use telemetry::{
    TelemetryEmitter, TelemetryRecord,
    metrics::{HTTP_SERVER_REQUEST_DURATION, Recorder},
    summarize, summarize_value,
};

use crate::error::{AuthFailure, ServiceError};

/// Nginx's convention for a request the client abandoned before a response was produced.
const CLIENT_CLOSED_REQUEST: u16 = 499;

/// Whether an operation requires a verified identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    /// Runs without authentication; the operation receives no identity.
    Public,
    /// Requires a bearer credential verified by the identity service.
    Protected,
}

/// Static description of an enveloped endpoint.
#[derive(Debug, Clone)]
pub struct Operation {
    access: Access,
    method: Method,
    endpoint: Cow<'static, str>,
    success_status: StatusCode,
}

impl Operation {
    /// An operation anyone may call.
    pub fn public(method: Method, endpoint: impl Into<Cow<'static, str>>) -> Self {
        Self::new(Access::Public, method, endpoint)
    }

    /// An operation that requires a verified identity.
    pub fn protected(method: Method, endpoint: impl Into<Cow<'static, str>>) -> Self {
        Self::new(Access::Protected, method, endpoint)
    }

    fn new(access: Access, method: Method, endpoint: impl Into<Cow<'static, str>>) -> Self {
        Self {
            access,
            method,
            endpoint: endpoint.into(),
            success_status: StatusCode::OK,
        }
    }

    /// Status returned on success. Defaults to 200.
    pub fn with_success_status(mut self, status: StatusCode) -> Self {
        self.success_status = status;
        self
    }

    /// Whether the operation requires authentication.
    pub fn access(&self) -> Access {
        self.access
    }
}

/// Composes the authentication relay and the telemetry emitter around business operations.
#[derive(Clone)]
pub struct Envelope(Arc<EnvelopeInner>);

struct EnvelopeInner {
    relay: AuthRelay,
    emitter: TelemetryEmitter,
}

impl Envelope {
    /// Creates an envelope from its two collaborators.
    pub fn new(relay: AuthRelay, emitter: TelemetryEmitter) -> Self {
        Self(Arc::new(EnvelopeInner { relay, emitter }))
    }

    /// Builds the relay and the emitter described by the configuration.
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let relay = AuthRelay::new(&config.identity)?;
        let emitter = TelemetryEmitter::new(config.server.service_name.clone(), &config.telemetry)?;

        Ok(Self::new(relay, emitter))
    }

    /// The service name stamped on every record.
    pub fn service_name(&self) -> &str {
        self.0.emitter.service_name()
    }

    /// Runs `handler` inside the envelope and turns its outcome into a response.
    ///
    /// For protected operations the identity service is consulted first, and the handler never
    /// runs when the credential is missing or refused. Panics inside the handler are caught and
    /// answered with a generic 500. The returned status always equals the `status_code` of the
    /// telemetry record.
    pub async fn run<Req, Res, F, Fut>(
        &self,
        operation: Operation,
        headers: &HeaderMap,
        request: Req,
        handler: F,
    ) -> Response
    where
        Req: Serialize + Debug,
        Res: Serialize + Debug,
        F: FnOnce(Req, Option<VerifiedIdentity>) -> Fut,
        Fut: Future<Output = Result<Res, ServiceError>>,
    {
        self.run_extracted(operation, headers, Ok::<_, ServiceError>(request), handler)
            .await
    }

    /// Same as [`Envelope::run`], for a request whose extraction may have failed.
    ///
    /// Handlers take their extractors as `Result<Json<T>, JsonRejection>` or
    /// `Result<Path<T>, PathRejection>` and pass them here unchanged. A rejection is only
    /// answered after authentication, so an anonymous caller of a protected operation gets a 401
    /// whatever its body looks like, and a rejected extraction is recorded like any other error.
    pub async fn run_extracted<Req, E, Res, F, Fut>(
        &self,
        operation: Operation,
        headers: &HeaderMap,
        request: Result<Req, E>,
        handler: F,
    ) -> Response
    where
        Req: Serialize + Debug,
        E: Into<ServiceError>,
        Res: Serialize + Debug,
        F: FnOnce(Req, Option<VerifiedIdentity>) -> Fut,
        Fut: Future<Output = Result<Res, ServiceError>>,
    {
        let mut scope = OperationScope::start(self.0.emitter.clone(), &operation);

        if let Ok(request) = &request {
            scope.request_summary(summarize(request));
        }

        let identity = match operation.access {
            Access::Public => None,
            Access::Protected => match self.authenticate(headers).await {
                Ok(identity) => {
                    scope.user_id(identity.id);
                    Some(identity)
                }
                Err(failure) => {
                    scope.finish(failure.status_code().as_u16(), None, Some(failure.to_string()));
                    return failure.into_response();
                }
            },
        };

        let request = match request {
            Ok(request) => request,
            Err(rejection) => {
                let error: ServiceError = rejection.into();

                scope.finish(error.status_code().as_u16(), None, Some(error.telemetry_message()));
                return error.into_response();
            }
        };

        let outcome = AssertUnwindSafe(async move { handler(request, identity).await })
            .catch_unwind()
            .await
            .unwrap_or_else(|panic| {
                let message = panic_message(&*panic);
                Err(ServiceError::unexpected(anyhow!("operation panicked: {message}")))
            });

        let error = match outcome.map(|value| serde_json::to_value(&value).map_err(|e| (e, value))) {
            Ok(Ok(projection)) => {
                let status = operation.success_status;
                let summary = summarize_value(projection.clone());
                let body = (!summary.is_null()).then_some(summary);

                scope.finish(status.as_u16(), body, None);
                return (status, Json(projection)).into_response();
            }
            Ok(Err((e, value))) => {
                scope.response_summary(summarize(&value));
                ServiceError::unexpected(anyhow!("response could not be serialized: {e}"))
            }
            Err(error) => error,
        };

        scope.finish(error.status_code().as_u16(), None, Some(error.telemetry_message()));
        error.into_response()
    }

    async fn authenticate(&self, headers: &HeaderMap) -> Result<VerifiedIdentity, AuthFailure> {
        let credential = Credential::from_headers(headers).ok_or(AuthFailure::MissingCredential)?;

        match self.0.relay.verify(&credential).await {
            AuthOutcome::Authenticated(identity) => Ok(identity),
            AuthOutcome::Rejected(reason) => Err(AuthFailure::Rejected(reason)),
            AuthOutcome::RelayUnavailable => Err(AuthFailure::RelayUnavailable),
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    panic
        .downcast_ref::<&'static str>()
        .copied()
        .or_else(|| panic.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("unknown panic payload")
}

/// Per-request telemetry state that is emitted exactly once.
///
/// `finish` emits the record. If the scope is dropped first, because the request future was
/// cancelled or unwound, `Drop` emits it with status 499.
struct OperationScope {
    emitter: TelemetryEmitter,
    recorder: Option<Recorder>,
    record: Option<TelemetryRecord>,
}

impl OperationScope {
    fn start(emitter: TelemetryEmitter, operation: &Operation) -> Self {
        let mut recorder = Recorder::new(HTTP_SERVER_REQUEST_DURATION);
        recorder.push_attribute("http.route", operation.endpoint.to_string());
        recorder.push_attribute("http.request.method", operation.method.to_string());

        let record = TelemetryRecord::new(
            emitter.service_name(),
            operation.endpoint.as_ref(),
            operation.method.as_str(),
            0,
        );

        Self {
            emitter,
            recorder: Some(recorder),
            record: Some(record),
        }
    }

    fn user_id(&mut self, user_id: i64) {
        if let Some(record) = self.record.as_mut() {
            record.user_id = Some(user_id);
        }
    }

    fn request_summary(&mut self, summary: Value) {
        if let Some(record) = self.record.as_mut() {
            record.request_summary = (!summary.is_null()).then_some(summary);
        }
    }

    fn response_summary(&mut self, summary: Value) {
        if let Some(record) = self.record.as_mut() {
            record.response_summary = (!summary.is_null()).then_some(summary);
        }
    }

    fn finish(&mut self, status_code: u16, response_summary: Option<Value>, error_message: Option<String>) {
        let Some(mut record) = self.record.take() else {
            return;
        };

        if let Some(mut recorder) = self.recorder.take() {
            record.duration_ms = Some(recorder.elapsed().as_secs_f64() * 1000.0);
            recorder.push_attribute("http.response.status_code", i64::from(status_code));
            recorder.record();
        }

        record.status_code = status_code;
        record.error_message = error_message;

        if response_summary.is_some() {
            record.response_summary = response_summary;
        }

        self.emitter.emit(record);
    }
}

impl Drop for OperationScope {
    fn drop(&mut self) {
        if self.record.is_some() {
            log::debug!("Request abandoned before completion, emitting cancellation record");
            self.finish(CLIENT_CLOSED_REQUEST, None, Some("request cancelled".to_string()));
        }
    }
}
