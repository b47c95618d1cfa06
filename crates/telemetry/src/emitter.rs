use std::{sync::Arc, time::Duration};

use anyhow::Context;
use config::TelemetryConfig;
use jiff::Timestamp;
use opentelemetry::{KeyValue, metrics::Counter};
use tokio::{runtime::Handle, sync::Semaphore};
use url::Url;

use crate::{
    TelemetryRecord,
    metrics::{self, Recorder, TELEMETRY_DISPATCH_DURATION, TELEMETRY_RECORDS_DROPPED},
};

/// Fire-and-forget dispatcher for [`TelemetryRecord`]s.
///
/// [`TelemetryEmitter::emit`] returns immediately. The record is posted to the sink on a
/// spawned task bounded by the configured timeout, and the number of dispatches in flight is
/// capped by a semaphore. Records that cannot get a slot are dropped. Failures are logged and
/// discarded; nothing is ever reported back to the caller.
#[derive(Clone)]
pub struct TelemetryEmitter(Arc<EmitterInner>);

struct EmitterInner {
    service_name: String,
    sink: Option<Sink>,
    dropped: Counter<u64>,
}

struct Sink {
    client: reqwest::Client,
    url: Url,
    timeout: Duration,
    max_in_flight: usize,
    permits: Arc<Semaphore>,
}

impl TelemetryEmitter {
    /// Creates an emitter stamping records with `service_name`.
    pub fn new(service_name: impl Into<String>, config: &TelemetryConfig) -> anyhow::Result<Self> {
        let sink = if config.enabled {
            let url = config
                .ingest_url()
                .with_context(|| format!("invalid telemetry ingestion path '{}'", config.path))?;

            let client = reqwest::Client::builder()
                .build()
                .context("failed to build telemetry sink client")?;

            Some(Sink {
                client,
                url,
                timeout: config.timeout,
                max_in_flight: config.max_in_flight,
                permits: Arc::new(Semaphore::new(config.max_in_flight)),
            })
        } else {
            log::debug!("Telemetry sink disabled, records will only be logged locally");
            None
        };

        Ok(Self(Arc::new(EmitterInner {
            service_name: service_name.into(),
            sink,
            dropped: metrics::meter().u64_counter(TELEMETRY_RECORDS_DROPPED).build(),
        })))
    }

    /// The name stamped on records built for this service.
    pub fn service_name(&self) -> &str {
        &self.0.service_name
    }

    /// Hands the record off for delivery and returns without waiting.
    pub fn emit(&self, mut record: TelemetryRecord) {
        record.timestamp.get_or_insert_with(Timestamp::now);

        let Some(sink) = &self.0.sink else {
            log::debug!(
                "[{}] {} {} - Status: {}",
                record.service_name,
                record.method,
                record.endpoint,
                record.status_code
            );
            return;
        };

        let Ok(runtime) = Handle::try_current() else {
            log::warn!("Dropping telemetry record for {}: no async runtime", record.endpoint);
            self.drop_record("no_runtime");
            return;
        };

        let Ok(permit) = sink.permits.clone().try_acquire_owned() else {
            log::warn!(
                "Dropping telemetry record for {}: {} dispatches already in flight",
                record.endpoint,
                sink.max_in_flight
            );
            self.drop_record("capacity");
            return;
        };

        let client = sink.client.clone();
        let url = sink.url.clone();
        let timeout = sink.timeout;

        runtime.spawn(async move {
            let _permit = permit;
            let mut recorder = Recorder::new(TELEMETRY_DISPATCH_DURATION);

            let outcome = match tokio::time::timeout(timeout, client.post(url).json(&record).send()).await {
                Ok(Ok(response)) if response.status().is_success() => {
                    log::debug!("Telemetry record for {} delivered", record.endpoint);
                    "delivered"
                }
                Ok(Ok(response)) => {
                    log::warn!("Telemetry sink answered {}, record discarded", response.status());
                    "rejected"
                }
                Ok(Err(e)) => {
                    log::warn!("Failed to deliver telemetry record: {e}");
                    "failed"
                }
                Err(_) => {
                    log::warn!("Telemetry dispatch timed out after {timeout:?}");
                    "timeout"
                }
            };

            recorder.push_attribute("outcome", outcome);
            recorder.record();
        });
    }

    fn drop_record(&self, reason: &'static str) {
        self.0.dropped.add(1, &[KeyValue::new("reason", reason)]);
    }
}
