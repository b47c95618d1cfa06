//! Local metrics for the request envelope and the emitter.
//!
//! Instruments are taken from the global meter. They only leave the process once [`crate::init`]
//! has installed an OTLP meter provider.

mod names;
mod recorder;

pub use names::*;
pub use recorder::Recorder;

use anyhow::Context;
use config::{MetricsConfig, OtlpProtocol};
use opentelemetry::metrics::Meter;
use opentelemetry_otlp::{MetricExporter, WithExportConfig};
use opentelemetry_sdk::{
    Resource,
    metrics::{PeriodicReader, SdkMeterProvider},
};

const METER_NAME: &str = "bookstore";

/// Get the global meter for recording metrics
pub fn meter() -> Meter {
    opentelemetry::global::meter(METER_NAME)
}

/// Installs an OTLP meter provider as the global one. Returns `None` when export is disabled.
pub(crate) fn init_metrics(service_name: &str, config: &MetricsConfig) -> anyhow::Result<Option<SdkMeterProvider>> {
    if !config.enabled {
        log::debug!("Metrics export disabled, instruments record into a no-op meter");
        return Ok(None);
    }

    let provider = create_otlp_meter_provider(service_name, config)?;
    opentelemetry::global::set_meter_provider(provider.clone());

    log::info!("Telemetry metrics initialized for service '{service_name}'");

    Ok(Some(provider))
}

fn create_otlp_meter_provider(service_name: &str, config: &MetricsConfig) -> anyhow::Result<SdkMeterProvider> {
    let otlp = &config.otlp;

    log::debug!("Initializing OTLP metrics exporter to {} via {:?}", otlp.endpoint, otlp.protocol);

    let resource = Resource::builder().with_service_name(service_name.to_string()).build();

    let exporter = match otlp.protocol {
        OtlpProtocol::Grpc => MetricExporter::builder()
            .with_tonic()
            .with_endpoint(otlp.endpoint.as_str())
            .with_timeout(otlp.timeout)
            .build()
            .context("Failed to create gRPC OTLP metric exporter")?,
        OtlpProtocol::Http => MetricExporter::builder()
            .with_http()
            .with_endpoint(otlp.endpoint.as_str())
            .with_timeout(otlp.timeout)
            .build()
            .context("Failed to create HTTP OTLP metric exporter")?,
    };

    let reader = PeriodicReader::builder(exporter).with_interval(otlp.interval).build();

    Ok(SdkMeterProvider::builder()
        .with_resource(resource)
        .with_reader(reader)
        .build())
}
