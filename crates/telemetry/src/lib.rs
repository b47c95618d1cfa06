//! Best-effort request telemetry.
//!
//! Every enveloped request produces one [`TelemetryRecord`]. The [`TelemetryEmitter`] ships it to
//! the central record sink on a detached task: at most once, never retried, and never able to
//! fail, slow down or alter the request that produced it.

#![deny(missing_docs)]

mod emitter;
pub mod metrics;
mod record;
mod summary;

use config::MetricsConfig;
use opentelemetry_sdk::metrics::SdkMeterProvider;

pub use emitter::TelemetryEmitter;
pub use record::TelemetryRecord;
pub use summary::{summarize, summarize_value};

/// Guard that keeps the metrics exporter alive and flushes it on drop.
pub struct TelemetryGuard {
    meter_provider: Option<SdkMeterProvider>,
}

impl TelemetryGuard {
    /// Whether an exporting meter provider was installed.
    pub fn is_exporting(&self) -> bool {
        self.meter_provider.is_some()
    }

    /// Force flush all pending metrics immediately.
    pub fn force_flush(&self) -> anyhow::Result<()> {
        match &self.meter_provider {
            Some(provider) => provider
                .force_flush()
                .map_err(|e| anyhow::anyhow!("Failed to flush metrics: {e}")),
            None => Ok(()),
        }
    }
}

impl Drop for TelemetryGuard {
    fn drop(&mut self) {
        if let Some(provider) = &self.meter_provider
            && let Err(e) = provider.shutdown()
        {
            log::error!("Failed to shutdown meter provider: {e}");
        }
    }
}

/// Initialize metrics export with the given configuration.
///
/// Must run before the envelope and emitter are built, so their instruments bind to the
/// installed provider. Keep the returned guard alive for the lifetime of the process.
pub fn init(service_name: &str, config: &MetricsConfig) -> anyhow::Result<TelemetryGuard> {
    let meter_provider = metrics::init_metrics(service_name, config)?;

    Ok(TelemetryGuard { meter_provider })
}
