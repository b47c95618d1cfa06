use std::time::{Duration, Instant};

use opentelemetry::{Key, KeyValue, Value, metrics::Histogram};

/// A timer that records elapsed time to a histogram.
///
/// Timing starts when the recorder is created. Call [`Recorder::record`] once the measured work
/// is done; the recorder consumes itself.
///
/// ```rust
/// use telemetry::metrics::Recorder;
///
/// let mut recorder = Recorder::new("operation.duration");
/// recorder.push_attribute("http.route", "/orders");
/// recorder.push_attribute("http.response.status_code", 200);
/// recorder.record();
/// ```
pub struct Recorder {
    start: Instant,
    histogram: Histogram<f64>,
    attributes: Vec<KeyValue>,
}

impl Recorder {
    /// Creates a new recorder for the specified metric, recording milliseconds.
    pub fn new(name: &'static str) -> Self {
        Self {
            start: Instant::now(),
            histogram: super::meter().f64_histogram(name).build(),
            attributes: Vec::new(),
        }
    }

    /// Adds an attribute to be recorded with the metric.
    pub fn push_attribute<K, V>(&mut self, key: K, value: V)
    where
        K: Into<Key>,
        V: Into<Value>,
    {
        self.attributes.push(KeyValue::new(key, value));
    }

    /// Time elapsed since the recorder was created.
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    /// Records the elapsed time to the histogram.
    pub fn record(self) {
        let duration = self.start.elapsed().as_secs_f64() * 1000.0;
        self.histogram.record(duration, &self.attributes);
    }
}
