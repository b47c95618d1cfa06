//! A stand-in for the central telemetry record sink.

use std::{net::SocketAddr, time::Duration};

use axum::{Json, Router, extract::State, routing::post};
use http::StatusCode;
use telemetry::TelemetryRecord;
use tokio::{
    net::TcpListener,
    sync::{Mutex, mpsc},
};

const RECEIVE_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Clone)]
struct SinkState {
    records: mpsc::UnboundedSender<TelemetryRecord>,
    delay: Duration,
}

/// Serves `POST /logs` on a random local port and forwards every record it receives.
pub struct MockSink {
    address: SocketAddr,
    records: Mutex<mpsc::UnboundedReceiver<TelemetryRecord>>,
}

impl MockSink {
    /// Starts a sink that acknowledges immediately.
    pub async fn start() -> Self {
        Self::with_delay(Duration::ZERO).await
    }

    /// Starts a sink that captures the record but answers only after `delay`.
    pub async fn with_delay(delay: Duration) -> Self {
        let (records, receiver) = mpsc::unbounded_channel();
        let state = SinkState { records, delay };

        let app = Router::new().route("/logs", post(ingest)).with_state(state);
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap();

        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            address,
            records: Mutex::new(receiver),
        }
    }

    /// Base URL of the sink.
    pub fn url(&self) -> String {
        format!("http://{}", self.address)
    }

    /// Waits for the next record, giving up after a couple of seconds.
    pub async fn next_record(&self) -> Option<TelemetryRecord> {
        let mut records = self.records.lock().await;

        tokio::time::timeout(RECEIVE_TIMEOUT, records.recv())
            .await
            .ok()
            .flatten()
    }

    /// Waits for exactly one record and asserts nothing else arrives shortly after.
    pub async fn single_record(&self) -> TelemetryRecord {
        let record = self.next_record().await.expect("no telemetry record received");

        let mut records = self.records.lock().await;
        let extra = tokio::time::timeout(Duration::from_millis(300), records.recv()).await;

        assert!(extra.is_err(), "more than one telemetry record received: {extra:?}");

        record
    }
}

async fn ingest(State(state): State<SinkState>, Json(record): Json<TelemetryRecord>) -> StatusCode {
    log::debug!("Mock sink received record for {} {}", record.method, record.endpoint);

    let _ = state.records.send(record);
    tokio::time::sleep(state.delay).await;

    StatusCode::OK
}
