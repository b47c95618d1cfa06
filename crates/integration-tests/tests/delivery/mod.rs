use std::{
    collections::BTreeMap,
    time::{Duration, Instant},
};

use config::Config;
use http::{HeaderMap, Method};
use indoc::indoc;
use integration_tests::{MockSink, TestServer};
use serde::{Serialize, Serializer};
use serde_json::json;
use server::{Envelope, Operation, ServiceError};

use crate::{CONFIG, orders};

#[tokio::test]
async fn stalled_sink_does_not_delay_responses() {
    let sink = MockSink::with_delay(Duration::from_secs(30)).await;

    let server = TestServer::builder()
        .routes(orders::routes())
        .sink(&sink)
        .build(CONFIG)
        .await;

    let start = Instant::now();

    for _ in 0..5 {
        assert_eq!(server.client.get("/books").await.status(), 200);
    }

    assert!(start.elapsed() < Duration::from_secs(2));

    // every record still reached the sink, it just never acknowledged them in time
    for _ in 0..5 {
        assert!(sink.next_record().await.is_some());
    }
}

#[tokio::test]
async fn unreachable_sink_does_not_affect_responses() {
    let config = indoc! {r#"
        [telemetry]
        url = "http://127.0.0.1:1"
        timeout = "1s"
    "#};

    let server = TestServer::builder().routes(orders::routes()).build(config).await;

    let response = server.client.get("/books").await;
    assert_eq!(response.status(), 200);

    let body: serde_json::Value = response.json().await.unwrap();

    insta::assert_json_snapshot!(body, @r#"
    [
      {
        "id": 1,
        "title": "Dune"
      },
      {
        "id": 2,
        "title": "Emma"
      }
    ]
    "#);
}

#[tokio::test]
async fn disabled_sink_still_serves() {
    let sink = MockSink::start().await;

    let config = indoc! {r#"
        [telemetry]
        enabled = false
    "#};

    let server = TestServer::builder()
        .routes(orders::routes())
        .sink(&sink)
        .build(config)
        .await;

    assert_eq!(server.client.get("/books").await.status(), 200);
    assert!(sink.next_record().await.is_none());
}

#[derive(Debug)]
struct Receipt;

impl Serialize for Receipt {
    fn serialize<S: Serializer>(&self, _: S) -> Result<S::Ok, S::Error> {
        Err(serde::ser::Error::custom("receipt printer offline"))
    }
}

fn envelope_for(sink: &MockSink) -> Envelope {
    let mut config: Config = toml::from_str(CONFIG).unwrap();
    config.telemetry.url = sink.url().parse().unwrap();

    Envelope::from_config(&config).unwrap()
}

#[tokio::test]
async fn unencodable_request_is_summarized_as_text() {
    let sink = MockSink::start().await;
    let envelope = envelope_for(&sink);

    let mut stock = BTreeMap::new();
    stock.insert((1, 2), 10);

    let response = envelope
        .run(
            Operation::public(Method::POST, "/inventory"),
            &HeaderMap::new(),
            stock,
            |stock, _| async move { Ok::<_, ServiceError>(stock.len()) },
        )
        .await;

    assert_eq!(response.status(), 200);

    let record = sink.single_record().await;

    assert_eq!(record.status_code, 200);
    assert_eq!(record.request_summary, Some(json!({ "text": "{(1, 2): 10}" })));
    assert_eq!(record.response_summary, Some(json!({ "value": 1 })));
}

#[tokio::test]
async fn unencodable_response_becomes_internal_error() {
    let sink = MockSink::start().await;
    let envelope = envelope_for(&sink);

    let response = envelope
        .run(
            Operation::public(Method::GET, "/receipts/{receipt_id}"),
            &HeaderMap::new(),
            4,
            |_, _| async { Ok::<_, ServiceError>(Receipt) },
        )
        .await;

    assert_eq!(response.status(), 500);

    let record = sink.single_record().await;

    assert_eq!(record.status_code, 500);
    assert_eq!(record.response_summary, Some(json!({ "text": "Receipt" })));
    assert_eq!(
        record.error_message.as_deref(),
        Some("response could not be serialized: receipt printer offline")
    );
}

#[tokio::test]
async fn cancelled_operation_is_recorded_once() {
    let sink = MockSink::start().await;
    let envelope = envelope_for(&sink);

    let operation = Operation::public(Method::GET, "/reports/{report_id}");
    let headers = HeaderMap::new();

    let run = envelope.run(operation, &headers, 9, |_, _| async {
        tokio::time::sleep(Duration::from_secs(30)).await;
        Ok::<_, ServiceError>("done")
    });

    assert!(tokio::time::timeout(Duration::from_millis(100), run).await.is_err());

    let record = sink.single_record().await;

    assert_eq!(record.service_name, "order_service");
    assert_eq!(record.endpoint, "/reports/{report_id}");
    assert_eq!(record.status_code, 499);
    assert_eq!(record.request_summary, Some(json!({ "value": 9 })));
    assert_eq!(record.error_message.as_deref(), Some("request cancelled"));
}
