use integration_tests::{MockIdentityService, MockSink, TestServer, VALID_TOKEN};
use serde_json::{Value, json};

use crate::{
    CONFIG,
    orders::{self, BROKEN_ORDER, NewOrder, POISONED_ORDER},
    untimed,
};

async fn order_service() -> (TestServer, MockSink) {
    let identity = MockIdentityService::start().await;
    let sink = MockSink::start().await;

    let server = TestServer::builder()
        .routes(orders::routes())
        .identity(&identity)
        .sink(&sink)
        .build(CONFIG)
        .await;

    (server, sink)
}

#[tokio::test]
async fn successful_operation_is_recorded() {
    let (server, sink) = order_service().await;

    let order = NewOrder {
        book_id: 3,
        quantity: 2,
    };

    let response = server.client.post_as("/orders", VALID_TOKEN, &order).await;
    assert_eq!(response.status(), 201);

    let body: Value = response.json().await.unwrap();

    insta::assert_json_snapshot!(body, @r#"
    {
      "book_id": 3,
      "id": 1,
      "quantity": 2,
      "status": "pending",
      "user_id": 7
    }
    "#);

    insta::assert_json_snapshot!(untimed(sink.single_record().await), @r#"
    {
      "service_name": "order_service",
      "endpoint": "/orders",
      "method": "POST",
      "status_code": 201,
      "user_id": 7,
      "request_data": {
        "book_id": 3,
        "quantity": 2
      },
      "response_data": {
        "book_id": 3,
        "id": 1,
        "quantity": 2,
        "status": "pending",
        "user_id": 7
      },
      "error_message": null,
      "execution_time_ms": null,
      "timestamp": null
    }
    "#);
}

#[tokio::test]
async fn business_error_keeps_status_and_message() {
    let (server, sink) = order_service().await;

    let order = NewOrder {
        book_id: 3,
        quantity: 0,
    };

    let response = server.client.post_as("/orders", VALID_TOKEN, &order).await;
    assert_eq!(response.status(), 400);

    let body: Value = response.json().await.unwrap();

    insta::assert_json_snapshot!(body, @r#"
    {
      "error": {
        "code": 400,
        "message": "Quantity must be at least 1",
        "type": "invalid_request_error"
      }
    }
    "#);

    insta::assert_json_snapshot!(untimed(sink.single_record().await), @r#"
    {
      "service_name": "order_service",
      "endpoint": "/orders",
      "method": "POST",
      "status_code": 400,
      "user_id": 7,
      "request_data": {
        "book_id": 3,
        "quantity": 0
      },
      "response_data": null,
      "error_message": "Quantity must be at least 1",
      "execution_time_ms": null,
      "timestamp": null
    }
    "#);
}

#[tokio::test]
async fn not_found_passes_through() {
    let (server, sink) = order_service().await;

    let response = server.client.get_as("/orders/42", VALID_TOKEN).await;
    assert_eq!(response.status(), 404);

    let record = sink.single_record().await;

    assert_eq!(record.status_code, 404);
    assert_eq!(record.error_message.as_deref(), Some("Order not found"));
}

#[tokio::test]
async fn panic_becomes_internal_error() {
    let (server, sink) = order_service().await;

    let response = server
        .client
        .get_as(&format!("/orders/{POISONED_ORDER}"), VALID_TOKEN)
        .await;

    assert_eq!(response.status(), 500);

    let body: Value = response.json().await.unwrap();

    insta::assert_json_snapshot!(body, @r#"
    {
      "error": {
        "code": 500,
        "message": "Internal server error",
        "type": "internal_error"
      }
    }
    "#);

    let record = sink.single_record().await;

    assert_eq!(record.status_code, 500);
    assert_eq!(record.user_id, Some(7));
    assert_eq!(record.request_summary, Some(json!({ "value": POISONED_ORDER })));
    assert_eq!(
        record.error_message.as_deref(),
        Some("operation panicked: order ledger corrupted")
    );

    // the server keeps serving after a panicking operation
    let response = server.client.get_as("/orders/1", VALID_TOKEN).await;
    assert_eq!(response.status(), 200);
}

#[tokio::test]
async fn unexpected_fault_detail_stays_internal() {
    let (server, sink) = order_service().await;

    let response = server
        .client
        .get_as(&format!("/orders/{BROKEN_ORDER}"), VALID_TOKEN)
        .await;

    assert_eq!(response.status(), 500);

    let body = response.text().await.unwrap();
    assert!(!body.contains("disk"));

    let record = sink.single_record().await;

    assert_eq!(record.status_code, 500);
    assert_eq!(record.error_message.as_deref(), Some("orders.db: disk I/O error"));
}

#[tokio::test]
async fn one_record_per_request() {
    let (server, sink) = order_service().await;

    let statuses = [
        server.client.get_as("/orders/1", VALID_TOKEN).await.status(),
        server.client.get_as("/orders/42", VALID_TOKEN).await.status(),
        server.client.get("/orders/1").await.status(),
        server.client.get("/books").await.status(),
    ];

    let mut recorded = Vec::new();

    for _ in statuses {
        let record = sink.next_record().await.unwrap();
        recorded.push((record.endpoint, record.status_code));
    }

    recorded.sort();

    let mut expected: Vec<_> = ["/orders/{order_id}", "/orders/{order_id}", "/orders/{order_id}", "/books"]
        .into_iter()
        .map(String::from)
        .zip(statuses.iter().map(|status| status.as_u16()))
        .collect();

    expected.sort();

    assert_eq!(recorded, expected);
    assert!(sink.next_record().await.is_none());
}
