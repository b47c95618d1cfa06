use std::time::{Duration, Instant};

use http::{Method, header::WWW_AUTHENTICATE};
use indoc::indoc;
use integration_tests::{EXPIRED_TOKEN, MockIdentityService, MockSink, SLOW_TOKEN, TestServer, VALID_TOKEN};
use serde_json::{Value, json};

use crate::{CONFIG, orders, untimed};

#[tokio::test]
async fn missing_credential_never_reaches_identity_service() {
    let identity = MockIdentityService::start().await;
    let sink = MockSink::start().await;

    let server = TestServer::builder()
        .routes(orders::routes())
        .identity(&identity)
        .sink(&sink)
        .build(CONFIG)
        .await;

    let response = server.client.get("/orders/1").await;

    assert_eq!(response.status(), 401);
    assert_eq!(response.headers().get(WWW_AUTHENTICATE).unwrap(), "Bearer");

    let body: Value = response.json().await.unwrap();

    insta::assert_json_snapshot!(body, @r#"
    {
      "error": {
        "code": 401,
        "message": "missing authentication credentials",
        "type": "authentication_error"
      }
    }
    "#);

    insta::assert_json_snapshot!(untimed(sink.single_record().await), @r#"
    {
      "service_name": "order_service",
      "endpoint": "/orders/{order_id}",
      "method": "GET",
      "status_code": 401,
      "user_id": null,
      "request_data": {
        "value": 1
      },
      "response_data": null,
      "error_message": "missing authentication credentials",
      "execution_time_ms": null,
      "timestamp": null
    }
    "#);

    assert_eq!(identity.calls(), 0);
}

#[tokio::test]
async fn non_bearer_scheme_counts_as_missing() {
    let identity = MockIdentityService::start().await;

    let server = TestServer::builder()
        .routes(orders::routes())
        .identity(&identity)
        .build(CONFIG)
        .await;

    let response = server
        .client
        .request(Method::GET, "/orders/1", None)
        .header("authorization", "Basic YWxpY2U6c2VjcmV0")
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 401);
    assert_eq!(identity.calls(), 0);
}

#[tokio::test]
async fn rejected_credential_is_unauthorized() {
    let identity = MockIdentityService::start().await;
    let sink = MockSink::start().await;

    let server = TestServer::builder()
        .routes(orders::routes())
        .identity(&identity)
        .sink(&sink)
        .build(CONFIG)
        .await;

    let response = server.client.get_as("/orders/1", EXPIRED_TOKEN).await;

    assert_eq!(response.status(), 401);
    assert_eq!(response.headers().get(WWW_AUTHENTICATE).unwrap(), "Bearer");

    let body: Value = response.json().await.unwrap();

    insta::assert_json_snapshot!(body, @r#"
    {
      "error": {
        "code": 401,
        "message": "invalid authentication credentials",
        "type": "authentication_error"
      }
    }
    "#);

    let record = sink.single_record().await;

    assert_eq!(record.status_code, 401);
    assert_eq!(record.user_id, None);
    assert_eq!(identity.calls(), 1);
}

#[tokio::test]
async fn unreachable_identity_service_is_unavailable() {
    let config = indoc! {r#"
        [server]
        service_name = "order_service"

        [identity]
        url = "http://127.0.0.1:1"
    "#};

    let sink = MockSink::start().await;

    let server = TestServer::builder()
        .routes(orders::routes())
        .sink(&sink)
        .build(config)
        .await;

    let response = server.client.get_as("/orders/1", VALID_TOKEN).await;

    assert_eq!(response.status(), 503);
    assert!(response.headers().get(WWW_AUTHENTICATE).is_none());

    let body: Value = response.json().await.unwrap();

    insta::assert_json_snapshot!(body, @r#"
    {
      "error": {
        "code": 503,
        "message": "authentication service unavailable",
        "type": "api_error"
      }
    }
    "#);

    let record = sink.single_record().await;

    assert_eq!(record.status_code, 503);
    assert_eq!(record.error_message.as_deref(), Some("authentication service unavailable"));
}

#[tokio::test]
async fn identity_timeout_is_unavailable_without_retry() {
    let config = indoc! {r#"
        [server]
        service_name = "order_service"

        [identity]
        timeout = "1s"
    "#};

    let identity = MockIdentityService::start().await;

    let server = TestServer::builder()
        .routes(orders::routes())
        .identity(&identity)
        .build(config)
        .await;

    let start = Instant::now();
    let response = server.client.get_as("/orders/1", SLOW_TOKEN).await;

    assert_eq!(response.status(), 503);
    assert!(start.elapsed() < Duration::from_secs(5));
    assert_eq!(identity.calls(), 1);
}

#[tokio::test]
async fn every_request_is_verified_again() {
    let identity = MockIdentityService::start().await;

    let server = TestServer::builder()
        .routes(orders::routes())
        .identity(&identity)
        .build(CONFIG)
        .await;

    for _ in 0..3 {
        let response = server.client.get_as("/orders/1", VALID_TOKEN).await;
        assert_eq!(response.status(), 200);
    }

    assert_eq!(identity.calls(), 3);
}

#[tokio::test]
async fn public_operation_skips_authentication() {
    let identity = MockIdentityService::start().await;
    let sink = MockSink::start().await;

    let server = TestServer::builder()
        .routes(orders::routes())
        .identity(&identity)
        .sink(&sink)
        .build(CONFIG)
        .await;

    let response = server.client.get_as("/books", EXPIRED_TOKEN).await;
    assert_eq!(response.status(), 200);

    let record = sink.single_record().await;

    assert_eq!(record.user_id, None);
    assert_eq!(record.request_summary, None);
    assert_eq!(
        record.response_summary,
        Some(json!({ "value": [{ "id": 1, "title": "Dune" }, { "id": 2, "title": "Emma" }] }))
    );
    assert_eq!(identity.calls(), 0);
}
