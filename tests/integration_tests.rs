//! Integration tests using wiremock to simulate the Postmen API.

use http::Method;
use postmen::retry::RetryPolicy;
use postmen::{Body, CallOptions, Client, ClientBuilder, ErrorKind, Query, Value};
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};
use wiremock::matchers::{body_string, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const OK_EMPTY: &str = r#"{"meta":{"code":200,"message":"OK","details":[]},"data":{}}"#;
const RETRYABLE: &str =
    r#"{"meta":{"code":999,"message":"PROBLEM","retryable":true,"details":[]},"data":{}}"#;

fn builder(mock_server: &MockServer) -> ClientBuilder {
    Client::builder()
        .api_key("KEY")
        .endpoint(mock_server.uri())
        .retry_policy(RetryPolicy::new(Duration::from_millis(10)))
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn envelope(data: serde_json::Value) -> serde_json::Value {
    json!({ "meta": { "code": 200, "message": "OK", "details": [] }, "data": data })
}

#[tokio::test]
async fn test_successful_get_request() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v3/labels"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(envelope(json!({ "labels": [{ "id": "abc" }] }))),
        )
        .mount(&mock_server)
        .await;

    let client = builder(&mock_server).build().unwrap();
    let response = client.get("labels").await.unwrap();

    let labels = response.get("labels").and_then(Value::as_array).unwrap();
    assert_eq!(labels[0].get("id").and_then(Value::as_str), Some("abc"));
    assert_eq!(response.status.as_u16(), 200);
    assert_eq!(response.attempts, 1);
    assert!(!response.was_retried());
}

#[tokio::test]
async fn test_default_headers() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v3/labels"))
        .and(header("content-type", "application/json"))
        .and(header("postmen-api-key", "KEY"))
        .and(header("x-postmen-agent", "test-agent"))
        .respond_with(ResponseTemplate::new(200).set_body_string(OK_EMPTY))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = builder(&mock_server)
        .user_agent("test-agent")
        .build()
        .unwrap();

    client.get("labels").await.unwrap();
}

#[tokio::test]
async fn test_post_body_sent_verbatim() {
    let mock_server = MockServer::start().await;
    let payload = r#"{"async":false,"shipper_accounts":[{"id":"abc"}]}"#;

    Mock::given(method("POST"))
        .and(path("/v3/rates"))
        .and(body_string(payload))
        .respond_with(ResponseTemplate::new(200).set_body_string(OK_EMPTY))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = builder(&mock_server).build().unwrap();
    client.post("rates", payload).await.unwrap();
}

#[tokio::test]
async fn test_json_body_and_query_parameters() {
    let mock_server = MockServer::start().await;

    Mock::given(method("PUT"))
        .and(path("/v3/manifests"))
        .and(query_param("page", "1"))
        .and(query_param("limit", "10"))
        .and(body_string(r#"{"something":"value"}"#))
        .respond_with(ResponseTemplate::new(200).set_body_string(OK_EMPTY))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = builder(&mock_server).build().unwrap();
    let options = CallOptions::new()
        .with_body(Body::json(&json!({ "something": "value" })).unwrap())
        .with_query(Query::pairs([("page", "1"), ("limit", "10")]));

    client
        .call(Method::PUT, "/manifests", options)
        .await
        .unwrap();
}

#[tokio::test]
async fn test_api_error_surfaces_meta() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v3/labels/missing"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "meta": {
                "code": 4153,
                "message": "The label is not found.",
                "retryable": false,
                "details": [{ "path": "id" }]
            },
            "data": {}
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = builder(&mock_server).build().unwrap();
    let err = client.get("labels/missing").await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Api);
    assert_eq!(err.code(), Some(4153));
    assert_eq!(err.message(), "The label is not found.");
    assert_eq!(err.details().len(), 1);
    assert!(!err.is_retryable());
}

#[tokio::test]
async fn test_malformed_response() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v3/labels"))
        .respond_with(ResponseTemplate::new(200).set_body_string("NOT JSON"))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = builder(&mock_server).build().unwrap();
    let err = client.get("labels").await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Decode);
    assert_eq!(err.code(), Some(500));
    assert_eq!(err.message(), "malformed response from server");
}

#[tokio::test]
async fn test_http_error_with_valid_envelope() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v3/labels"))
        .respond_with(ResponseTemplate::new(502).set_body_string(OK_EMPTY))
        .mount(&mock_server)
        .await;

    let client = builder(&mock_server).build().unwrap();
    let err = client.get("labels").await.unwrap_err();

    assert_eq!(err.message(), "HTTP code = 502");
    assert_eq!(err.code(), Some(502));
}

#[tokio::test]
async fn test_retry_then_success() {
    init_tracing();
    let mock_server = MockServer::start().await;
    let attempt_count = Arc::new(AtomicUsize::new(0));
    let attempt_count_clone = attempt_count.clone();

    // First two requests are retryable failures, third succeeds
    Mock::given(method("GET"))
        .and(path("/v3/labels"))
        .respond_with(move |_req: &wiremock::Request| {
            let count = attempt_count_clone.fetch_add(1, Ordering::SeqCst);
            if count < 2 {
                ResponseTemplate::new(200).set_body_string(RETRYABLE)
            } else {
                ResponseTemplate::new(200).set_body_string(OK_EMPTY)
            }
        })
        .mount(&mock_server)
        .await;

    let client = builder(&mock_server).build().unwrap();
    let start = Instant::now();
    let response = client.get("labels").await.unwrap();

    assert_eq!(response.attempts, 3);
    assert!(response.was_retried());
    assert_eq!(attempt_count.load(Ordering::SeqCst), 3);
    // 10ms + 20ms of backoff
    assert!(start.elapsed() >= Duration::from_millis(30));
}

#[tokio::test]
async fn test_max_tries_exceeded() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v3/labels"))
        .respond_with(ResponseTemplate::new(200).set_body_string(RETRYABLE))
        .expect(3)
        .mount(&mock_server)
        .await;

    let client = builder(&mock_server).max_tries(3).build().unwrap();
    let err = client.get("labels").await.unwrap_err();

    assert_eq!(err.code(), Some(999));
    assert_eq!(err.message(), "PROBLEM");
    assert!(err.is_retryable());
}

#[tokio::test]
async fn test_safe_mode_keeps_last_error() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v3/labels"))
        .respond_with(ResponseTemplate::new(200).set_body_string(""))
        .mount(&mock_server)
        .await;

    let client = builder(&mock_server).safe(true).build().unwrap();
    let result = client.get("labels").await;

    assert!(result.is_err());
    let last = client.last_error().unwrap();
    assert_eq!(last.message(), "no response from server");
}

#[tokio::test]
async fn test_transport_failure() {
    let client = Client::builder()
        .api_key("KEY")
        .endpoint("http://127.0.0.1:1")
        .timeout(Duration::from_secs(5))
        .build()
        .unwrap();

    let err = client.get("labels").await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Transport);
    assert_eq!(err.message(), "failed to perform request");
    assert!(!err.is_retryable());
}

#[tokio::test]
async fn test_raw_mode() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v3/labels"))
        .respond_with(ResponseTemplate::new(200).set_body_string("NOT JSON"))
        .mount(&mock_server)
        .await;

    let client = builder(&mock_server).build().unwrap();
    let response = client
        .call(Method::GET, "labels", CallOptions::new().with_raw(true))
        .await
        .unwrap();

    assert_eq!(response.data.as_str(), Some("NOT JSON"));
}

#[tokio::test]
async fn test_time_conversion() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v3/labels"))
        .respond_with(ResponseTemplate::new(200).set_body_json(envelope(json!({
            "labels": [{ "created_at": "2016-01-31T16:45:46+00:00", "id": "abc" }]
        }))))
        .mount(&mock_server)
        .await;

    let client = builder(&mock_server).time(true).build().unwrap();
    let response = client.get("labels").await.unwrap();

    let label = &response.get("labels").and_then(Value::as_array).unwrap()[0];
    let created = label.get("created_at").and_then(Value::as_timestamp).unwrap();
    assert_eq!(created.timestamp(), 1_454_258_746);
    assert_eq!(label.get("id").and_then(Value::as_str), Some("abc"));
}

#[tokio::test]
async fn test_rate_limit_waits_for_reset() {
    init_tracing();
    let mock_server = MockServer::start().await;
    let reset = SystemTime::now() + Duration::from_millis(300);
    let reset_millis = reset.duration_since(UNIX_EPOCH).unwrap().as_millis();

    Mock::given(method("GET"))
        .and(path("/v3/labels"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("x-ratelimit-remaining", "0")
                .insert_header("x-ratelimit-reset", reset_millis.to_string().as_str())
                .set_body_string(OK_EMPTY),
        )
        .up_to_n_times(1)
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v3/labels"))
        .respond_with(ResponseTemplate::new(200).set_body_string(OK_EMPTY))
        .mount(&mock_server)
        .await;

    let client = builder(&mock_server).build().unwrap();
    client.get("labels").await.unwrap();
    assert_eq!(client.rate_limit_state().calls_remaining, Some(0));

    client.get("labels").await.unwrap();
    let reset_at = UNIX_EPOCH + Duration::from_millis(reset_millis as u64);
    assert!(
        SystemTime::now() >= reset_at,
        "second call was dispatched before the rate-limit reset"
    );
}

#[tokio::test]
async fn test_rate_limit_rejected_when_waiting_disabled() {
    let mock_server = MockServer::start().await;
    let reset = SystemTime::now() + Duration::from_secs(60);
    let reset_millis = reset.duration_since(UNIX_EPOCH).unwrap().as_millis();

    Mock::given(method("GET"))
        .and(path("/v3/labels"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("x-ratelimit-remaining", "0")
                .insert_header("x-ratelimit-reset", reset_millis.to_string().as_str())
                .set_body_string(OK_EMPTY),
        )
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = builder(&mock_server).rate_limit(false).build().unwrap();
    client.get("labels").await.unwrap();

    let err = client.get("labels").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::RateLimit);
    assert_eq!(err.code(), Some(429));
    assert!(err.is_retryable());
}
