//! Request pipeline over the tokio host's `url:` transport

use weeslack_core::Runtime;
use weeslack_http::{RequestOptions, http_request};
use weeslack_types::HttpError;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::common::runtime;

async fn get(url: String, max_retries: u32) -> (Runtime, anyhow::Result<String>) {
    let (rt, mut dispatcher) = runtime();
    let inner = rt.clone();
    let options = RequestOptions::new()
        .with_token("xoxp-test")
        .to_process_options();
    let handle = rt
        .create_task(async move { http_request(&inner, &url, &options, 5000, max_retries).await })
        .unwrap();
    dispatcher.run(&rt).await;
    let result = handle.try_take().unwrap();
    (rt, result)
}

#[tokio::test]
async fn returns_body_of_successful_response() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/hello"))
        .and(header("authorization", "Bearer xoxp-test"))
        .respond_with(ResponseTemplate::new(200).set_body_string("hello"))
        .mount(&server)
        .await;

    let (rt, result) = get(format!("{}/hello", server.uri()), 5).await;
    assert_eq!(result.unwrap(), "hello");
    assert!(rt.is_idle());
}

#[tokio::test]
async fn error_status_surfaces_body() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/missing"))
        .respond_with(ResponseTemplate::new(404).set_body_string("body text"))
        .expect(1)
        .mount(&server)
        .await;

    let (_rt, result) = get(format!("{}/missing", server.uri()), 5).await;
    let err = result.unwrap_err().downcast::<HttpError>().unwrap();
    assert_eq!(err.http_status, 404);
    assert_eq!(err.error, "body text");
}

#[tokio::test]
async fn rate_limited_request_is_retried_after_delay() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/limited"))
        .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "1"))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/limited"))
        .respond_with(ResponseTemplate::new(200).set_body_string("finally"))
        .mount(&server)
        .await;

    let started = std::time::Instant::now();
    let (_rt, result) = get(format!("{}/limited", server.uri()), 0).await;
    assert_eq!(result.unwrap(), "finally");
    assert!(started.elapsed() >= std::time::Duration::from_secs(1));
}

#[tokio::test]
async fn connection_failure_without_retries_is_status_zero() {
    // Port 1 is reserved; nothing listens there.
    let (_rt, result) = get("http://127.0.0.1:1/".to_string(), 0).await;
    let err = result.unwrap_err().downcast::<HttpError>().unwrap();
    assert_eq!(err.http_status, 0);
    assert_ne!(err.return_code, 0);
    assert!(!err.error.is_empty());
}
