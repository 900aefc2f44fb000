//! Shared test utilities and fixtures
//!
//! Every test drives the real tokio host on the test's current-thread runtime.

#![allow(dead_code)]

use tokio::runtime::Handle;
use weeslack::{Dispatcher, TokioHost};
use weeslack_core::Runtime;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// A runtime wired to a [`TokioHost`] on the current tokio runtime.
pub fn runtime() -> (Runtime, Dispatcher) {
    let (host, dispatcher) = TokioHost::new(Handle::current());
    (Runtime::new(host), dispatcher)
}

/// Start a mock server standing in for `api.slack.com`.
pub async fn start_slack_mock() -> MockServer {
    MockServer::start().await
}

/// Base URL to hand to `SlackApi::with_base_url` for `server`.
pub fn api_base(server: &MockServer) -> String {
    format!("{}/api", server.uri())
}

/// Answer `GET /api/<api_method>` with `body` as JSON.
pub async fn mount_method(server: &MockServer, api_method: &str, body: serde_json::Value) {
    Mock::given(method("GET"))
        .and(path(format!("/api/{api_method}")))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(server)
        .await;
}
