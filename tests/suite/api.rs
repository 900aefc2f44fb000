//! Slack API client against a mock server

use serde_json::json;
use weeslack_api::SlackApi;
use weeslack_http::RequestOptions;
use weeslack_types::{ApiParams, SlackApiError};
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, ResponseTemplate};

use crate::common::{api_base, mount_method, runtime, start_slack_mock};

#[tokio::test]
async fn fetch_decodes_reply() {
    let server = start_slack_mock().await;
    mount_method(&server, "auth.test", json!({"ok": true, "team": "Acme"})).await;

    let (rt, mut dispatcher) = runtime();
    let api = SlackApi::new(rt.clone(), "acme", RequestOptions::new().with_token("t"), 5)
        .with_base_url(api_base(&server));
    let handle = rt
        .create_task(async move { api.fetch("auth.test", &ApiParams::new()).await })
        .unwrap();

    dispatcher.run(&rt).await;
    assert_eq!(handle.try_take().unwrap().unwrap()["team"], "Acme");
}

#[tokio::test]
async fn fetch_reports_api_errors() {
    let server = start_slack_mock().await;
    mount_method(&server, "chat.postMessage", json!({"ok": false, "error": "not_in_channel"}))
        .await;

    let (rt, mut dispatcher) = runtime();
    let api = SlackApi::new(rt.clone(), "acme", RequestOptions::new(), 5)
        .with_base_url(api_base(&server));
    let handle = rt
        .create_task(async move {
            api.fetch("chat.postMessage", &ApiParams::from_iter([("channel", "C1")]))
                .await
        })
        .unwrap();

    dispatcher.run(&rt).await;
    let err = handle.try_take().unwrap().unwrap_err();
    let api_err = err.downcast_ref::<SlackApiError>().unwrap();
    assert_eq!(api_err.code(), Some("not_in_channel"));
    assert_eq!(api_err.params.get("channel"), Some("C1"));
}

#[tokio::test]
async fn fetch_list_walks_every_page() {
    let server = start_slack_mock().await;
    Mock::given(method("GET"))
        .and(path("/api/conversations.list"))
        .and(query_param("cursor", "page2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "ok": true,
            "channels": [{"id": "C2"}],
            "response_metadata": {"next_cursor": ""},
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/conversations.list"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "ok": true,
            "channels": [{"id": "C1"}],
            "response_metadata": {"next_cursor": "page2"},
        })))
        .mount(&server)
        .await;

    let (rt, mut dispatcher) = runtime();
    let api = SlackApi::new(rt.clone(), "acme", RequestOptions::new(), 5)
        .with_base_url(api_base(&server));
    let handle = rt
        .create_task(async move {
            api.fetch_list("conversations.list", "channels", &ApiParams::new(), 0)
                .await
        })
        .unwrap();

    dispatcher.run(&rt).await;
    let reply = handle.try_take().unwrap().unwrap();
    assert_eq!(reply["channels"], json!([{"id": "C1"}, {"id": "C2"}]));
}

#[tokio::test]
async fn gathered_calls_run_concurrently() {
    let server = start_slack_mock().await;
    mount_method(&server, "users.info", json!({"ok": true, "user": {"id": "U"}})).await;

    let (rt, mut dispatcher) = runtime();
    let api = SlackApi::new(rt.clone(), "acme", RequestOptions::new(), 5)
        .with_base_url(api_base(&server));
    let outer = rt.clone();
    let handle = rt
        .create_task(async move {
            let calls = ["U1", "U2", "U3"].map(|user| {
                let api = api.clone();
                async move {
                    api.fetch("users.info", &ApiParams::from_iter([("user", user)]))
                        .await
                }
            });
            outer.gather(calls).await
        })
        .unwrap();

    assert_eq!(rt.active_task_count(), 4);
    dispatcher.run(&rt).await;
    let replies = handle.try_take().unwrap().unwrap();
    assert_eq!(replies.len(), 3);
    assert_eq!(server.received_requests().await.unwrap().len(), 3);
}
