//! Config-driven command setup

use weeslack::commands::{Command, workspace_api};
use weeslack_config::WeeslackConfig;

use crate::common::runtime;

const CONFIG: &str = r#"
[network]
timeout_secs = 12

[workspaces.acme]
api_token = "xoxc-test"
api_cookies = "d=abc"
"#;

#[tokio::test]
async fn workspace_api_uses_configured_workspace() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(&path, CONFIG).unwrap();
    let config = WeeslackConfig::load_from(&path).unwrap().unwrap();

    let (rt, _dispatcher) = runtime();
    let api = workspace_api(&rt, &config, "acme").unwrap();
    assert_eq!(api.workspace(), "acme");
    let debug = format!("{api:?}");
    assert!(debug.contains("timeout_secs: 12"));
    assert!(!debug.contains("xoxc-test"));

    let err = workspace_api(&rt, &config, "other").unwrap_err();
    assert_eq!(err.to_string(), "workspace 'other' is not configured");
}

#[test]
fn fetch_command_round_trips_through_parser() {
    let command = Command::parse(
        ["fetch", "acme", "conversations.history", "channel=C1", "--pages", "-1"]
            .map(String::from),
    )
    .unwrap();
    let Command::Fetch { params, pages, list_key, .. } = command else {
        panic!("expected fetch");
    };
    assert_eq!(params.get("channel"), Some("C1"));
    assert_eq!(pages, -1);
    assert!(list_key.is_none());
}
