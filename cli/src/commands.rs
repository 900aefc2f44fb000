//! Command-line commands and the tasks that carry them out.

use serde_json::Value;
use thiserror::Error;
use weeslack_api::SlackApi;
use weeslack_config::{ProxySettings, WeeslackConfig};
use weeslack_core::Runtime;
use weeslack_http::{ProxyConfig, RequestOptions};
use weeslack_types::ApiParams;

pub const USAGE: &str = "\
usage:
  weeslack fetch <workspace> <method> [key=value ...] [--list <key>] [--pages <n>]
  weeslack sleep <milliseconds>";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Call an API method and print the JSON reply.
    Fetch {
        workspace: String,
        method: String,
        params: ApiParams,
        /// Paginate, concatenating this array across pages.
        list_key: Option<String>,
        /// Pages to fetch when paginating; zero or negative means all.
        pages: i32,
    },
    Sleep { milliseconds: u64 },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UsageError {
    #[error("missing command")]
    MissingCommand,
    #[error("unknown command '{0}'")]
    UnknownCommand(String),
    #[error("missing argument <{0}>")]
    MissingArgument(&'static str),
    #[error("invalid value '{value}' for {name}")]
    InvalidValue { name: &'static str, value: String },
    #[error("unexpected argument '{0}'")]
    UnexpectedArgument(String),
}

impl Command {
    /// Parse the arguments following the program name.
    pub fn parse<I>(args: I) -> Result<Self, UsageError>
    where
        I: IntoIterator<Item = String>,
    {
        let mut args = args.into_iter();
        let command = args.next().ok_or(UsageError::MissingCommand)?;
        match command.as_str() {
            "fetch" => Self::parse_fetch(args),
            "sleep" => {
                let raw = args.next().ok_or(UsageError::MissingArgument("milliseconds"))?;
                let milliseconds = raw.parse().map_err(|_| UsageError::InvalidValue {
                    name: "milliseconds",
                    value: raw.clone(),
                })?;
                if let Some(extra) = args.next() {
                    return Err(UsageError::UnexpectedArgument(extra));
                }
                Ok(Self::Sleep { milliseconds })
            }
            _ => Err(UsageError::UnknownCommand(command)),
        }
    }

    fn parse_fetch(mut args: impl Iterator<Item = String>) -> Result<Self, UsageError> {
        let workspace = args.next().ok_or(UsageError::MissingArgument("workspace"))?;
        let method = args.next().ok_or(UsageError::MissingArgument("method"))?;
        let mut params = ApiParams::new();
        let mut list_key = None;
        let mut pages = 1;

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--list" => {
                    list_key = Some(args.next().ok_or(UsageError::MissingArgument("key"))?);
                }
                "--pages" => {
                    let raw = args.next().ok_or(UsageError::MissingArgument("n"))?;
                    pages = raw.parse().map_err(|_| UsageError::InvalidValue {
                        name: "--pages",
                        value: raw.clone(),
                    })?;
                }
                _ => match arg.split_once('=') {
                    Some((key, value)) if !key.is_empty() => params.push(key, value),
                    _ => return Err(UsageError::UnexpectedArgument(arg)),
                },
            }
        }

        Ok(Self::Fetch {
            workspace,
            method,
            params,
            list_key,
            pages,
        })
    }
}

fn proxy_config(settings: &ProxySettings) -> ProxyConfig {
    ProxyConfig {
        proxy_type: settings.proxy_type.clone(),
        address: settings.address.clone(),
        port: settings.port,
        username: settings.username.clone(),
        password: settings.password.clone(),
    }
}

/// Build the API client for `workspace` from its configuration.
pub fn workspace_api(
    rt: &Runtime,
    config: &WeeslackConfig,
    workspace: &str,
) -> anyhow::Result<SlackApi> {
    let Some(settings) = config.workspace(workspace) else {
        anyhow::bail!("workspace '{workspace}' is not configured");
    };

    let mut options = RequestOptions::new().with_token(&settings.api_token);
    if let Some(cookies) = settings.api_cookies.as_ref().filter(|c| !c.is_empty()) {
        options = options.with_cookies(cookies);
    }
    if let Some(proxy) = &config.network.proxy {
        options = options.with_proxy(proxy_config(proxy));
    }

    Ok(SlackApi::new(rt.clone(), workspace, options, config.timeout_secs(settings))
        .with_max_retries(config.network.max_retries))
}

/// Run a fetch command to completion and return the reply.
pub async fn fetch(
    api: &SlackApi,
    method: &str,
    params: &ApiParams,
    list_key: Option<&str>,
    pages: i32,
) -> anyhow::Result<Value> {
    match list_key {
        Some(key) => api.fetch_list(method, key, params, pages).await,
        None => api.fetch(method, params).await,
    }
}

#[cfg(test)]
mod tests {
    use weeslack_types::ApiParams;

    use super::{Command, UsageError};

    fn parse(args: &[&str]) -> Result<Command, UsageError> {
        Command::parse(args.iter().map(ToString::to_string))
    }

    #[test]
    fn parses_fetch_with_params_and_paging() {
        let command = parse(&[
            "fetch",
            "acme",
            "users.list",
            "limit=100",
            "--list",
            "members",
            "--pages",
            "0",
        ])
        .unwrap();
        assert_eq!(
            command,
            Command::Fetch {
                workspace: "acme".to_string(),
                method: "users.list".to_string(),
                params: ApiParams::from_iter([("limit", "100")]),
                list_key: Some("members".to_string()),
                pages: 0,
            }
        );
    }

    #[test]
    fn parses_sleep() {
        assert_eq!(
            parse(&["sleep", "250"]).unwrap(),
            Command::Sleep { milliseconds: 250 }
        );
    }

    #[test]
    fn reports_usage_errors() {
        assert_eq!(parse(&[]).unwrap_err(), UsageError::MissingCommand);
        assert_eq!(
            parse(&["frobnicate"]).unwrap_err(),
            UsageError::UnknownCommand("frobnicate".to_string())
        );
        assert_eq!(
            parse(&["fetch", "acme"]).unwrap_err(),
            UsageError::MissingArgument("method")
        );
        assert_eq!(
            parse(&["fetch", "acme", "auth.test", "oops"]).unwrap_err(),
            UsageError::UnexpectedArgument("oops".to_string())
        );
        assert!(matches!(
            parse(&["sleep", "soon"]).unwrap_err(),
            UsageError::InvalidValue { name: "milliseconds", .. }
        ));
    }
}
