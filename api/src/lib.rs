//! Slack Web API calls for one workspace.

use serde_json::Value;
use tracing::debug;
use url::form_urlencoded;
use weeslack_core::Runtime;
use weeslack_http::{DEFAULT_MAX_RETRIES, RequestOptions, http_request};
use weeslack_types::{ApiParams, SlackApiError, SlackError};

pub const DEFAULT_BASE_URL: &str = "https://api.slack.com/api";

/// Client bound to one workspace's credentials and timeout.
#[derive(Clone)]
pub struct SlackApi {
    rt: Runtime,
    workspace: String,
    options: RequestOptions,
    timeout_secs: u64,
    max_retries: u32,
    base_url: String,
}

impl std::fmt::Debug for SlackApi {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SlackApi")
            .field("workspace", &self.workspace)
            .field("options", &self.options)
            .field("timeout_secs", &self.timeout_secs)
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl SlackApi {
    pub fn new(
        rt: Runtime,
        workspace: impl Into<String>,
        options: RequestOptions,
        timeout_secs: u64,
    ) -> Self {
        Self {
            rt,
            workspace: workspace.into(),
            options,
            timeout_secs,
            max_retries: DEFAULT_MAX_RETRIES,
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }

    #[must_use]
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Point the client somewhere other than `api.slack.com`.
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    #[must_use]
    pub fn workspace(&self) -> &str {
        &self.workspace
    }

    #[must_use]
    pub fn method_url(&self, method: &str, params: &ApiParams) -> String {
        let query = form_urlencoded::Serializer::new(String::new())
            .extend_pairs(params.iter())
            .finish();
        format!("{}/{method}?{query}", self.base_url)
    }

    /// Call `method` and return the decoded reply.
    ///
    /// A reply with `"ok": false` fails with [`SlackApiError`]; a reply that is
    /// not JSON fails with [`SlackError`].
    pub async fn fetch(&self, method: &str, params: &ApiParams) -> anyhow::Result<Value> {
        let url = self.method_url(method, params);
        let body = http_request(
            &self.rt,
            &url,
            &self.options.to_process_options(),
            self.timeout_secs.saturating_mul(1000),
            self.max_retries,
        )
        .await?;

        let response: Value = serde_json::from_str(&body).map_err(|err| {
            SlackError::new(&self.workspace, format!("invalid JSON from {method}: {err}"))
                .with_data(Value::String(body.clone()))
        })?;

        if response.get("ok").and_then(Value::as_bool) != Some(true) {
            return Err(SlackApiError {
                workspace: self.workspace.clone(),
                method: method.to_string(),
                params: params.clone(),
                response,
            }
            .into());
        }
        debug!(workspace = %self.workspace, method, "api call succeeded");
        Ok(response)
    }

    /// Call a paginated `method`, following `response_metadata.next_cursor`
    /// and appending each page's `list_key` array to the first reply.
    ///
    /// `pages` is the number of pages to fetch; zero or negative fetches all.
    pub async fn fetch_list(
        &self,
        method: &str,
        list_key: &str,
        params: &ApiParams,
        pages: i32,
    ) -> anyhow::Result<Value> {
        let mut params = params.clone();
        let mut response = self.fetch(method, &params).await?;
        let mut cursor = next_cursor(&response);
        let mut pages_left = pages;

        while pages_left != 1
            && let Some(next) = cursor
        {
            params.set("cursor", &next);
            let page = self.fetch(method, &params).await?;
            cursor = next_cursor(&page);
            self.append_page(&mut response, page, method, list_key)?;
            pages_left = pages_left.saturating_sub(1);
        }
        Ok(response)
    }

    fn append_page(
        &self,
        response: &mut Value,
        mut page: Value,
        method: &str,
        list_key: &str,
    ) -> Result<(), SlackError> {
        let missing = || {
            SlackError::new(
                &self.workspace,
                format!("{method} reply has no '{list_key}' list"),
            )
        };
        let items = page
            .get_mut(list_key)
            .and_then(Value::as_array_mut)
            .map(std::mem::take)
            .ok_or_else(missing)?;
        response
            .get_mut(list_key)
            .and_then(Value::as_array_mut)
            .ok_or_else(missing)?
            .extend(items);
        Ok(())
    }
}

fn next_cursor(response: &Value) -> Option<String> {
    response
        .pointer("/response_metadata/next_cursor")
        .and_then(Value::as_str)
        .filter(|cursor| !cursor.is_empty())
        .map(ToString::to_string)
}
