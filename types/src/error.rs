//! Errors raised by request and API code.
//!
//! These travel through the task completion channel as `anyhow::Error` and are
//! recovered with `downcast_ref` where their fields matter.

use std::fmt;

use thiserror::Error;

/// A request that could not be completed, or completed with an error status.
///
/// `http_status` is 0 when no HTTP response was obtained (transport failure or
/// an unparsable reply).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error(
    "HttpError: url='{url}', return_code={return_code}, http_status_code={http_status}, error='{error}'"
)]
pub struct HttpError {
    pub url: String,
    pub return_code: i32,
    pub http_status: u16,
    pub error: String,
}

impl HttpError {
    pub fn new(
        url: impl Into<String>,
        return_code: i32,
        http_status: u16,
        error: impl Into<String>,
    ) -> Self {
        Self {
            url: url.into(),
            return_code,
            http_status,
            error: error.into(),
        }
    }
}

/// Query parameters sent with an API call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ApiParams(pub Vec<(String, String)>);

impl ApiParams {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, key: impl Into<String>, value: impl ToString) {
        self.0.push((key.into(), value.to_string()));
    }

    /// Replace an existing parameter or append it.
    pub fn set(&mut self, key: &str, value: impl ToString) {
        let value = value.to_string();
        match self.0.iter_mut().find(|(k, _)| k == key) {
            Some(entry) => entry.1 = value,
            None => self.0.push((key.to_string(), value)),
        }
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl fmt::Display for ApiParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("{")?;
        for (i, (key, value)) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "'{key}': '{value}'")?;
        }
        f.write_str("}")
    }
}

impl<K: Into<String>, V: ToString> FromIterator<(K, V)> for ApiParams {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.to_string()))
                .collect(),
        )
    }
}

/// The API answered, but with `"ok": false`.
#[derive(Debug, Clone, Error)]
#[error(
    "SlackApiError: workspace={workspace}, method='{method}', params={params}, response={response}"
)]
pub struct SlackApiError {
    pub workspace: String,
    pub method: String,
    pub params: ApiParams,
    pub response: serde_json::Value,
}

impl SlackApiError {
    /// The `error` code from the response, if present.
    #[must_use]
    pub fn code(&self) -> Option<&str> {
        self.response.get("error").and_then(serde_json::Value::as_str)
    }
}

/// A workspace-level failure that is not tied to a single API call result.
#[derive(Debug, Clone, Error)]
#[error("SlackError: workspace={workspace}, error={error}")]
pub struct SlackError {
    pub workspace: String,
    pub error: String,
    pub data: Option<serde_json::Value>,
}

impl SlackError {
    pub fn new(workspace: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            workspace: workspace.into(),
            error: error.into(),
            data: None,
        }
    }

    #[must_use]
    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data = Some(data);
        self
    }
}
