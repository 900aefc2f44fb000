//! Request retry policy.
//!
//! # Policy
//!
//! - Transport failure (non-zero return code, or anything on stderr): wait
//!   [`RetryPolicy::transport_backoff`] and retry, at most
//!   [`RetryPolicy::max_retries`] times.
//! - HTTP 429 with an integer `Retry-After`: wait that many seconds and retry.
//!   These retries are not counted against the budget.
//! - Any other status >= 400: fail immediately with the body as error text.

use std::time::Duration;

use tracing::{debug, info};
use weeslack_core::Runtime;
use weeslack_types::{HttpError, ProcessOptions};

use crate::response::parse_response;

/// Transport retries when the caller does not choose.
pub const DEFAULT_MAX_RETRIES: u32 = 5;

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Retries after a transport failure, not counting the first attempt.
    pub max_retries: u32,
    /// Wait before each transport retry.
    pub transport_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            transport_backoff: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    #[must_use]
    pub fn with_max_retries(max_retries: u32) -> Self {
        Self {
            max_retries,
            ..Self::default()
        }
    }
}

/// GET `url` and return the response body.
pub async fn http_request(
    rt: &Runtime,
    url: &str,
    options: &ProcessOptions,
    timeout_ms: u64,
    max_retries: u32,
) -> anyhow::Result<String> {
    http_request_with(
        rt,
        url,
        options,
        timeout_ms,
        &RetryPolicy::with_max_retries(max_retries),
    )
    .await
}

/// [`http_request`] with an explicit [`RetryPolicy`].
pub async fn http_request_with(
    rt: &Runtime,
    url: &str,
    options: &ProcessOptions,
    timeout_ms: u64,
    policy: &RetryPolicy,
) -> anyhow::Result<String> {
    let mut options = options.clone();
    options.insert("header".to_string(), "1".to_string());
    let command = format!("url:{url}");
    let backoff_ms = policy.transport_backoff.as_millis() as u64;
    let mut retries_left = policy.max_retries;

    loop {
        let output = rt
            .hook_process_hashtable(&command, &options, timeout_ms)
            .await?;

        if output.return_code != 0 || !output.stderr.is_empty() {
            if retries_left > 0 {
                info!(
                    max_retries = retries_left,
                    return_code = output.return_code,
                    error = %output.stderr,
                    url,
                    "HTTP error, retrying"
                );
                rt.sleep(backoff_ms).await?;
                retries_left -= 1;
                continue;
            }
            return Err(HttpError::new(url, output.return_code, 0, output.stderr).into());
        }

        let response = parse_response(url, output.return_code, &output.stdout)?;

        if response.status == 429
            && let Some(retry_after) = response.retry_after_secs()
        {
            info!(retry_after, url, "HTTP ratelimit, retrying");
            rt.sleep(retry_after.saturating_mul(1000)).await?;
            continue;
        }

        if response.status >= 400 {
            debug!(status = response.status, url, "HTTP error status");
            return Err(HttpError::new(
                url,
                output.return_code,
                response.status,
                response.body,
            )
            .into());
        }

        return Ok(response.body);
    }
}
