//! HTTP requests through the host's `url:` process transport.
//!
//! The transport returns the status line, headers and body as one blob. This
//! crate builds the transport options, splits the blob apart, and applies the
//! retry policy: bounded retries for transport failures, unbounded waits for
//! rate limiting, no retries for error statuses.

mod options;
mod response;
mod retry;

pub use options::{ProxyConfig, RequestOptions, user_agent};
pub use response::{Response, parse_response};
pub use retry::{DEFAULT_MAX_RETRIES, RetryPolicy, http_request, http_request_with};
