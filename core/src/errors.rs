//! History of errors that escaped final tasks, and their one-line rendering.

use std::fmt::Write;
use std::rc::Rc;

use chrono::{DateTime, Local};
use thiserror::Error;
use uuid::Uuid;
use weeslack_types::{HttpError, SlackApiError, SlackError};

/// An error nobody handled, stamped with an id so it can be looked up later.
#[derive(Debug, Clone)]
pub struct UncaughtError {
    id: Uuid,
    timestamp: DateTime<Local>,
    error: Rc<anyhow::Error>,
}

impl UncaughtError {
    #[must_use]
    pub fn new(error: anyhow::Error) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Local::now(),
            error: Rc::new(error),
        }
    }

    #[must_use]
    pub fn id(&self) -> Uuid {
        self.id
    }

    #[must_use]
    pub fn timestamp(&self) -> DateTime<Local> {
        self.timestamp
    }

    #[must_use]
    pub fn error(&self) -> &anyhow::Error {
        &self.error
    }

    /// Multi-line report: header, then the full cause chain.
    #[must_use]
    pub fn describe(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(
            out,
            "Error {} at {}:",
            self.id,
            self.timestamp.format("%Y-%m-%d %H:%M:%S")
        );
        for (depth, cause) in self.error.chain().enumerate() {
            if depth == 0 {
                let _ = writeln!(out, "  {cause}");
            } else {
                let _ = writeln!(out, "  caused by: {cause}");
            }
        }
        out
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ErrorLookupError {
    #[error("No errors have occurred")]
    NoErrors,
    #[error("Only {available} error(s) have occurred")]
    OutOfRange { requested: usize, available: usize },
    #[error("Error {0} not found")]
    NotFound(String),
}

/// Append-only, oldest first.
#[derive(Debug, Default)]
pub struct UncaughtErrors {
    errors: Vec<UncaughtError>,
}

impl UncaughtErrors {
    pub fn record(&mut self, error: anyhow::Error) -> UncaughtError {
        let record = UncaughtError::new(error);
        self.errors.push(record.clone());
        record
    }

    #[must_use]
    pub fn all(&self) -> &[UncaughtError] {
        &self.errors
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.errors.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    #[must_use]
    pub fn last(&self) -> Option<&UncaughtError> {
        self.errors.last()
    }

    /// The `n` most recent errors, oldest first.
    #[must_use]
    pub fn recent(&self, n: usize) -> &[UncaughtError] {
        let start = self.errors.len().saturating_sub(n);
        &self.errors[start..]
    }

    /// Resolve a selector: a positive number counts back from the most recent
    /// (`1` is the last error); anything else is matched against error ids.
    pub fn find(&self, selector: Option<&str>) -> Result<&UncaughtError, ErrorLookupError> {
        let Some(selector) = selector else {
            return self.last().ok_or(ErrorLookupError::NoErrors);
        };
        match selector.parse::<usize>() {
            Ok(n) if n > 0 && selector.bytes().all(|b| b.is_ascii_digit()) => {
                let available = self.errors.len();
                if n > available {
                    return Err(ErrorLookupError::OutOfRange {
                        requested: n,
                        available,
                    });
                }
                Ok(&self.errors[available - n])
            }
            _ => self
                .errors
                .iter()
                .find(|e| e.id.to_string() == selector)
                .ok_or_else(|| ErrorLookupError::NotFound(selector.to_string())),
        }
    }
}

/// One-line message for an uncaught error, specialised by error type.
#[must_use]
pub fn format_uncaught_error(record: &UncaughtError) -> String {
    let err = record.error();
    let details = format!("error id {}", record.id);

    if let Some(e) = err.downcast_ref::<HttpError>() {
        format!(
            "Error calling URL {}: return code: {}, http status code: {}, error: {} ({details})",
            e.url, e.return_code, e.http_status, e.error
        )
    } else if let Some(e) = err.downcast_ref::<SlackApiError>() {
        format!(
            "Error from Slack API method {} with params {} for workspace {}: {} ({details})",
            e.method, e.params, e.workspace, e.response
        )
    } else if let Some(e) = err.downcast_ref::<SlackError>() {
        format!(
            "Error occurred in workspace {}: {} ({details})",
            e.workspace, e.error
        )
    } else {
        format!("Unknown error occurred: {err:#} ({details})")
    }
}
