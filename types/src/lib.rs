//! Core domain types for wee-slack.
//!
//! This crate contains pure domain types with no IO, no async, and minimal dependencies.
//! Everything here can be used from any layer of the application.

mod error;
mod event;
mod ids;

pub use error::{ApiParams, HttpError, SlackApiError, SlackError};
pub use event::{
    HostEvent, PROCESS_ERROR, PROCESS_RUNNING, ProcessChunk, ProcessOptions, ProcessOutput,
};
pub use ids::FutureId;
