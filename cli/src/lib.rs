//! Standalone host for the weeslack runtime: a tokio event loop standing in
//! for the chat client's hook API, and the commands the binary runs on it.

pub mod commands;
mod host;

pub use host::{Dispatcher, TokioHost};
