//! Payloads the host hands back when a hook fires.

use std::collections::BTreeMap;

/// Option map passed through to the host's process hook.
///
/// Ordered so the same request always produces the same hook arguments.
pub type ProcessOptions = BTreeMap<String, String>;

/// Return code the host uses for "more output follows".
pub const PROCESS_RUNNING: i32 = -1;

/// Return code the host uses when a process could not run or timed out.
pub const PROCESS_ERROR: i32 = -2;

/// One delivery from a process hook.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessChunk {
    pub label: String,
    pub return_code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl ProcessChunk {
    pub fn new(
        label: impl Into<String>,
        return_code: i32,
        stdout: impl Into<String>,
        stderr: impl Into<String>,
    ) -> Self {
        Self {
            label: label.into(),
            return_code,
            stdout: stdout.into(),
            stderr: stderr.into(),
        }
    }

    #[must_use]
    pub const fn is_final(&self) -> bool {
        self.return_code != PROCESS_RUNNING
    }
}

/// Everything a process produced, joined across all of its deliveries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessOutput {
    pub command: String,
    pub return_code: i32,
    pub stdout: String,
    pub stderr: String,
}

/// An event delivered by the host for a registered hook.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostEvent {
    Timer { fire_count: u32 },
    Process(ProcessChunk),
}

impl HostEvent {
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Timer { .. } => "timer",
            Self::Process(_) => "process",
        }
    }
}
