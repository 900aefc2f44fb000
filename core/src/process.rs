//! Subprocess hook with output aggregation and descriptor backpressure.

use tracing::{debug, trace};
use weeslack_types::{FutureId, HostEvent, PROCESS_RUNNING, ProcessOptions, ProcessOutput};

use crate::runtime::{Runtime, SchedulerError};

/// Free descriptors required before another subprocess may be spawned.
pub const MIN_FREE_FILE_DESCRIPTORS: usize = 10;

/// How long to wait between descriptor checks.
pub const FD_POLL_INTERVAL_MS: u64 = 10;

impl Runtime {
    /// Run `command` through the host and collect all of its output.
    ///
    /// Waits (in [`FD_POLL_INTERVAL_MS`] sleeps, so other tasks keep running)
    /// until at least [`MIN_FREE_FILE_DESCRIPTORS`] descriptors are free, then
    /// registers the process hook and accumulates every delivered chunk until
    /// one carries a return code other than `-1`.
    pub async fn hook_process_hashtable(
        &self,
        command: &str,
        options: &ProcessOptions,
        timeout_ms: u64,
    ) -> anyhow::Result<ProcessOutput> {
        let token = FutureId::new();
        debug!(future_id = %token, command, "hook_process_hashtable calling");

        let mut gated = false;
        while self.host().available_file_descriptors() < MIN_FREE_FILE_DESCRIPTORS {
            if !gated {
                debug!(future_id = %token, "waiting for free file descriptors");
                gated = true;
            }
            self.sleep(FD_POLL_INTERVAL_MS).await?;
        }
        self.host()
            .hook_process_hashtable(command, options, timeout_ms, token);

        let mut stdout = String::new();
        let mut stderr = String::new();
        let mut return_code = PROCESS_RUNNING;

        while return_code == PROCESS_RUNNING {
            let chunk = match self.wait_event(token).await? {
                HostEvent::Process(chunk) => chunk,
                other => {
                    return Err(SchedulerError::UnexpectedPayload {
                        future_id: token,
                        expected: "process",
                        got: other.kind(),
                    }
                    .into());
                }
            };
            trace!(
                future_id = %token,
                command,
                return_code = chunk.return_code,
                "hook_process_hashtable intermediary response"
            );
            stdout.push_str(&chunk.stdout);
            stderr.push_str(&chunk.stderr);
            return_code = chunk.return_code;
        }

        if stderr.is_empty() {
            debug!(
                future_id = %token,
                command,
                return_code,
                response_length = stdout.len(),
                "hook_process_hashtable response"
            );
        } else {
            debug!(
                future_id = %token,
                command,
                return_code,
                response_length = stdout.len(),
                error = %stderr,
                "hook_process_hashtable response"
            );
        }

        Ok(ProcessOutput {
            command: command.to_string(),
            return_code,
            stdout,
            stderr,
        })
    }
}
