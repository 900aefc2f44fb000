//! The bridge between suspension points and the host's hook API.
//!
//! The host only knows callbacks: a hook is registered with a correlation
//! token, and later the host calls back with that token and a payload. Each
//! token here is the [`FutureId`] of the suspension point waiting for it, and
//! every callback funnels into [`Runtime::deliver`].

use tracing::debug;
use weeslack_types::{FutureId, HostEvent, ProcessOptions};

use crate::fd;
use crate::runtime::{Runtime, SchedulerError};

/// Hook registration surface of the host application.
///
/// Implementations must not deliver synchronously from inside a `hook_*`
/// call: the suspension point registers itself only after the hook call
/// returns, so events have to arrive through a later dispatch.
pub trait Host {
    /// Register a timer; on fire the host delivers [`HostEvent::Timer`].
    fn hook_timer(&self, interval_ms: u64, align_second: u32, max_calls: u32, token: FutureId);

    /// Spawn `command`; the host delivers one or more [`HostEvent::Process`]
    /// chunks, all but the last with return code `-1`.
    fn hook_process_hashtable(
        &self,
        command: &str,
        options: &ProcessOptions,
        timeout_ms: u64,
        token: FutureId,
    );

    /// Free slots in this process's descriptor table.
    fn available_file_descriptors(&self) -> usize {
        fd::available_file_descriptors()
    }
}

impl Runtime {
    /// Suspend the current task for `milliseconds`.
    ///
    /// Resolves to the timer's fire count.
    pub async fn sleep(&self, milliseconds: u64) -> anyhow::Result<u32> {
        let token = FutureId::new();
        self.host().hook_timer(milliseconds, 0, 1, token);
        match self.wait_event(token).await? {
            HostEvent::Timer { fire_count } => Ok(fire_count),
            other => {
                debug!(future_id = %token, kind = other.kind(), "timer resumed with wrong event");
                Err(SchedulerError::UnexpectedPayload {
                    future_id: token,
                    expected: "timer",
                    got: other.kind(),
                }
                .into())
            }
        }
    }
}
