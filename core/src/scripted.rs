//! In-process host with a simulated clock, for driving the runtime in tests.
//!
//! Hook registrations are recorded instead of executed. Tests inspect them
//! through [`ScriptedHost::calls`] and answer them with
//! [`ScriptedHost::fire_next_timer`] or [`ScriptedHost::deliver_process`].

use std::cell::{Cell, RefCell};

use weeslack_types::{FutureId, HostEvent, ProcessChunk, ProcessOptions};

use crate::host::Host;
use crate::runtime::{Runtime, SchedulerError};

/// A hook registration as the host received it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HookCall {
    Timer {
        interval_ms: u64,
        align_second: u32,
        max_calls: u32,
        token: FutureId,
    },
    Process {
        command: String,
        options: ProcessOptions,
        timeout_ms: u64,
        token: FutureId,
    },
}

impl HookCall {
    #[must_use]
    pub fn token(&self) -> FutureId {
        match self {
            Self::Timer { token, .. } | Self::Process { token, .. } => *token,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct PendingTimer {
    due_ms: u64,
    token: FutureId,
}

#[derive(Debug)]
pub struct ScriptedHost {
    calls: RefCell<Vec<HookCall>>,
    timers: RefCell<Vec<PendingTimer>>,
    clock_ms: Cell<u64>,
    free_fds: Cell<usize>,
}

impl Default for ScriptedHost {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedHost {
    #[must_use]
    pub fn new() -> Self {
        Self {
            calls: RefCell::new(Vec::new()),
            timers: RefCell::new(Vec::new()),
            clock_ms: Cell::new(0),
            free_fds: Cell::new(usize::MAX),
        }
    }

    /// Every hook registered so far, oldest first.
    #[must_use]
    pub fn calls(&self) -> Vec<HookCall> {
        self.calls.borrow().clone()
    }

    pub fn take_calls(&self) -> Vec<HookCall> {
        std::mem::take(&mut *self.calls.borrow_mut())
    }

    #[must_use]
    pub fn last_call(&self) -> Option<HookCall> {
        self.calls.borrow().last().cloned()
    }

    /// Simulated milliseconds elapsed; advanced only by firing timers.
    #[must_use]
    pub fn now_ms(&self) -> u64 {
        self.clock_ms.get()
    }

    pub fn set_available_file_descriptors(&self, free: usize) {
        self.free_fds.set(free);
    }

    #[must_use]
    pub fn has_pending_timers(&self) -> bool {
        !self.timers.borrow().is_empty()
    }

    /// Fire the timer due soonest, advancing the clock to its due time.
    ///
    /// Timers due at the same instant fire in registration order.
    ///
    /// # Panics
    ///
    /// Panics if no timer is pending.
    pub fn fire_next_timer(&self, rt: &Runtime) -> Result<(), SchedulerError> {
        let next = {
            let mut timers = self.timers.borrow_mut();
            let Some(index) = timers
                .iter()
                .enumerate()
                .min_by_key(|(i, t)| (t.due_ms, *i))
                .map(|(i, _)| i)
            else {
                panic!("no pending timers");
            };
            timers.remove(index)
        };
        self.clock_ms.set(self.clock_ms.get().max(next.due_ms));
        rt.deliver(next.token, HostEvent::Timer { fire_count: 1 })
    }

    /// Deliver one process output chunk for `token`.
    pub fn deliver_process(
        &self,
        rt: &Runtime,
        token: FutureId,
        return_code: i32,
        stdout: &str,
        stderr: &str,
    ) -> Result<(), SchedulerError> {
        let command = self
            .calls
            .borrow()
            .iter()
            .find_map(|call| match call {
                HookCall::Process { command, token: t, .. } if *t == token => {
                    Some(command.clone())
                }
                _ => None,
            })
            .unwrap_or_default();
        rt.deliver(
            token,
            HostEvent::Process(ProcessChunk::new(command, return_code, stdout, stderr)),
        )
    }

    /// Command and token of the most recent process hook.
    #[must_use]
    pub fn pending_process(&self) -> Option<(String, FutureId)> {
        self.calls.borrow().iter().rev().find_map(|call| match call {
            HookCall::Process { command, token, .. } => Some((command.clone(), *token)),
            HookCall::Timer { .. } => None,
        })
    }
}

impl Host for ScriptedHost {
    fn hook_timer(&self, interval_ms: u64, align_second: u32, max_calls: u32, token: FutureId) {
        self.calls.borrow_mut().push(HookCall::Timer {
            interval_ms,
            align_second,
            max_calls,
            token,
        });
        self.timers.borrow_mut().push(PendingTimer {
            due_ms: self.clock_ms.get() + interval_ms,
            token,
        });
    }

    fn hook_process_hashtable(
        &self,
        command: &str,
        options: &ProcessOptions,
        timeout_ms: u64,
        token: FutureId,
    ) {
        self.calls.borrow_mut().push(HookCall::Process {
            command: command.to_string(),
            options: options.clone(),
            timeout_ms,
            token,
        });
    }

    fn available_file_descriptors(&self) -> usize {
        self.free_fds.get()
    }
}
