//! The scheduler: drives task coroutines between host callbacks.
//!
//! # Completion registry
//!
//! Every id the scheduler tracks maps to exactly one [`Slot`]:
//!
//! | Slot | Meaning |
//! |------|---------|
//! | `Awaited(task)` | `task` is suspended waiting for this id (a host event or another task) |
//! | `Completed(outcome)` | the task with this id finished before anyone awaited it |
//!
//! Tasks start eagerly inside [`Runtime::create_task`], so a child can finish
//! before its creator reaches the `.await`. The child then parks its outcome as
//! `Completed`, and the parent picks it up the moment it suspends on the
//! child's id, without a host round-trip. Because both states share one map an
//! id can never be both awaited and completed at once; the remaining misuse
//! cases (awaiting an id twice, completing twice) are reported as
//! [`SchedulerError`].

use std::cell::{Ref, RefCell};
use std::collections::HashMap;
use std::future::Future;
use std::rc::Rc;
use std::task::{Context, Poll};

use futures_util::task::noop_waker_ref;
use thiserror::Error;
use tracing::{debug, error, trace};
use weeslack_types::{FutureId, HostEvent};

use crate::errors::{ErrorLookupError, UncaughtError, UncaughtErrors, format_uncaught_error};
use crate::host::Host;
use crate::task::{Outcome, Resume, Suspend, Task, TaskHandle, TaskKind};

/// Programming-defect class failures of the scheduler.
///
/// These abort the offending task chain: the tasks involved are dropped
/// instead of being re-registered.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchedulerError {
    #[error("future {future_id} is already awaited; task {task_id} cannot await it too")]
    AlreadyAwaited {
        future_id: FutureId,
        task_id: FutureId,
    },
    #[error("task {task_id} completed but its id already holds a stored completion")]
    AlreadyCompleted { task_id: FutureId },
    #[error("no task is waiting for {kind} event {token}")]
    UnknownToken {
        token: FutureId,
        kind: &'static str,
    },
    #[error("task {task_id} suspended on something other than a runtime future")]
    NoSuspensionPoint { task_id: FutureId },
    #[error("task {task_id} suspended on {count} futures at once")]
    MultipleSuspensionPoints { task_id: FutureId, count: usize },
    #[error("future {future_id} expected a {expected} but was resumed with a {got}")]
    UnexpectedPayload {
        future_id: FutureId,
        expected: &'static str,
        got: &'static str,
    },
    #[error("task {task_id} produced a value of a different type than its handle expects")]
    OutputType { task_id: FutureId },
}

enum Slot {
    Awaited(Task),
    Completed(Outcome),
}

enum Step {
    Suspended(FutureId),
    Finished(Outcome),
}

/// Ids known to the scheduler, for debug output.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegistrySnapshot {
    /// Ids some suspended task is waiting on.
    pub awaited: Vec<FutureId>,
    /// Task ids holding a completion nobody has collected yet.
    pub completed: Vec<FutureId>,
}

struct Inner {
    host: Rc<dyn Host>,
    registry: RefCell<HashMap<FutureId, Slot>>,
    resume: RefCell<Option<Resume>>,
    yielded: RefCell<Vec<FutureId>>,
    uncaught: RefCell<UncaughtErrors>,
}

/// Handle to the single-threaded scheduler.
///
/// Cheap to clone; coroutines capture a clone to create tasks and reach the
/// host. Not `Send`: every call happens on the host's dispatch thread.
#[derive(Clone)]
pub struct Runtime {
    inner: Rc<Inner>,
}

impl Runtime {
    pub fn new(host: Rc<dyn Host>) -> Self {
        Self {
            inner: Rc::new(Inner {
                host,
                registry: RefCell::new(HashMap::new()),
                resume: RefCell::new(None),
                yielded: RefCell::new(Vec::new()),
                uncaught: RefCell::new(UncaughtErrors::default()),
            }),
        }
    }

    pub(crate) fn host(&self) -> &dyn Host {
        self.inner.host.as_ref()
    }

    /// Start a task whose result some other task will await.
    ///
    /// The coroutine runs synchronously up to its first real suspension
    /// before this returns.
    pub fn create_task<T, F>(&self, future: F) -> Result<TaskHandle<T>, SchedulerError>
    where
        T: 'static,
        F: Future<Output = anyhow::Result<T>> + 'static,
    {
        let task = Task::new(TaskKind::Retrievable, future);
        let id = task.id;
        self.run(task, None)?;
        Ok(TaskHandle::new(self.clone(), id))
    }

    /// Start an entry-point task nobody will await.
    ///
    /// Its value is discarded; an error it returns is recorded in the
    /// uncaught error history and logged, never propagated to the host.
    pub fn create_final_task<T, F>(&self, future: F) -> Result<FutureId, SchedulerError>
    where
        T: 'static,
        F: Future<Output = anyhow::Result<T>> + 'static,
    {
        let task = Task::new(TaskKind::Final, future);
        let id = task.id;
        self.run(task, None)?;
        Ok(id)
    }

    /// Host callback entry point: resume whichever task waits on `token`.
    pub fn deliver(&self, token: FutureId, event: HostEvent) -> Result<(), SchedulerError> {
        let task = {
            let mut registry = self.inner.registry.borrow_mut();
            match registry.remove(&token) {
                Some(Slot::Awaited(task)) => task,
                Some(slot @ Slot::Completed(_)) => {
                    registry.insert(token, slot);
                    return Err(self.violation(SchedulerError::UnknownToken {
                        token,
                        kind: event.kind(),
                    }));
                }
                None => {
                    return Err(self.violation(SchedulerError::UnknownToken {
                        token,
                        kind: event.kind(),
                    }));
                }
            }
        };
        trace!(token = %token, task_id = %task.id, kind = event.kind(), "host event delivered");
        self.run(task, Some(Resume::Event(event)))
    }

    /// Suspend the current task until the host delivers an event for `token`.
    ///
    /// The caller must already have registered a hook carrying `token`.
    pub async fn wait_event(&self, token: FutureId) -> anyhow::Result<HostEvent> {
        match Suspend::new(self.clone(), token).await {
            Resume::Event(event) => Ok(event),
            other => Err(SchedulerError::UnexpectedPayload {
                future_id: token,
                expected: "host event",
                got: other.kind(),
            }
            .into()),
        }
    }

    /// Drive `task` until it suspends on something not yet available, or
    /// until it (and any parents it wakes) finish.
    fn run(&self, mut task: Task, mut incoming: Option<Resume>) -> Result<(), SchedulerError> {
        loop {
            match self.step(&mut task, incoming.take())? {
                Step::Suspended(future_id) => {
                    let mut registry = self.inner.registry.borrow_mut();
                    match registry.remove(&future_id) {
                        Some(Slot::Completed(outcome)) => {
                            trace!(
                                task_id = %task.id,
                                future_id = %future_id,
                                "awaited task already finished, resuming immediately"
                            );
                            incoming = Some(Resume::Outcome(outcome));
                        }
                        Some(slot @ Slot::Awaited(_)) => {
                            registry.insert(future_id, slot);
                            drop(registry);
                            return Err(self.violation(SchedulerError::AlreadyAwaited {
                                future_id,
                                task_id: task.id,
                            }));
                        }
                        None => {
                            trace!(task_id = %task.id, future_id = %future_id, "task suspended");
                            registry.insert(future_id, Slot::Awaited(task));
                            return Ok(());
                        }
                    }
                }
                Step::Finished(outcome) => {
                    let mut registry = self.inner.registry.borrow_mut();
                    match registry.remove(&task.id) {
                        Some(Slot::Awaited(parent)) => {
                            trace!(task_id = %task.id, parent_id = %parent.id, "resuming awaiting task");
                            task = parent;
                            incoming = Some(Resume::Outcome(outcome));
                        }
                        Some(slot @ Slot::Completed(_)) => {
                            registry.insert(task.id, slot);
                            drop(registry);
                            return Err(
                                self.violation(SchedulerError::AlreadyCompleted { task_id: task.id })
                            );
                        }
                        None => {
                            match task.kind {
                                TaskKind::Retrievable => {
                                    trace!(task_id = %task.id, "task finished before being awaited");
                                    registry.insert(task.id, Slot::Completed(outcome));
                                }
                                TaskKind::Final => {
                                    drop(registry);
                                    self.finish_final(&task, outcome);
                                }
                            }
                            return Ok(());
                        }
                    }
                }
            }
        }
    }

    /// Resume the coroutine once and report where it stopped.
    fn step(&self, task: &mut Task, incoming: Option<Resume>) -> Result<Step, SchedulerError> {
        if let Some(value) = incoming {
            *self.inner.resume.borrow_mut() = Some(value);
        }
        let mark = self.inner.yielded.borrow().len();

        let mut cx = Context::from_waker(noop_waker_ref());
        let poll = task.poll(&mut cx);

        let yielded = self.inner.yielded.borrow_mut().split_off(mark);
        if let Some(unused) = self.inner.resume.borrow_mut().take() {
            debug!(task_id = %task.id, kind = unused.kind(), "resume value was not consumed");
        }

        match poll {
            Poll::Ready(outcome) => Ok(Step::Finished(outcome)),
            Poll::Pending => match yielded.as_slice() {
                [future_id] => Ok(Step::Suspended(*future_id)),
                [] => Err(self.violation(SchedulerError::NoSuspensionPoint { task_id: task.id })),
                many => Err(self.violation(SchedulerError::MultipleSuspensionPoints {
                    task_id: task.id,
                    count: many.len(),
                })),
            },
        }
    }

    fn finish_final(&self, task: &Task, outcome: Outcome) {
        match outcome {
            Ok(_) => debug!(task_id = %task.id, polls = task.polls(), "final task finished"),
            Err(err) => {
                let record = self.inner.uncaught.borrow_mut().record(err);
                error!(task_id = %task.id, "{}", format_uncaught_error(&record));
            }
        }
    }

    fn violation(&self, err: SchedulerError) -> SchedulerError {
        error!(error = %err, "scheduler invariant violated");
        err
    }

    pub(crate) fn push_yield(&self, id: FutureId) {
        self.inner.yielded.borrow_mut().push(id);
    }

    pub(crate) fn take_resume(&self) -> Option<Resume> {
        self.inner.resume.borrow_mut().take()
    }

    pub(crate) fn take_completed(&self, task_id: FutureId) -> Option<Outcome> {
        let mut registry = self.inner.registry.borrow_mut();
        match registry.remove(&task_id) {
            Some(Slot::Completed(outcome)) => Some(outcome),
            Some(slot) => {
                registry.insert(task_id, slot);
                None
            }
            None => None,
        }
    }

    /// Number of ids a suspended task is waiting on.
    #[must_use]
    pub fn active_task_count(&self) -> usize {
        self.inner
            .registry
            .borrow()
            .values()
            .filter(|slot| matches!(slot, Slot::Awaited(_)))
            .count()
    }

    /// Number of finished tasks whose result nobody has collected yet.
    #[must_use]
    pub fn stored_response_count(&self) -> usize {
        self.inner
            .registry
            .borrow()
            .values()
            .filter(|slot| matches!(slot, Slot::Completed(_)))
            .count()
    }

    /// True when no task is suspended, i.e. no host event is expected.
    #[must_use]
    pub fn is_idle(&self) -> bool {
        self.active_task_count() == 0
    }

    #[must_use]
    pub fn debug_snapshot(&self) -> RegistrySnapshot {
        let registry = self.inner.registry.borrow();
        let mut snapshot = RegistrySnapshot::default();
        for (id, slot) in registry.iter() {
            match slot {
                Slot::Awaited(_) => snapshot.awaited.push(*id),
                Slot::Completed(_) => snapshot.completed.push(*id),
            }
        }
        snapshot.awaited.sort();
        snapshot.completed.sort();
        snapshot
    }

    /// Errors that escaped final tasks, oldest first.
    #[must_use]
    pub fn uncaught_errors(&self) -> Ref<'_, UncaughtErrors> {
        self.inner.uncaught.borrow()
    }

    /// Look an uncaught error up by ordinal (`"1"` is the most recent) or id.
    pub fn find_uncaught_error(
        &self,
        selector: Option<&str>,
    ) -> Result<UncaughtError, ErrorLookupError> {
        self.inner.uncaught.borrow().find(selector).cloned()
    }
}
