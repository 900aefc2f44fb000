//! Suspension points and the tasks that own coroutines.
//!
//! A coroutine suspends by awaiting a [`Suspend`]: on its first poll the leaf
//! reports its [`FutureId`] to the runtime and returns `Pending`. The driver
//! records which task is blocked on that id and hands control back to the host.
//! When the matching event arrives the driver stores the payload in the
//! runtime's resume slot and polls the task again; the leaf takes the payload
//! and completes.

use std::any::Any;
use std::fmt;
use std::future::{Future, IntoFuture};
use std::marker::PhantomData;
use std::pin::Pin;
use std::task::{Context, Poll};

use futures_util::future::LocalBoxFuture;
use weeslack_types::{FutureId, HostEvent};

use crate::runtime::{Runtime, SchedulerError};

/// Type-erased result of a finished task.
///
/// Success and failure travel through the same channel: an awaiter sees
/// either the value or the error the coroutine returned.
pub type Outcome = anyhow::Result<Box<dyn Any>>;

/// Value a suspended coroutine is resumed with.
pub(crate) enum Resume {
    Event(HostEvent),
    Outcome(Outcome),
}

impl Resume {
    pub(crate) fn kind(&self) -> &'static str {
        match self {
            Self::Event(event) => event.kind(),
            Self::Outcome(_) => "task outcome",
        }
    }
}

/// Whether anyone may ever collect a task's result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskKind {
    /// Some other party may await the result through a [`TaskHandle`].
    Retrievable,
    /// Entry point; the result is discarded and failures are recorded as
    /// uncaught errors.
    Final,
}

/// A coroutine plus its identity, owned by the runtime for its whole life.
pub(crate) struct Task {
    pub(crate) id: FutureId,
    pub(crate) kind: TaskKind,
    coroutine: LocalBoxFuture<'static, Outcome>,
    polls: u64,
}

impl Task {
    pub(crate) fn new<T, F>(kind: TaskKind, future: F) -> Self
    where
        T: 'static,
        F: Future<Output = anyhow::Result<T>> + 'static,
    {
        let coroutine: LocalBoxFuture<'static, Outcome> = Box::pin(async move {
            future
                .await
                .map(|value| Box::new(value) as Box<dyn Any>)
        });
        Self {
            id: FutureId::new(),
            kind,
            coroutine,
            polls: 0,
        }
    }

    pub(crate) fn poll(&mut self, cx: &mut Context<'_>) -> Poll<Outcome> {
        self.polls += 1;
        self.coroutine.as_mut().poll(cx)
    }

    pub(crate) fn polls(&self) -> u64 {
        self.polls
    }
}

impl fmt::Debug for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .field("polls", &self.polls)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SuspendState {
    Fresh,
    Waiting,
    Done,
}

/// The single suspension point of the runtime.
///
/// Holds nothing but the id it waits on; the payload is handed over through
/// the runtime when the driver resumes the owning task.
#[must_use = "a suspension point does nothing unless awaited"]
pub(crate) struct Suspend {
    rt: Runtime,
    id: FutureId,
    state: SuspendState,
}

impl Suspend {
    pub(crate) fn new(rt: Runtime, id: FutureId) -> Self {
        Self {
            rt,
            id,
            state: SuspendState::Fresh,
        }
    }
}

impl Future for Suspend {
    type Output = Resume;

    fn poll(mut self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Resume> {
        match self.state {
            SuspendState::Fresh => {
                self.rt.push_yield(self.id);
                self.state = SuspendState::Waiting;
                Poll::Pending
            }
            SuspendState::Waiting => match self.rt.take_resume() {
                Some(value) => {
                    self.state = SuspendState::Done;
                    Poll::Ready(value)
                }
                None => {
                    // Polled without a payload: stay registered on the same id.
                    self.rt.push_yield(self.id);
                    Poll::Pending
                }
            },
            SuspendState::Done => panic!("suspension point {} polled after completion", self.id),
        }
    }
}

/// Handle to a retrievable task's eventual result.
///
/// Awaiting consumes the handle, so a result is delivered at most once.
/// Dropping a handle leaves the result parked in the runtime.
#[must_use = "dropping a task handle leaves its result uncollected"]
pub struct TaskHandle<T> {
    rt: Runtime,
    id: FutureId,
    _output: PhantomData<fn() -> T>,
}

impl<T: 'static> TaskHandle<T> {
    pub(crate) fn new(rt: Runtime, id: FutureId) -> Self {
        Self {
            rt,
            id,
            _output: PhantomData,
        }
    }

    #[must_use]
    pub fn id(&self) -> FutureId {
        self.id
    }

    /// Collect the result without suspending, if the task already finished.
    ///
    /// Returns the handle back when the task is still running.
    pub fn try_take(self) -> Result<anyhow::Result<T>, Self> {
        match self.rt.take_completed(self.id) {
            Some(outcome) => Ok(downcast_outcome(self.id, outcome)),
            None => Err(self),
        }
    }
}

impl<T> fmt::Debug for TaskHandle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskHandle").field("id", &self.id).finish()
    }
}

impl<T: 'static> IntoFuture for TaskHandle<T> {
    type Output = anyhow::Result<T>;
    type IntoFuture = LocalBoxFuture<'static, anyhow::Result<T>>;

    fn into_future(self) -> Self::IntoFuture {
        Box::pin(async move {
            let id = self.id;
            match Suspend::new(self.rt, id).await {
                Resume::Outcome(outcome) => downcast_outcome(id, outcome),
                other => Err(SchedulerError::UnexpectedPayload {
                    future_id: id,
                    expected: "task outcome",
                    got: other.kind(),
                }
                .into()),
            }
        })
    }
}

fn downcast_outcome<T: 'static>(task_id: FutureId, outcome: Outcome) -> anyhow::Result<T> {
    outcome?
        .downcast::<T>()
        .map(|value| *value)
        .map_err(|_| SchedulerError::OutputType { task_id }.into())
}
