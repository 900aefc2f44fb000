//! Cooperative task scheduler for a single-threaded, callback-driven host.
//!
//! Coroutines are ordinary `async` blocks. They run eagerly until they await a
//! host event or another task, at which point control returns to the host. The
//! host later calls [`Runtime::deliver`] with the event's token and the
//! scheduler resumes whichever task was waiting for it.

mod errors;
mod fd;
mod gather;
mod host;
mod process;
mod runtime;
#[cfg(any(test, feature = "test-support"))]
mod scripted;
mod task;

pub use errors::{ErrorLookupError, UncaughtError, UncaughtErrors, format_uncaught_error};
pub use fd::available_file_descriptors;
pub use gather::GatherError;
pub use host::Host;
pub use process::{FD_POLL_INTERVAL_MS, MIN_FREE_FILE_DESCRIPTORS};
pub use runtime::{RegistrySnapshot, Runtime, SchedulerError};
#[cfg(any(test, feature = "test-support"))]
pub use scripted::{HookCall, ScriptedHost};
pub use task::{Outcome, TaskHandle, TaskKind};
