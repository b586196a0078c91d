//! Cooperative event loop boundary.
//!
//! Sessions never run user code on the engine's thread. Everything the
//! application observes (service-tick errors, execute requests, change
//! notifications) is dispatched from an [`EventLoop`]:
//!
//! - **timeouts** fire once after a delay (service ticks),
//! - **idle tasks** fire once at the loop's next opportunity, in submission
//!   order (marshaled engine events).
//!
//! Submission is thread-safe; dispatch happens on whichever thread drives
//! the loop.
//!
//! Two implementations ship with the crate:
//!
//! | Loop          | Clock     | Use                                   |
//! |---------------|-----------|---------------------------------------|
//! | [`ManualLoop`]| simulated | deterministic tests, step-by-step sims |
//! | [`TokioLoop`] | tokio     | applications on a tokio runtime        |

mod manual;
mod tokio_loop;

pub use manual::ManualLoop;
pub use tokio_loop::TokioLoop;

use std::fmt;
use std::time::Duration;

use crate::error::Result;

/// One-shot unit of work run by the loop
pub type LoopTask = Box<dyn FnOnce() + Send + 'static>;

/// Identifier of an armed timeout
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerId(pub(crate) u64);

/// Identifier of a queued idle task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct IdleId(pub(crate) u64);

impl fmt::Display for TimerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "timer#{}", self.0)
    }
}

impl fmt::Display for IdleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "idle#{}", self.0)
    }
}

/// External scheduler sessions arm their work on.
pub trait EventLoop: Send + Sync {
    /// Run `task` once after `delay`.
    fn add_timeout(&self, delay: Duration, task: LoopTask) -> Result<TimerId>;

    /// Cancel a timeout. Unknown or already-fired ids are ignored.
    fn remove_timeout(&self, id: TimerId);

    /// Run `task` once at the next loop iteration, after earlier idle tasks.
    fn add_idle(&self, task: LoopTask) -> Result<IdleId>;

    /// Cancel an idle task. Unknown or already-run ids are ignored.
    fn remove_idle(&self, id: IdleId);
}
