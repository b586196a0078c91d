//! Manually driven loop with a simulated clock.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::time::Duration;

use parking_lot::Mutex;

use super::{EventLoop, IdleId, LoopTask, TimerId};
use crate::error::{Lwm2mError, Result};

#[derive(Default)]
struct Inner {
    now: Duration,
    next_id: u64,
    /// Armed timeouts ordered by (deadline, id)
    timers: BTreeMap<(Duration, u64), LoopTask>,
    armed: HashMap<u64, Armed>,
    idle: VecDeque<(u64, LoopTask)>,
    closed: bool,
}

struct Armed {
    deadline: Duration,
    at: Duration,
}

impl Inner {
    fn next_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }
}

/// Event loop that only moves when told to.
///
/// Time starts at zero and advances only through [`ManualLoop::advance`].
/// Tasks run on the calling thread, with the internal lock released, so a
/// task may arm further timeouts or idle tasks.
#[derive(Default)]
pub struct ManualLoop {
    inner: Mutex<Inner>,
}

impl ManualLoop {
    /// Create a loop at time zero
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulated time elapsed since creation
    pub fn now(&self) -> Duration {
        self.inner.lock().now
    }

    /// Number of armed timeouts
    pub fn pending_timers(&self) -> usize {
        self.inner.lock().timers.len()
    }

    /// Number of queued idle tasks
    pub fn pending_idle(&self) -> usize {
        self.inner.lock().idle.len()
    }

    /// Time until the earliest armed timeout
    pub fn next_deadline(&self) -> Option<Duration> {
        let inner = self.inner.lock();
        inner
            .timers
            .keys()
            .next()
            .map(|(deadline, _)| deadline.saturating_sub(inner.now))
    }

    /// Refuse all further submissions
    pub fn close(&self) {
        self.inner.lock().closed = true;
    }

    /// Move the clock forward by `delta`, firing due timeouts in order.
    ///
    /// Timeouts armed by a firing task are fired too if they fall due within
    /// the same window, except zero-delay ones, which wait for the next call.
    /// Returns the number of timeouts fired.
    pub fn advance(&self, delta: Duration) -> usize {
        let (target, first_new) = {
            let inner = self.inner.lock();
            (inner.now + delta, inner.next_id + 1)
        };
        let mut fired = 0;

        loop {
            let task = {
                let mut inner = self.inner.lock();
                let due = inner
                    .timers
                    .keys()
                    .take_while(|(deadline, _)| *deadline <= target)
                    .find(|(_, id)| {
                        *id < first_new || inner.armed.get(id).is_some_and(|a| a.deadline > a.at)
                    })
                    .copied();
                match due {
                    Some(key) => {
                        inner.now = inner.now.max(key.0);
                        inner.armed.remove(&key.1);
                        inner.timers.remove(&key)
                    },
                    None => {
                        inner.now = target;
                        None
                    },
                }
            };

            match task {
                Some(task) => {
                    task();
                    fired += 1;
                },
                None => break,
            }
        }

        fired
    }

    /// Run the oldest queued idle task. Returns false if none was queued.
    pub fn run_once(&self) -> bool {
        let next = self.inner.lock().idle.pop_front();
        match next {
            Some((_, task)) => {
                task();
                true
            },
            None => false,
        }
    }

    /// Run idle tasks until the queue is empty. Returns how many ran.
    pub fn run_idle(&self) -> usize {
        let mut ran = 0;
        while self.run_once() {
            ran += 1;
        }
        ran
    }
}

impl EventLoop for ManualLoop {
    fn add_timeout(&self, delay: Duration, task: LoopTask) -> Result<TimerId> {
        let mut inner = self.inner.lock();
        if inner.closed {
            return Err(Lwm2mError::Protocol("event loop is closed".to_string()));
        }
        let id = inner.next_id();
        let at = inner.now;
        let deadline = at + delay;
        inner.timers.insert((deadline, id), task);
        inner.armed.insert(id, Armed { deadline, at });
        Ok(TimerId(id))
    }

    fn remove_timeout(&self, id: TimerId) {
        let mut inner = self.inner.lock();
        if let Some(armed) = inner.armed.remove(&id.0) {
            inner.timers.remove(&(armed.deadline, id.0));
        }
    }

    fn add_idle(&self, task: LoopTask) -> Result<IdleId> {
        let mut inner = self.inner.lock();
        if inner.closed {
            return Err(Lwm2mError::Protocol("event loop is closed".to_string()));
        }
        let id = inner.next_id();
        inner.idle.push_back((id, task));
        Ok(IdleId(id))
    }

    fn remove_idle(&self, id: IdleId) {
        self.inner.lock().idle.retain(|(queued, _)| *queued != id.0);
    }
}
