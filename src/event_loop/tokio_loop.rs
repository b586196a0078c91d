//! Event loop driven by a tokio runtime.
//!
//! Timeouts are spawned sleeps that post their task back into the loop's
//! queue when they expire; idle tasks are posted directly. Nothing submitted
//! here runs until it comes out of the queue inside [`TokioLoop::run`], so all
//! tasks execute on the single task that drives the loop, in arrival order.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;

use super::{EventLoop, IdleId, LoopTask, TimerId};
use crate::error::{Lwm2mError, Result};

enum Job {
    Timer(u64, LoopTask),
    Idle(u64, LoopTask),
    Quit,
}

/// Receiver borrowed by a running loop; put back when dropped, including on
/// cancellation of the `run` future.
struct ReceiverLease<'a> {
    slot: &'a Mutex<Option<mpsc::UnboundedReceiver<Job>>>,
    rx: Option<mpsc::UnboundedReceiver<Job>>,
}

impl ReceiverLease<'_> {
    async fn recv(&mut self) -> Option<Job> {
        match self.rx.as_mut() {
            Some(rx) => rx.recv().await,
            None => None,
        }
    }
}

impl Drop for ReceiverLease<'_> {
    fn drop(&mut self) {
        *self.slot.lock() = self.rx.take();
    }
}

/// Cooperative loop on top of tokio.
pub struct TokioLoop {
    handle: Handle,
    tx: mpsc::UnboundedSender<Job>,
    rx: Mutex<Option<mpsc::UnboundedReceiver<Job>>>,
    next_id: AtomicU64,
    /// Sleeping timers; an entry is removed when the timer runs or is cancelled
    timers: Mutex<HashMap<u64, JoinHandle<()>>>,
    /// Idle tasks queued and not yet run or cancelled
    idle: Mutex<HashSet<u64>>,
    closed: AtomicBool,
}

impl TokioLoop {
    /// Create a loop bound to the current tokio runtime.
    pub fn new() -> Result<Self> {
        let handle = Handle::try_current()
            .map_err(|e| Lwm2mError::Config(format!("TokioLoop needs a tokio runtime: {e}")))?;
        Ok(Self::with_handle(handle))
    }

    /// Create a loop that spawns its timers on `handle`.
    pub fn with_handle(handle: Handle) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            handle,
            tx,
            rx: Mutex::new(Some(rx)),
            next_id: AtomicU64::new(1),
            timers: Mutex::new(HashMap::new()),
            idle: Mutex::new(HashSet::new()),
            closed: AtomicBool::new(false),
        }
    }

    /// Dispatch tasks until [`TokioLoop::quit`] is called.
    ///
    /// Only one caller may drive the loop; a second concurrent `run` returns
    /// an error immediately. Dropping the future stops dispatch and leaves
    /// queued jobs in place for the next `run`.
    pub async fn run(&self) -> Result<()> {
        let taken = self
            .rx
            .lock()
            .take()
            .ok_or_else(|| Lwm2mError::Protocol("event loop is already running".to_string()))?;
        let mut rx = ReceiverLease {
            slot: &self.rx,
            rx: Some(taken),
        };

        debug!("Event loop running");
        while let Some(job) = rx.recv().await {
            match job {
                Job::Timer(id, task) => {
                    let armed = self.timers.lock().remove(&id).is_some();
                    if armed {
                        task();
                    }
                },
                Job::Idle(id, task) => {
                    let queued = self.idle.lock().remove(&id);
                    if queued {
                        task();
                    }
                },
                Job::Quit => break,
            }
        }
        debug!("Event loop stopped");
        Ok(())
    }

    /// Make [`TokioLoop::run`] return after the tasks already queued.
    pub fn quit(&self) {
        let _ = self.tx.send(Job::Quit);
    }

    /// Refuse further submissions and cancel pending timers.
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        for (_, timer) in self.timers.lock().drain() {
            timer.abort();
        }
        self.quit();
    }

    /// Number of armed timeouts
    pub fn pending_timers(&self) -> usize {
        self.timers.lock().len()
    }

    fn next_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    fn ensure_open(&self) -> Result<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(Lwm2mError::Protocol("event loop is closed".to_string()));
        }
        Ok(())
    }
}

impl EventLoop for TokioLoop {
    fn add_timeout(&self, delay: Duration, task: LoopTask) -> Result<TimerId> {
        self.ensure_open()?;
        let id = self.next_id();
        let tx = self.tx.clone();

        // Hold the map lock across the spawn so the entry exists before the
        // timer can post its job.
        let mut timers = self.timers.lock();
        let sleeper = self.handle.spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = tx.send(Job::Timer(id, task));
        });
        timers.insert(id, sleeper);
        Ok(TimerId(id))
    }

    fn remove_timeout(&self, id: TimerId) {
        if let Some(timer) = self.timers.lock().remove(&id.0) {
            timer.abort();
        }
    }

    fn add_idle(&self, task: LoopTask) -> Result<IdleId> {
        self.ensure_open()?;
        let id = self.next_id();
        self.idle.lock().insert(id);
        self.tx
            .send(Job::Idle(id, task))
            .map_err(|_| Lwm2mError::Protocol("event loop queue is gone".to_string()))?;
        Ok(IdleId(id))
    }

    fn remove_idle(&self, id: IdleId) {
        self.idle.lock().remove(&id.0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test(start_paused = true)]
    async fn test_timeout_and_idle_dispatch() {
        let lp = Arc::new(TokioLoop::new().unwrap());
        let log = Arc::new(Mutex::new(Vec::new()));

        let sink = Arc::clone(&log);
        lp.add_timeout(Duration::from_millis(50), Box::new(move || sink.lock().push("timer")))
            .unwrap();
        let sink = Arc::clone(&log);
        lp.add_idle(Box::new(move || sink.lock().push("idle"))).unwrap();

        let quitter = Arc::clone(&lp);
        lp.add_timeout(Duration::from_millis(100), Box::new(move || quitter.quit()))
            .unwrap();

        lp.run().await.unwrap();
        assert_eq!(*log.lock(), vec!["idle", "timer"]);
        assert_eq!(lp.pending_timers(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_tasks_do_not_run() {
        let lp = Arc::new(TokioLoop::new().unwrap());
        let log = Arc::new(Mutex::new(Vec::<&str>::new()));

        let sink = Arc::clone(&log);
        let timer = lp
            .add_timeout(Duration::from_millis(10), Box::new(move || sink.lock().push("timer")))
            .unwrap();
        let sink = Arc::clone(&log);
        let idle = lp.add_idle(Box::new(move || sink.lock().push("idle"))).unwrap();

        lp.remove_timeout(timer);
        lp.remove_idle(idle);

        let quitter = Arc::clone(&lp);
        lp.add_timeout(Duration::from_millis(50), Box::new(move || quitter.quit()))
            .unwrap();
        lp.run().await.unwrap();

        assert!(log.lock().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_again_after_cancelled_run() {
        let lp = Arc::new(TokioLoop::new().unwrap());

        let first = tokio::time::timeout(Duration::from_millis(10), lp.run()).await;
        assert!(first.is_err());

        let log = Arc::new(Mutex::new(Vec::<&str>::new()));
        let sink = Arc::clone(&log);
        lp.add_idle(Box::new(move || sink.lock().push("idle"))).unwrap();
        let quitter = Arc::clone(&lp);
        lp.add_timeout(Duration::from_millis(20), Box::new(move || quitter.quit()))
            .unwrap();

        lp.run().await.unwrap();
        assert_eq!(*log.lock(), vec!["idle"]);
    }

    #[test]
    fn test_new_without_runtime_fails() {
        assert!(matches!(TokioLoop::new(), Err(Lwm2mError::Config(_))));
    }

    #[tokio::test]
    async fn test_closed_loop_rejects() {
        let lp = TokioLoop::new().unwrap();
        lp.close();
        assert!(lp.add_idle(Box::new(|| {})).is_err());
        assert!(lp.add_timeout(Duration::ZERO, Box::new(|| {})).is_err());
    }
}
