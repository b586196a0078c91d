//! Engine event marshaling.
//!
//! Engine hooks may run on any thread, so they never call application code
//! directly. A hook copies its payload into a [`PendingEvent`] and submits it
//! to the session's loop as a one-shot idle task. On the loop, the task
//! looks up the callback currently set for the event kind, invokes it once,
//! cancels its own idle registration and drops the event.
//!
//! ```text
//!  engine thread                    loop thread
//!  ─────────────                    ───────────
//!  hook(uri) ──> PendingEvent ──add_idle──> dispatch ──> callback(&Event)
//! ```
//!
//! Callbacks are installed and removed per [`EventKind`], always together
//! with the full group of engine triggers behind that kind.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock, Weak};

use tracing::{debug, warn};

use crate::engine::{EngineHook, Trigger};
use crate::error::Result;
use crate::event_loop::IdleId;
use crate::session::{Event, EventCallback, EventKind, Session, SessionState};

/// Keeps the session's pending-event count in step with live events.
struct PendingGuard(Arc<AtomicUsize>);

impl PendingGuard {
    fn new(counter: Arc<AtomicUsize>) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(counter)
    }
}

impl Drop for PendingGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Event copied out of an engine hook, waiting for the loop.
struct PendingEvent {
    session: Weak<Session>,
    event: Event,
    /// Idle registration, filled in once the loop accepts the task
    idle: Arc<OnceLock<IdleId>>,
    _guard: PendingGuard,
}

/// Install `callback` for `kind` and register the engine triggers behind it.
///
/// The engine lock is held for the whole update so the slot and the trigger
/// group change together. Lock order is engine, then callbacks.
pub(crate) fn set_callback(
    session: &Arc<Session>,
    kind: EventKind,
    callback: EventCallback,
) -> Result<()> {
    let mut engine = session.engine.lock();

    let replaced = session.callbacks.lock().set(kind, callback);
    for &trigger in kind.triggers() {
        engine.register_callback(trigger, hook(session, kind, trigger));
    }

    debug!(
        "Session {} {} {} callback",
        session.handle(),
        if replaced { "replaced" } else { "set" },
        kind
    );
    Ok(())
}

/// Unregister the engine triggers behind `kind`, then drop its callback.
pub(crate) fn unset_callback(session: &Arc<Session>, kind: EventKind) -> Result<()> {
    let mut engine = session.engine.lock();

    for &trigger in kind.triggers() {
        engine.unregister_callback(trigger);
    }
    if session.callbacks.lock().unset(kind) {
        debug!("Session {} unset {} callback", session.handle(), kind);
    }
    Ok(())
}

/// Build the engine hook for one trigger of `kind`.
fn hook(session: &Arc<Session>, kind: EventKind, trigger: Trigger) -> EngineHook {
    let weak = session.weak();
    Arc::new(move |uri: Option<&str>| {
        let Some(session) = weak.upgrade() else {
            return;
        };
        let payload = match trigger.uri() {
            Some(fixed) => fixed,
            None => uri.unwrap_or_default(),
        };
        debug!("Session {} hook {} fired for {:?}", session.handle(), trigger, payload);
        submit(&session, kind, payload.to_string());
    })
}

/// Queue an event for dispatch on the session's loop.
pub(crate) fn submit(session: &Arc<Session>, kind: EventKind, payload: String) {
    let Some(event) = Event::with_payload(kind, payload) else {
        return;
    };

    let idle = Arc::new(OnceLock::new());
    let pending = PendingEvent {
        session: session.weak(),
        event,
        idle: Arc::clone(&idle),
        _guard: PendingGuard::new(session.pending_counter()),
    };

    // On failure the task, and with it the pending event, is dropped here.
    match session.event_loop().add_idle(Box::new(move || dispatch(pending))) {
        Ok(id) => {
            let _ = idle.set(id);
        },
        Err(e) => warn!(
            "Failed to queue {} event for session {}: {}",
            kind,
            session.handle(),
            e
        ),
    }
}

/// Deliver a pending event. Runs on the loop.
fn dispatch(pending: PendingEvent) {
    let Some(session) = pending.session.upgrade() else {
        debug!("Dropping {} event for a destroyed session", pending.event.kind());
        return;
    };
    if session.state() == SessionState::Disconnected {
        return;
    }

    session.deliver(&pending.event);

    if let Some(id) = pending.idle.get() {
        session.event_loop().remove_idle(*id);
    }
}
