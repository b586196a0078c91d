//! Service tick scheduling.
//!
//! Each session has at most one armed service timeout. A tick calls
//! `service(poll_quantum)` on the engine client and re-arms with the delay
//! the engine asks for; a negative status halts servicing and is reported
//! to the session's Error callback.

use std::sync::{Arc, Weak};
use std::time::Duration;

use tracing::{debug, error, warn};

use crate::engine::ServiceOutcome;
use crate::error::{Lwm2mError, Result};
use crate::session::{Event, Session};

/// Arm the next service tick, cancelling any timer still pending.
///
/// Does nothing once the session has left `Servicing`.
pub(crate) fn arm(session: &Arc<Session>, delay: Duration) -> Result<()> {
    let mut slot = session.service_timer.lock();
    if let Some(previous) = slot.take() {
        session.event_loop().remove_timeout(previous);
    }
    if !session.is_servicing() {
        return Ok(());
    }

    let weak = session.weak();
    let id = session
        .event_loop()
        .add_timeout(delay, Box::new(move || service_tick(&weak)))?;
    debug!("Session {} next service tick in {:?} ({})", session.handle(), delay, id);
    *slot = Some(id);
    Ok(())
}

/// Run one service tick. Invoked from the loop when the timer fires.
pub(crate) fn service_tick(session: &Weak<Session>) {
    let Some(session) = session.upgrade() else {
        return;
    };
    // The timer that got us here has fired.
    session.service_timer.lock().take();

    if !session.is_servicing() {
        debug!("Session {} is {}, skipping service tick", session.handle(), session.state());
        return;
    }

    let status = session.engine.lock().service(session.poll_quantum());
    debug!("Session {} service returned {}", session.handle(), status);

    match ServiceOutcome::from_status(status) {
        ServiceOutcome::Reschedule(delay) => {
            if let Err(e) = arm(&session, delay) {
                error!("Failed to re-arm service timer for session {}: {}", session.handle(), e);
                session.engine.lock().stop();
                halt(
                    &session,
                    Lwm2mError::Protocol("failed to re-arm service timer".to_string()),
                );
            }
        },
        ServiceOutcome::Quit => {
            warn!("Engine requested shutdown of session {}", session.handle());
            halt(&session, Lwm2mError::Cancelled);
        },
        ServiceOutcome::Failed(code) => {
            error!("Service tick failed for session {} (status {})", session.handle(), code);
            halt(
                &session,
                Lwm2mError::Protocol("failed to service LWM2M client".to_string()),
            );
        },
    }
}

/// Stop servicing and report `err` to the Error callback.
fn halt(session: &Session, err: Lwm2mError) {
    if !session.enter_error() {
        debug!("Session {} already disconnected, dropping error: {}", session.handle(), err);
        return;
    }
    session.deliver(&Event::Error(err));
}
