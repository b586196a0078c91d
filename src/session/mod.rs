//! LWM2M client sessions.
//!
//! A [`Session`] wraps one running engine client. It owns the callback table,
//! the service timer slot and the object model snapshot for as long as it is
//! registered.
//!
//! ## State Machine
//!
//! ```text
//!     [Connecting] ── first tick armed ──> [Servicing]
//!                                              │   ▲
//!                               tick: delay ms │   │ re-arm
//!                                              ▼   │
//!                                          (service tick)
//!                                              │
//!               tick: quit / error, or re-arm refused by the loop
//!                                              ▼
//!                                          [Error]
//!
//!     any state ── disconnect ──> [Disconnected]
//! ```
//!
//! | State          | Reads/writes | Service ticks |
//! |----------------|--------------|---------------|
//! | `Connecting`   | refused      | not yet armed |
//! | `Servicing`    | allowed      | armed         |
//! | `Error`        | refused      | stopped       |
//! | `Disconnected` | refused      | cancelled     |
//!
//! A session in `Error` keeps its registry entry; only disconnect removes it.

mod event;

pub use event::{Event, EventCallback, EventKind};
pub(crate) use event::CallbackTable;

use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::Mutex;
use serde::Serialize;
use tracing::{debug, error, info};

use crate::config::ClientConfig;
use crate::engine::{EngineClient, ProtocolEngine, CLIENT_OK};
use crate::error::{Lwm2mError, Result};
use crate::event_loop::{EventLoop, TimerId};
use crate::object::ObjectContainer;
use crate::registry::Handle;
use crate::{scheduler, uri};

/// Session state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// Engine started, first service tick not armed yet
    Connecting,
    /// Service ticks running
    Servicing,
    /// Servicing stopped after an engine failure or shutdown
    Error,
    /// Torn down by disconnect
    Disconnected,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::Connecting => "connecting",
            SessionState::Servicing => "servicing",
            SessionState::Error => "error",
            SessionState::Disconnected => "disconnected",
        };
        f.write_str(name)
    }
}

/// One managed connection to an LWM2M server
pub struct Session {
    handle: Handle,
    objects: ObjectContainer,
    poll_quantum: Duration,
    state: Mutex<SessionState>,
    pub(crate) callbacks: Mutex<CallbackTable>,
    pub(crate) engine: Mutex<Box<dyn EngineClient>>,
    pub(crate) service_timer: Mutex<Option<TimerId>>,
    event_loop: Arc<dyn EventLoop>,
    /// Live pending idle events raised by this session
    pending: Arc<AtomicUsize>,
    this: Weak<Session>,
}

impl Session {
    /// Validate the config, start the engine and arm the first service tick.
    pub(crate) fn start(
        handle: Handle,
        config: &ClientConfig,
        engine: &dyn ProtocolEngine,
        event_loop: Arc<dyn EventLoop>,
    ) -> Result<Arc<Self>> {
        config.validate()?;
        let objects = ObjectContainer::from_config(config)?;

        let client = engine.start(&objects).ok_or_else(|| {
            error!("Protocol engine failed to start for {}", config.server_uri);
            Lwm2mError::Protocol(format!(
                "failed to start client for {}",
                config.server_uri
            ))
        })?;

        let session = Arc::new_cyclic(|this| Self {
            handle,
            objects,
            poll_quantum: config.service.poll_quantum(),
            state: Mutex::new(SessionState::Connecting),
            callbacks: Mutex::new(CallbackTable::default()),
            engine: Mutex::new(client),
            service_timer: Mutex::new(None),
            event_loop,
            pending: Arc::new(AtomicUsize::new(0)),
            this: this.clone(),
        });

        session.set_state(SessionState::Servicing);
        if let Err(e) = scheduler::arm(&session, config.service.initial_delay()) {
            error!("Failed to start timeout callback for LWM2M servicing");
            session.set_state(SessionState::Error);
            session.engine.lock().stop();
            return Err(e);
        }

        info!(
            "Session {} connecting to {} as {}",
            handle, session.objects.server.server_uri, session.objects.server.client_name
        );
        Ok(session)
    }

    /// Session handle
    pub fn handle(&self) -> Handle {
        self.handle
    }

    /// Current state
    pub fn state(&self) -> SessionState {
        *self.state.lock()
    }

    /// Check if service ticks are running
    pub fn is_servicing(&self) -> bool {
        self.state() == SessionState::Servicing
    }

    /// Object model snapshot registered at start
    pub fn objects(&self) -> &ObjectContainer {
        &self.objects
    }

    /// Server URI
    pub fn server_uri(&self) -> &str {
        &self.objects.server.server_uri
    }

    /// Endpoint client name
    pub fn client_name(&self) -> &str {
        &self.objects.server.client_name
    }

    /// Quantum passed to every service call
    pub fn poll_quantum(&self) -> Duration {
        self.poll_quantum
    }

    /// Pending idle events not yet delivered and released
    pub fn pending_events(&self) -> usize {
        self.pending.load(Ordering::SeqCst)
    }

    /// Check whether a callback is set for `kind`
    pub fn has_callback(&self, kind: EventKind) -> bool {
        self.callbacks.lock().contains(kind)
    }

    /// Write a resource value.
    pub fn write_resource(&self, uri: &str, value: &[u8]) -> Result<()> {
        uri::validate(uri)?;
        self.ensure_servicing()?;

        debug!("Session {} writing {} ({} bytes)", self.handle, uri, value.len());
        let status = self.engine.lock().write_resource(uri, value);
        if status != CLIENT_OK {
            error!("Failed to write resource {} (status {})", uri, status);
            return Err(Lwm2mError::Protocol(format!(
                "failed to write resource {uri}"
            )));
        }
        Ok(())
    }

    /// Read a resource value into `buf`, returning the number of bytes copied.
    ///
    /// `buf.len()` is the capacity. If the value does not fit, nothing is
    /// copied and `BufferTooSmall` is returned.
    pub fn read_resource(&self, uri: &str, buf: &mut [u8]) -> Result<usize> {
        if buf.is_empty() {
            return Err(Lwm2mError::InvalidArgument(
                "read buffer has zero capacity".to_string(),
            ));
        }
        uri::validate(uri)?;
        self.ensure_servicing()?;

        let value = self.engine.lock().read_resource(uri).map_err(|status| {
            error!("Failed to read resource {} (status {})", uri, status);
            Lwm2mError::Protocol(format!("failed to read resource {uri}"))
        })?;

        if value.len() > buf.len() {
            error!("Buffer is too small for {}", uri);
            return Err(Lwm2mError::BufferTooSmall {
                needed: value.len(),
                capacity: buf.len(),
            });
        }

        buf[..value.len()].copy_from_slice(&value);
        Ok(value.len())
    }

    /// Stop servicing, release the engine client and drop all callbacks.
    pub(crate) fn shutdown(&self) {
        self.set_state(SessionState::Disconnected);

        if let Some(timer) = self.service_timer.lock().take() {
            self.event_loop.remove_timeout(timer);
        }
        self.engine.lock().stop();
        self.callbacks.lock().clear();

        info!("Session {} disconnected", self.handle);
    }

    /// Hand an event straight to its callback. Must run on the loop.
    pub(crate) fn deliver(&self, event: &Event) {
        let callback = self.callbacks.lock().get(event.kind());
        match callback {
            Some(cb) => cb(event),
            None => debug!("No {} callback on session {}, dropping event", event.kind(), self.handle),
        }
    }

    pub(crate) fn set_state(&self, state: SessionState) {
        let mut current = self.state.lock();
        if *current != state {
            debug!("Session {} {} -> {}", self.handle, *current, state);
            *current = state;
        }
    }

    /// Move to `Error` unless the session is already disconnected.
    ///
    /// Returns false when disconnected; that state is terminal.
    pub(crate) fn enter_error(&self) -> bool {
        let mut current = self.state.lock();
        match *current {
            SessionState::Disconnected => false,
            SessionState::Error => true,
            _ => {
                debug!("Session {} {} -> {}", self.handle, *current, SessionState::Error);
                *current = SessionState::Error;
                true
            },
        }
    }

    pub(crate) fn event_loop(&self) -> &Arc<dyn EventLoop> {
        &self.event_loop
    }

    pub(crate) fn pending_counter(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.pending)
    }

    pub(crate) fn weak(&self) -> Weak<Session> {
        self.this.clone()
    }

    fn ensure_servicing(&self) -> Result<()> {
        let state = self.state();
        if state != SessionState::Servicing {
            return Err(Lwm2mError::Protocol(format!(
                "session {} is not servicing ({state})",
                self.handle
            )));
        }
        Ok(())
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("handle", &self.handle)
            .field("server_uri", &self.server_uri())
            .field("client_name", &self.client_name())
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{ScriptedEngine, CLIENT_ERROR};
    use crate::event_loop::ManualLoop;

    fn start(engine: &ScriptedEngine, lp: &Arc<ManualLoop>) -> Arc<Session> {
        let config = ClientConfig::new("coap://host:5683", "dev1");
        Session::start(Handle::new(1), &config, engine, lp.clone()).unwrap()
    }

    #[test]
    fn test_start_arms_first_tick() {
        let engine = ScriptedEngine::new();
        let lp = Arc::new(ManualLoop::new());
        let session = start(&engine, &lp);

        assert_eq!(session.state(), SessionState::Servicing);
        assert_eq!(lp.pending_timers(), 1);
        assert_eq!(lp.next_deadline(), Some(Duration::from_millis(100)));
        assert_eq!(engine.service_calls(), 0);
    }

    #[test]
    fn test_start_rejects_missing_name() {
        let engine = ScriptedEngine::new();
        let lp = Arc::new(ManualLoop::new());
        let config = ClientConfig::new("coap://host:5683", "");
        let err = Session::start(Handle::new(1), &config, &engine, lp).unwrap_err();
        assert!(matches!(err, Lwm2mError::InvalidArgument(_)));
        assert_eq!(engine.live_clients(), 0);
    }

    #[test]
    fn test_start_engine_failure() {
        let engine = ScriptedEngine::new();
        engine.fail_start(true);
        let lp = Arc::new(ManualLoop::new());
        let config = ClientConfig::new("coap://host:5683", "dev1");
        let err = Session::start(Handle::new(1), &config, &engine, lp.clone()).unwrap_err();
        assert!(matches!(err, Lwm2mError::Protocol(_)));
        assert_eq!(lp.pending_timers(), 0);
    }

    #[test]
    fn test_start_with_closed_loop_stops_engine() {
        let engine = ScriptedEngine::new();
        let lp = Arc::new(ManualLoop::new());
        lp.close();
        let config = ClientConfig::new("coap://host:5683", "dev1");
        assert!(Session::start(Handle::new(1), &config, &engine, lp).is_err());
        assert_eq!(engine.live_clients(), 0);
    }

    #[test]
    fn test_read_copies_value() {
        let engine = ScriptedEngine::new();
        let lp = Arc::new(ManualLoop::new());
        let session = start(&engine, &lp);
        engine.set_resource("/3/0/0", "Samsung");

        let mut buf = [0u8; 32];
        let n = session.read_resource("/3/0/0", &mut buf).unwrap();
        assert_eq!(&buf[..n], b"Samsung");
    }

    #[test]
    fn test_read_zero_capacity() {
        let engine = ScriptedEngine::new();
        let lp = Arc::new(ManualLoop::new());
        let session = start(&engine, &lp);

        let mut buf: [u8; 0] = [];
        let err = session.read_resource("/3/0/0", &mut buf).unwrap_err();
        assert!(matches!(err, Lwm2mError::InvalidArgument(_)));
    }

    #[test]
    fn test_read_engine_failure() {
        let engine = ScriptedEngine::new();
        let lp = Arc::new(ManualLoop::new());
        let session = start(&engine, &lp);
        engine.set_read_failure(Some(CLIENT_ERROR));

        let mut buf = [0u8; 8];
        let err = session.read_resource("/3/0/0", &mut buf).unwrap_err();
        assert!(matches!(err, Lwm2mError::Protocol(_)));
    }

    #[test]
    fn test_write_forwards_and_maps_failure() {
        let engine = ScriptedEngine::new();
        let lp = Arc::new(ManualLoop::new());
        let session = start(&engine, &lp);

        session.write_resource("/3/0/9", b"42").unwrap();
        assert_eq!(engine.resource("/3/0/9").unwrap(), b"42");

        engine.set_write_status(CLIENT_ERROR);
        let err = session.write_resource("/3/0/9", b"43").unwrap_err();
        assert!(matches!(err, Lwm2mError::Protocol(_)));

        let err = session.write_resource("", b"43").unwrap_err();
        assert!(matches!(err, Lwm2mError::InvalidArgument(_)));
    }

    #[test]
    fn test_shutdown_refuses_io() {
        let engine = ScriptedEngine::new();
        let lp = Arc::new(ManualLoop::new());
        let session = start(&engine, &lp);

        session.shutdown();
        assert_eq!(session.state(), SessionState::Disconnected);
        assert_eq!(lp.pending_timers(), 0);
        assert_eq!(engine.live_clients(), 0);
        assert!(session.write_resource("/3/0/9", b"1").is_err());
    }
}
