//! Application-facing client.
//!
//! [`Lwm2mClient`] ties a protocol engine and an event loop to a session
//! registry. Every per-session call takes the [`Handle`] returned by
//! [`Lwm2mClient::connect`].

use std::sync::Arc;

use tracing::info;

use crate::config::ClientConfig;
use crate::engine::ProtocolEngine;
use crate::error::Result;
use crate::event_loop::EventLoop;
use crate::marshal;
use crate::registry::{Handle, SessionRegistry};
use crate::session::{Event, EventKind, Session, SessionState};
use crate::tlv;

/// LWM2M client session manager
pub struct Lwm2mClient {
    engine: Arc<dyn ProtocolEngine>,
    event_loop: Arc<dyn EventLoop>,
    sessions: SessionRegistry,
}

impl Lwm2mClient {
    /// Create a client over an engine and the loop sessions dispatch on
    pub fn new(engine: Arc<dyn ProtocolEngine>, event_loop: Arc<dyn EventLoop>) -> Self {
        Self {
            engine,
            event_loop,
            sessions: SessionRegistry::new(),
        }
    }

    /// Start a session for `config`.
    ///
    /// The first service tick is armed on the loop before this returns.
    pub fn connect(&self, config: &ClientConfig) -> Result<Handle> {
        let handle =
            self.sessions
                .create(config, self.engine.as_ref(), Arc::clone(&self.event_loop))?;
        info!("Connected {} as {}", config.server_uri, handle);
        Ok(handle)
    }

    /// Tear a session down. A second call on the same handle is `NotFound`.
    pub fn disconnect(&self, handle: Handle) -> Result<()> {
        self.sessions.destroy(handle)
    }

    /// Install the callback for an event kind, replacing any previous one.
    ///
    /// Callbacks only ever run on the event loop.
    pub fn set_callback<F>(&self, handle: Handle, kind: EventKind, callback: F) -> Result<()>
    where
        F: Fn(&Event) + Send + Sync + 'static,
    {
        let session = self.sessions.lookup(handle)?;
        marshal::set_callback(&session, kind, Arc::new(callback))
    }

    /// Remove the callback for an event kind.
    pub fn unset_callback(&self, handle: Handle, kind: EventKind) -> Result<()> {
        let session = self.sessions.lookup(handle)?;
        marshal::unset_callback(&session, kind)
    }

    /// Read a resource into `buf`, returning the number of bytes copied.
    pub fn read_resource(&self, handle: Handle, uri: &str, buf: &mut [u8]) -> Result<usize> {
        self.sessions.lookup(handle)?.read_resource(uri, buf)
    }

    /// Write a resource value.
    pub fn write_resource(&self, handle: Handle, uri: &str, value: &[u8]) -> Result<()> {
        self.sessions.lookup(handle)?.write_resource(uri, value)
    }

    /// Encode an integer array as TLV.
    pub fn serialize_tlv_int(&self, values: &[i64]) -> Result<Vec<u8>> {
        tlv::serialize_int_array(self.engine.as_ref(), values)
    }

    /// Encode a string array as TLV.
    pub fn serialize_tlv_string<S: AsRef<str>>(&self, values: &[S]) -> Result<Vec<u8>> {
        tlv::serialize_string_array(self.engine.as_ref(), values)
    }

    /// Current state of a session
    pub fn state(&self, handle: Handle) -> Result<SessionState> {
        Ok(self.sessions.lookup(handle)?.state())
    }

    /// Events raised by the engine and not yet dispatched
    pub fn pending_events(&self, handle: Handle) -> Result<usize> {
        Ok(self.sessions.lookup(handle)?.pending_events())
    }

    /// Resolve a handle to its session
    pub fn session(&self, handle: Handle) -> Result<Arc<Session>> {
        self.sessions.lookup(handle)
    }

    /// Live session handles
    pub fn sessions(&self) -> Vec<Handle> {
        self.sessions.handles()
    }

    /// Event loop sessions dispatch on
    pub fn event_loop(&self) -> &Arc<dyn EventLoop> {
        &self.event_loop
    }
}
