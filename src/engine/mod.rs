//! Protocol engine boundary.
//!
//! The LWM2M protocol engine (registration, CoAP, DTLS, object model) is a
//! black box consumed through two traits:
//!
//! - [`ProtocolEngine`]: starts client instances and exposes the stateless
//!   TLV serialization primitives.
//! - [`EngineClient`]: one running client; serviced periodically, reads and
//!   writes resources, and invokes [`EngineHook`]s for execute / change
//!   triggers from whatever thread the engine runs its I/O on.
//!
//! ```text
//! ┌──────────────┐  start(objects)   ┌────────────────┐
//! │   Session    │ ────────────────> │ ProtocolEngine │
//! │              │ <──────────────── │                │
//! │              │  Box<EngineClient>└────────────────┘
//! │              │
//! │              │  service(quantum) -> delay_ms | status
//! │              │  read/write_resource
//! │              │  register_callback(trigger, hook)
//! └──────────────┘
//! ```
//!
//! Engine results are raw `i32` statuses ([`CLIENT_OK`], [`CLIENT_ERROR`],
//! [`CLIENT_QUIT`]). They are translated into [`crate::Lwm2mError`] inside
//! this crate and never returned to applications.

mod oma_tlv;
pub mod scripted;

pub use oma_tlv::{encode_int_array, encode_string_array};
pub use scripted::ScriptedEngine;

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::object::ObjectContainer;
use crate::uri;

/// Raw engine status code
pub type EngineStatus = i32;

/// Success
pub const CLIENT_OK: EngineStatus = 0;

/// Generic engine failure
pub const CLIENT_ERROR: EngineStatus = -1;

/// Engine requested shutdown
pub const CLIENT_QUIT: EngineStatus = -2;

/// Engine-level trigger a hook can be registered for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Trigger {
    /// Execute on `/3/0/5`
    FactoryReset,
    /// Execute on `/3/0/4`
    DeviceReboot,
    /// Execute on `/5/0/2`
    FirmwareUpdate,
    /// A resource value changed (carries the URI)
    ResourceChanged,
}

impl Trigger {
    /// Fixed URI of an execute trigger.
    pub fn uri(&self) -> Option<&'static str> {
        match self {
            Trigger::FactoryReset => Some(uri::DEVICE_FACTORY_RESET),
            Trigger::DeviceReboot => Some(uri::DEVICE_REBOOT),
            Trigger::FirmwareUpdate => Some(uri::FIRMWARE_UPDATE),
            Trigger::ResourceChanged => None,
        }
    }
}

impl fmt::Display for Trigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Trigger::FactoryReset => "factory_reset",
            Trigger::DeviceReboot => "device_reboot",
            Trigger::FirmwareUpdate => "firmware_update",
            Trigger::ResourceChanged => "resource_changed",
        };
        f.write_str(name)
    }
}

/// Hook invoked by the engine, possibly from its own I/O thread.
///
/// The argument is the affected resource URI when the engine supplies one.
/// It is only borrowed for the duration of the call.
pub type EngineHook = Arc<dyn Fn(Option<&str>) + Send + Sync>;

/// A running engine client instance.
pub trait EngineClient: Send {
    /// Advance the engine state machine, spending at most `quantum`.
    ///
    /// Returns the delay in milliseconds until the next call is due, or a
    /// negative status.
    fn service(&mut self, quantum: Duration) -> EngineStatus;

    /// Read a resource value. The returned buffer belongs to the caller.
    fn read_resource(&mut self, uri: &str) -> std::result::Result<Vec<u8>, EngineStatus>;

    /// Write a resource value.
    fn write_resource(&mut self, uri: &str, value: &[u8]) -> EngineStatus;

    /// Install the hook for a trigger, replacing any previous one.
    fn register_callback(&mut self, trigger: Trigger, hook: EngineHook);

    /// Remove the hook for a trigger.
    fn unregister_callback(&mut self, trigger: Trigger);

    /// Deregister and release the client.
    fn stop(&mut self);
}

/// Protocol engine factory and stateless primitives.
pub trait ProtocolEngine: Send + Sync {
    /// Start a client for the given object model; `None` on failure.
    fn start(&self, objects: &ObjectContainer) -> Option<Box<dyn EngineClient>>;

    /// Encode an integer array as TLV.
    fn serialize_tlv_int(&self, values: &[i64]) -> std::result::Result<Vec<u8>, EngineStatus>;

    /// Encode a string array as TLV.
    fn serialize_tlv_string(&self, values: &[&str])
        -> std::result::Result<Vec<u8>, EngineStatus>;
}

/// Decoded result of one service call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ServiceOutcome {
    /// Service again after this delay
    Reschedule(Duration),
    /// Engine asked to shut down
    Quit,
    /// Engine failed with this status
    Failed(EngineStatus),
}

impl ServiceOutcome {
    pub(crate) fn from_status(status: EngineStatus) -> Self {
        match status {
            s if s >= CLIENT_OK => ServiceOutcome::Reschedule(Duration::from_millis(s as u64)),
            CLIENT_QUIT => ServiceOutcome::Quit,
            s => ServiceOutcome::Failed(s),
        }
    }
}
