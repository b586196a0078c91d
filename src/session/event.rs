//! Session events and the per-session callback table.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde::Serialize;

use crate::engine::Trigger;
use crate::error::Lwm2mError;

/// Event kinds an application can subscribe to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    /// Service tick failure or engine shutdown
    Error,
    /// Server executed a resource (factory reset, reboot, firmware update)
    ResourceExecute,
    /// A resource value changed
    ResourceChanged,
}

impl EventKind {
    /// All event kinds
    pub const ALL: [EventKind; 3] = [
        EventKind::Error,
        EventKind::ResourceExecute,
        EventKind::ResourceChanged,
    ];

    /// Engine triggers that feed this kind.
    ///
    /// `Error` has none; the service scheduler raises it directly.
    pub fn triggers(&self) -> &'static [Trigger] {
        match self {
            EventKind::Error => &[],
            EventKind::ResourceExecute => &[
                Trigger::FactoryReset,
                Trigger::DeviceReboot,
                Trigger::FirmwareUpdate,
            ],
            EventKind::ResourceChanged => &[Trigger::ResourceChanged],
        }
    }

    /// Get descriptive name.
    pub fn name(&self) -> &'static str {
        match self {
            EventKind::Error => "error",
            EventKind::ResourceExecute => "resource_execute",
            EventKind::ResourceChanged => "resource_changed",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Event delivered to an application callback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// The session stopped servicing (`Cancelled` or `Protocol`)
    Error(Lwm2mError),
    /// Execute request on a resource
    ResourceExecute {
        /// Executed resource
        uri: String,
    },
    /// Resource value changed
    ResourceChanged {
        /// Changed resource
        uri: String,
    },
}

impl Event {
    /// Kind of this event
    pub fn kind(&self) -> EventKind {
        match self {
            Event::Error(_) => EventKind::Error,
            Event::ResourceExecute { .. } => EventKind::ResourceExecute,
            Event::ResourceChanged { .. } => EventKind::ResourceChanged,
        }
    }

    /// Resource URI carried by the event
    pub fn uri(&self) -> Option<&str> {
        match self {
            Event::Error(_) => None,
            Event::ResourceExecute { uri } | Event::ResourceChanged { uri } => Some(uri.as_str()),
        }
    }

    pub(crate) fn with_payload(kind: EventKind, payload: String) -> Option<Self> {
        match kind {
            EventKind::Error => None,
            EventKind::ResourceExecute => Some(Event::ResourceExecute { uri: payload }),
            EventKind::ResourceChanged => Some(Event::ResourceChanged { uri: payload }),
        }
    }
}

/// Application callback; user data is whatever the closure captures.
pub type EventCallback = Arc<dyn Fn(&Event) + Send + Sync>;

/// One callback slot per event kind.
#[derive(Default)]
pub(crate) struct CallbackTable {
    slots: HashMap<EventKind, EventCallback>,
}

impl CallbackTable {
    pub(crate) fn set(&mut self, kind: EventKind, callback: EventCallback) -> bool {
        self.slots.insert(kind, callback).is_some()
    }

    pub(crate) fn unset(&mut self, kind: EventKind) -> bool {
        self.slots.remove(&kind).is_some()
    }

    pub(crate) fn get(&self, kind: EventKind) -> Option<EventCallback> {
        self.slots.get(&kind).cloned()
    }

    pub(crate) fn contains(&self, kind: EventKind) -> bool {
        self.slots.contains_key(&kind)
    }

    pub(crate) fn clear(&mut self) {
        self.slots.clear();
    }
}
