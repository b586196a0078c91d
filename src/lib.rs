//! # LWM2M Client - Session Manager for Device Management Clients
//!
//! Handle-based session management on top of an LWM2M protocol engine.
//! The engine (registration, CoAP, DTLS, object model) is consumed as a black
//! box; this crate drives it from an application event loop and turns its
//! raw hooks and status codes into typed events and errors.
//!
//! ## Features
//!
//! - **Session registry**: opaque handles, never reused, checked on every call
//! - **Service scheduling**: engine-driven service ticks, one armed timer per session
//! - **Event marshaling**: engine hooks deferred to the loop as idle tasks
//! - **Management objects**: Device (3), Connectivity Monitoring (4), Firmware (5)
//! - **TLV helpers**: integer and string arrays as OMA-TLV
//!
//! ## Architecture
//!
//! ```text
//!  Application                 Lwm2mClient                     Engine
//!      |                            |                             |
//!      |--- connect(config) ------->|--- start(objects) --------->|
//!      |<-- Handle -----------------|                             |
//!      |                            |                             |
//!      |                   [timeout]|--- service(quantum) ------->|
//!      |                            |<-- delay ms | status -------|
//!      |                            |                             |
//!      |                     [idle] |<-- hook(uri) ---------------| (any thread)
//!      |<-- callback(&Event) -------|                             |
//!      |                            |                             |
//!      |--- disconnect(handle) ---->|--- stop() ----------------->|
//! ```
//!
//! ### Session States
//!
//! | State          | Meaning                                           |
//! |----------------|---------------------------------------------------|
//! | `Connecting`   | Engine started, first tick not yet armed          |
//! | `Servicing`    | Service ticks running; reads and writes accepted  |
//! | `Error`        | Engine quit or failed; reported to Error callback |
//! | `Disconnected` | Torn down                                         |
//!
//! ### Event Kinds
//!
//! | Kind              | Engine triggers                          | Payload          |
//! |-------------------|------------------------------------------|------------------|
//! | `Error`           | none (service tick)                      | `Lwm2mError`     |
//! | `ResourceExecute` | factory reset, device reboot, fw update  | `/3/0/5`, `/3/0/4`, `/5/0/2` |
//! | `ResourceChanged` | resource changed                         | changed URI      |
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use lwm2m::{ClientConfig, EventKind, Lwm2mClient, ScriptedEngine, TokioLoop};
//!
//! let event_loop = Arc::new(TokioLoop::new()?);
//! let client = Lwm2mClient::new(Arc::new(ScriptedEngine::new()), event_loop.clone());
//!
//! let handle = client.connect(&ClientConfig::new("coap://host:5683", "dev1"))?;
//! client.set_callback(handle, EventKind::ResourceChanged, |ev| {
//!     println!("changed: {:?}", ev.uri());
//! })?;
//!
//! event_loop.run().await?;
//! client.disconnect(handle)?;
//! ```
//!
//! ## Modules
//!
//! - [`client`]: Application surface
//! - [`registry`]: Handle-indexed sessions
//! - [`session`]: Session state, events and resource I/O
//! - [`engine`]: Protocol engine boundary and the scripted engine
//! - [`event_loop`]: Loop boundary, manual and tokio loops
//! - [`object`]: Management objects and the object container
//! - [`tlv`]: TLV serialization helpers
//! - [`uri`]: Well-known resource URIs
//! - [`config`]: Configuration management
//! - [`error`]: Error types and result aliases

pub mod client;
pub mod config;
pub mod engine;
pub mod error;
pub mod event_loop;
mod marshal;
pub mod object;
pub mod registry;
mod scheduler;
pub mod session;
pub mod tlv;
pub mod uri;

// Re-exports for convenience
pub use client::Lwm2mClient;
pub use config::{ClientConfig, PskConfig, ServiceConfig};
pub use engine::{EngineClient, EngineHook, ProtocolEngine, ScriptedEngine, Trigger};
pub use error::{Lwm2mError, Result};
pub use event_loop::{EventLoop, ManualLoop, TokioLoop};
pub use object::{
    ConnectivityParams, DeviceParams, FirmwareParams, ManagementObject, ObjectContainer,
    ObjectKind,
};
pub use registry::{Handle, SessionRegistry};
pub use session::{Event, EventCallback, EventKind, Session, SessionState};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
