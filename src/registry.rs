//! Handle-indexed session registry.
//!
//! Applications never hold sessions directly; they hold a [`Handle`] and the
//! registry resolves it on every call. Handles are allocated from a counter
//! and never reused, so a stale handle resolves to `NotFound` instead of to
//! a newer session.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use serde::Serialize;
use tracing::{debug, info};

use crate::config::ClientConfig;
use crate::engine::ProtocolEngine;
use crate::error::{Lwm2mError, Result};
use crate::event_loop::EventLoop;
use crate::session::Session;

/// Opaque session handle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct Handle(u64);

impl Handle {
    pub(crate) fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Raw handle value
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Live sessions by handle
pub struct SessionRegistry {
    sessions: RwLock<HashMap<Handle, Arc<Session>>>,
    next_handle: AtomicU64,
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            next_handle: AtomicU64::new(1),
        }
    }

    /// Start a session and register it.
    ///
    /// Nothing is registered if validation or the engine start fails.
    pub fn create(
        &self,
        config: &ClientConfig,
        engine: &dyn ProtocolEngine,
        event_loop: Arc<dyn EventLoop>,
    ) -> Result<Handle> {
        let handle = Handle(self.next_handle.fetch_add(1, Ordering::Relaxed));
        let session = Session::start(handle, config, engine, event_loop)?;

        self.sessions.write().insert(handle, session);
        debug!("Registered session {}", handle);
        Ok(handle)
    }

    /// Resolve a handle
    pub fn lookup(&self, handle: Handle) -> Result<Arc<Session>> {
        self.sessions
            .read()
            .get(&handle)
            .cloned()
            .ok_or(Lwm2mError::NotFound(handle))
    }

    /// Shut a session down and remove it.
    pub fn destroy(&self, handle: Handle) -> Result<()> {
        let session = self
            .sessions
            .write()
            .remove(&handle)
            .ok_or(Lwm2mError::NotFound(handle))?;
        session.shutdown();
        Ok(())
    }

    /// Number of live sessions
    pub fn len(&self) -> usize {
        self.sessions.read().len()
    }

    /// Check if no session is registered
    pub fn is_empty(&self) -> bool {
        self.sessions.read().is_empty()
    }

    /// Live handles in allocation order
    pub fn handles(&self) -> Vec<Handle> {
        let mut handles: Vec<Handle> = self.sessions.read().keys().copied().collect();
        handles.sort();
        handles
    }
}

impl Drop for SessionRegistry {
    fn drop(&mut self) {
        let sessions: Vec<_> = self.sessions.get_mut().drain().collect();
        if !sessions.is_empty() {
            info!("Shutting down {} remaining session(s)", sessions.len());
        }
        for (_, session) in sessions {
            session.shutdown();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::ScriptedEngine;
    use crate::event_loop::ManualLoop;

    fn config() -> ClientConfig {
        ClientConfig::new("coap://host:5683", "dev1")
    }

    #[test]
    fn test_create_lookup_destroy() {
        let registry = SessionRegistry::new();
        let engine = ScriptedEngine::new();
        let lp = Arc::new(ManualLoop::new());

        let handle = registry.create(&config(), &engine, lp.clone()).unwrap();
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.lookup(handle).unwrap().client_name(), "dev1");

        registry.destroy(handle).unwrap();
        assert!(registry.is_empty());
        assert_eq!(registry.lookup(handle).unwrap_err(), Lwm2mError::NotFound(handle));
        assert_eq!(registry.destroy(handle).unwrap_err(), Lwm2mError::NotFound(handle));
        assert_eq!(lp.pending_timers(), 0);
    }

    #[test]
    fn test_handles_are_not_reused() {
        let registry = SessionRegistry::new();
        let engine = ScriptedEngine::new();
        let lp = Arc::new(ManualLoop::new());

        let a = registry.create(&config(), &engine, lp.clone()).unwrap();
        registry.destroy(a).unwrap();
        let b = registry.create(&config(), &engine, lp.clone()).unwrap();
        assert_ne!(a, b);
        assert_eq!(registry.handles(), vec![b]);
    }

    #[test]
    fn test_failed_create_registers_nothing() {
        let registry = SessionRegistry::new();
        let engine = ScriptedEngine::new();
        engine.fail_start(true);
        let lp = Arc::new(ManualLoop::new());

        let err = registry.create(&config(), &engine, lp).unwrap_err();
        assert!(matches!(err, Lwm2mError::Protocol(_)));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_drop_shuts_sessions_down() {
        let engine = ScriptedEngine::new();
        let lp = Arc::new(ManualLoop::new());
        {
            let registry = SessionRegistry::new();
            registry.create(&config(), &engine, lp.clone()).unwrap();
            registry.create(&config(), &engine, lp.clone()).unwrap();
            assert_eq!(engine.live_clients(), 2);
        }
        assert_eq!(engine.live_clients(), 0);
        assert_eq!(lp.pending_timers(), 0);
    }

    #[test]
    fn test_lookup_while_other_handles_churn() {
        let registry = SessionRegistry::new();
        let engine = ScriptedEngine::new();
        let lp = Arc::new(ManualLoop::new());
        let anchor = registry.create(&config(), &engine, lp.clone()).unwrap();

        std::thread::scope(|s| {
            for _ in 0..4 {
                s.spawn(|| {
                    for i in 0..50 {
                        let handle = registry.create(&config(), &engine, lp.clone()).unwrap();
                        assert_ne!(handle, anchor);
                        if i % 2 == 0 {
                            registry.destroy(handle).unwrap();
                        }
                    }
                });
            }
            for _ in 0..4 {
                s.spawn(|| {
                    for _ in 0..200 {
                        let session = registry.lookup(anchor).unwrap();
                        assert_eq!(session.handle(), anchor);
                        assert!(session.is_servicing());
                    }
                });
            }
        });

        assert_eq!(registry.len(), 1 + 4 * 25);
        assert_eq!(registry.handles().len(), registry.len());
        assert_eq!(engine.live_clients(), registry.len());
    }
}
