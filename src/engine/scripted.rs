//! Deterministic in-memory protocol engine.
//!
//! `ScriptedEngine` stands in for a real LWM2M stack in simulations, the
//! `lwm2m-sim` binary and tests. It never touches the network:
//!
//! - service calls pop results from a script (falling back to a fixed delay),
//! - resources live in a shared in-memory store,
//! - triggers are fired explicitly with [`ScriptedEngine::fire`], from any
//!   thread, the way a real engine fires them from its receive thread,
//! - TLV serialization uses the crate's OMA-TLV encoder unless overridden.
//!
//! Every hook registration and removal is recorded so callers can check that
//! they come in matched groups.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tracing::debug;

use super::{
    encode_int_array, encode_string_array, EngineClient, EngineHook, EngineStatus,
    ProtocolEngine, Trigger, CLIENT_ERROR, CLIENT_OK,
};
use crate::object::ObjectContainer;

/// Delay returned when the service script is empty
pub const DEFAULT_SERVICE_DELAY_MS: EngineStatus = 1000;

/// One hook registration change
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookOp {
    /// Hook installed
    Registered(Trigger),
    /// Hook removed
    Unregistered(Trigger),
}

#[derive(Default)]
struct ClientSlot {
    objects: ObjectContainer,
    hooks: HashMap<Trigger, EngineHook>,
    stopped: bool,
}

struct Shared {
    fail_start: bool,
    service_script: VecDeque<EngineStatus>,
    service_calls: usize,
    quanta: Vec<Duration>,
    resources: HashMap<String, Vec<u8>>,
    write_status: EngineStatus,
    read_status: Option<EngineStatus>,
    tlv_override: Option<std::result::Result<Vec<u8>, EngineStatus>>,
    clients: Vec<ClientSlot>,
    hook_log: Vec<HookOp>,
}

impl Default for Shared {
    fn default() -> Self {
        Self {
            fail_start: false,
            service_script: VecDeque::new(),
            service_calls: 0,
            quanta: Vec::new(),
            resources: HashMap::new(),
            write_status: CLIENT_OK,
            read_status: None,
            tlv_override: None,
            clients: Vec::new(),
            hook_log: Vec::new(),
        }
    }
}

/// Scriptable engine; clones share state.
#[derive(Clone, Default)]
pub struct ScriptedEngine {
    shared: Arc<Mutex<Shared>>,
}

impl ScriptedEngine {
    /// Create an engine with an empty script
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `start` calls fail
    pub fn fail_start(&self, fail: bool) {
        self.shared.lock().fail_start = fail;
    }

    /// Queue raw results for upcoming service calls
    pub fn push_service_results(&self, results: impl IntoIterator<Item = EngineStatus>) {
        self.shared.lock().service_script.extend(results);
    }

    /// Number of service calls made so far, across all clients
    pub fn service_calls(&self) -> usize {
        self.shared.lock().service_calls
    }

    /// Quantum passed to each service call
    pub fn service_quanta(&self) -> Vec<Duration> {
        self.shared.lock().quanta.clone()
    }

    /// Set a resource value as if the server or device changed it
    pub fn set_resource(&self, uri: &str, value: impl Into<Vec<u8>>) {
        self.shared.lock().resources.insert(uri.to_string(), value.into());
    }

    /// Current value of a resource
    pub fn resource(&self, uri: &str) -> Option<Vec<u8>> {
        self.shared.lock().resources.get(uri).cloned()
    }

    /// Status returned by subsequent writes
    pub fn set_write_status(&self, status: EngineStatus) {
        self.shared.lock().write_status = status;
    }

    /// Make subsequent reads fail with `status` (`None` restores reads)
    pub fn set_read_failure(&self, status: Option<EngineStatus>) {
        self.shared.lock().read_status = status;
    }

    /// Force the result of the next TLV serialization call
    pub fn override_tlv(&self, result: std::result::Result<Vec<u8>, EngineStatus>) {
        self.shared.lock().tlv_override = Some(result);
    }

    /// Hook registration history
    pub fn hook_log(&self) -> Vec<HookOp> {
        self.shared.lock().hook_log.clone()
    }

    /// Triggers with a hook installed on the most recent client
    pub fn registered_triggers(&self) -> Vec<Trigger> {
        self.shared
            .lock()
            .clients
            .last()
            .map(|c| c.hooks.keys().copied().collect())
            .unwrap_or_default()
    }

    /// Object container handed to the most recent `start`
    pub fn last_objects(&self) -> Option<ObjectContainer> {
        self.shared.lock().clients.last().map(|c| c.objects.clone())
    }

    /// Number of clients started and not yet stopped
    pub fn live_clients(&self) -> usize {
        self.shared.lock().clients.iter().filter(|c| !c.stopped).count()
    }

    /// Invoke the hooks for `trigger` on every live client.
    ///
    /// Safe to call from any thread. Returns the number of hooks invoked.
    pub fn fire(&self, trigger: Trigger, uri: Option<&str>) -> usize {
        let hooks: Vec<EngineHook> = {
            let shared = self.shared.lock();
            shared
                .clients
                .iter()
                .filter(|c| !c.stopped)
                .filter_map(|c| c.hooks.get(&trigger).cloned())
                .collect()
        };

        debug!("Firing {} on {} hook(s)", trigger, hooks.len());
        for hook in &hooks {
            hook(uri);
        }
        hooks.len()
    }

    /// Update a resource and raise its change notification.
    pub fn change_resource(&self, uri: &str, value: impl Into<Vec<u8>>) -> usize {
        self.set_resource(uri, value);
        self.fire(Trigger::ResourceChanged, Some(uri))
    }

    fn take_tlv_override(&self) -> Option<std::result::Result<Vec<u8>, EngineStatus>> {
        self.shared.lock().tlv_override.take()
    }
}

impl ProtocolEngine for ScriptedEngine {
    fn start(&self, objects: &ObjectContainer) -> Option<Box<dyn EngineClient>> {
        let mut shared = self.shared.lock();
        if shared.fail_start {
            return None;
        }

        shared.clients.push(ClientSlot {
            objects: objects.clone(),
            ..Default::default()
        });
        let index = shared.clients.len() - 1;
        debug!("Scripted client {} started for {}", index, objects.server.server_uri);

        Some(Box::new(ScriptedClient {
            shared: Arc::clone(&self.shared),
            index,
        }))
    }

    fn serialize_tlv_int(&self, values: &[i64]) -> std::result::Result<Vec<u8>, EngineStatus> {
        self.take_tlv_override()
            .unwrap_or_else(|| encode_int_array(values))
    }

    fn serialize_tlv_string(
        &self,
        values: &[&str],
    ) -> std::result::Result<Vec<u8>, EngineStatus> {
        self.take_tlv_override()
            .unwrap_or_else(|| encode_string_array(values))
    }
}

/// Client instance returned by [`ScriptedEngine::start`].
struct ScriptedClient {
    shared: Arc<Mutex<Shared>>,
    index: usize,
}

impl EngineClient for ScriptedClient {
    fn service(&mut self, quantum: Duration) -> EngineStatus {
        let mut shared = self.shared.lock();
        shared.service_calls += 1;
        shared.quanta.push(quantum);
        shared
            .service_script
            .pop_front()
            .unwrap_or(DEFAULT_SERVICE_DELAY_MS)
    }

    fn read_resource(&mut self, uri: &str) -> std::result::Result<Vec<u8>, EngineStatus> {
        let shared = self.shared.lock();
        if let Some(status) = shared.read_status {
            return Err(status);
        }
        shared.resources.get(uri).cloned().ok_or(CLIENT_ERROR)
    }

    fn write_resource(&mut self, uri: &str, value: &[u8]) -> EngineStatus {
        let mut shared = self.shared.lock();
        if shared.write_status == CLIENT_OK {
            shared.resources.insert(uri.to_string(), value.to_vec());
        }
        shared.write_status
    }

    fn register_callback(&mut self, trigger: Trigger, hook: EngineHook) {
        let mut shared = self.shared.lock();
        shared.hook_log.push(HookOp::Registered(trigger));
        if let Some(client) = shared.clients.get_mut(self.index) {
            client.hooks.insert(trigger, hook);
        }
    }

    fn unregister_callback(&mut self, trigger: Trigger) {
        let mut shared = self.shared.lock();
        shared.hook_log.push(HookOp::Unregistered(trigger));
        if let Some(client) = shared.clients.get_mut(self.index) {
            client.hooks.remove(&trigger);
        }
    }

    fn stop(&mut self) {
        let mut shared = self.shared.lock();
        if let Some(client) = shared.clients.get_mut(self.index) {
            client.stopped = true;
            client.hooks.clear();
        }
        debug!("Scripted client {} stopped", self.index);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_service_script_then_default() {
        let engine = ScriptedEngine::new();
        engine.push_service_results([900, CLIENT_ERROR]);
        let mut client = engine.start(&ObjectContainer::default()).unwrap();

        assert_eq!(client.service(Duration::from_secs(1)), 900);
        assert_eq!(client.service(Duration::from_secs(1)), CLIENT_ERROR);
        assert_eq!(client.service(Duration::from_secs(1)), DEFAULT_SERVICE_DELAY_MS);
        assert_eq!(engine.service_calls(), 3);
    }

    #[test]
    fn test_fail_start() {
        let engine = ScriptedEngine::new();
        engine.fail_start(true);
        assert!(engine.start(&ObjectContainer::default()).is_none());
    }

    #[test]
    fn test_write_then_read() {
        let engine = ScriptedEngine::new();
        let mut client = engine.start(&ObjectContainer::default()).unwrap();
        assert_eq!(client.write_resource("/3/0/9", b"87"), CLIENT_OK);
        assert_eq!(client.read_resource("/3/0/9").unwrap(), b"87");
        assert_eq!(client.read_resource("/3/0/0"), Err(CLIENT_ERROR));
    }

    #[test]
    fn test_fire_skips_stopped_clients() {
        let engine = ScriptedEngine::new();
        let mut client = engine.start(&ObjectContainer::default()).unwrap();
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&hits);
        client.register_callback(
            Trigger::DeviceReboot,
            Arc::new(move |_: Option<&str>| {
                counter.fetch_add(1, Ordering::SeqCst);
            }),
        );

        assert_eq!(engine.fire(Trigger::DeviceReboot, None), 1);
        client.stop();
        assert_eq!(engine.fire(Trigger::DeviceReboot, None), 0);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert_eq!(engine.live_clients(), 0);
    }
}
