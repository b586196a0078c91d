//! End-to-end session lifecycle tests.
//!
//! These tests drive sessions through the public client surface with the
//! scripted engine and the manual loop, covering connect/disconnect,
//! service scheduling and resource I/O.

use std::sync::Arc;
use std::time::Duration;

use lwm2m::engine::{CLIENT_ERROR, CLIENT_QUIT};
use lwm2m::{
    ClientConfig, DeviceParams, Event, EventKind, Lwm2mClient, Lwm2mError, ManagementObject,
    ManualLoop, ObjectKind, ScriptedEngine, SessionState,
};
use parking_lot::Mutex;

fn setup() -> (Lwm2mClient, ScriptedEngine, Arc<ManualLoop>) {
    let engine = ScriptedEngine::new();
    let lp = Arc::new(ManualLoop::new());
    let client = Lwm2mClient::new(Arc::new(engine.clone()), lp.clone());
    (client, engine, lp)
}

fn dev1() -> ClientConfig {
    ClientConfig::new("coap://host:5683", "dev1")
}

/// Test connect then disconnect leaves nothing behind
#[test]
fn test_connect_disconnect() {
    let (client, engine, lp) = setup();

    let handle = client.connect(&dev1()).unwrap();
    assert_eq!(client.state(handle).unwrap(), SessionState::Servicing);
    assert_eq!(client.sessions(), vec![handle]);
    assert_eq!(engine.live_clients(), 1);

    client.disconnect(handle).unwrap();
    assert!(client.sessions().is_empty());
    assert_eq!(engine.live_clients(), 0);
    assert_eq!(lp.pending_timers(), 0);

    // Second disconnect is reported, not undefined
    assert_eq!(
        client.disconnect(handle).unwrap_err(),
        Lwm2mError::NotFound(handle)
    );
}

/// Test invalid configs never reach the engine
#[test]
fn test_connect_validation() {
    let (client, engine, _) = setup();

    let err = client
        .connect(&ClientConfig::new("", "dev1"))
        .unwrap_err();
    assert!(matches!(err, Lwm2mError::InvalidArgument(_)));

    let err = client
        .connect(&ClientConfig::new("coap://host:5683", ""))
        .unwrap_err();
    assert!(matches!(err, Lwm2mError::InvalidArgument(_)));

    engine.fail_start(true);
    let err = client.connect(&dev1()).unwrap_err();
    assert!(matches!(err, Lwm2mError::Protocol(_)));
    assert!(client.sessions().is_empty());
}

/// Test the object model handed to the engine
#[test]
fn test_connect_passes_objects() {
    let (client, engine, _) = setup();
    let device = ManagementObject::device(DeviceParams {
        manufacturer: Some("Acme"),
        battery_level: 87,
        ..Default::default()
    })
    .unwrap();
    assert_eq!(device.kind(), ObjectKind::Device);
    let config = dev1().with_psk("dev1-id", "secret").with_object(device);

    client.connect(&config).unwrap();
    let objects = engine.last_objects().unwrap();
    assert_eq!(objects.server.server_uri.as_str(), "coap://host:5683");
    assert_eq!(objects.server.psk_identity.as_str(), "dev1-id");
    assert!(objects.uses_psk());
    let device = objects.device.unwrap();
    assert_eq!(device.battery_level, 87);
    assert_eq!(device.manufacturer.as_str(), "Acme");
}

/// Test service ticks follow the delay the engine asks for
#[test]
fn test_service_tick_rearm() {
    let (client, engine, lp) = setup();
    engine.push_service_results([900]);

    let handle = client.connect(&dev1()).unwrap();
    let errors = Arc::new(Mutex::new(0usize));
    let sink = Arc::clone(&errors);
    client
        .set_callback(handle, EventKind::Error, move |_: &Event| *sink.lock() += 1)
        .unwrap();

    // First tick after the initial delay
    lp.advance(Duration::from_millis(100));
    assert_eq!(engine.service_calls(), 1);

    // Nothing before the requested 900 ms
    lp.advance(Duration::from_millis(899));
    assert_eq!(engine.service_calls(), 1);
    lp.advance(Duration::from_millis(1));
    assert_eq!(engine.service_calls(), 2);

    assert_eq!(*errors.lock(), 0);
    assert_eq!(lp.pending_timers(), 1);
    assert_eq!(client.state(handle).unwrap(), SessionState::Servicing);
}

/// Test a long run never accumulates service timers
#[test]
fn test_single_service_timer() {
    let (client, engine, lp) = setup();
    engine.push_service_results([0, 5, 0, 250, 10]);
    client.connect(&dev1()).unwrap();

    for _ in 0..20 {
        lp.advance(Duration::from_millis(100));
        assert!(lp.pending_timers() <= 1);
    }
    assert!(engine.service_calls() >= 6);
}

/// Test engine shutdown and failure are reported through the Error callback
#[test]
fn test_service_errors_delivered() {
    let (client, engine, lp) = setup();
    engine.push_service_results([CLIENT_QUIT]);
    let quit = client.connect(&dev1()).unwrap();

    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    client
        .set_callback(quit, EventKind::Error, move |ev: &Event| {
            sink.lock().push(ev.clone());
        })
        .unwrap();

    lp.advance(Duration::from_millis(100));
    assert_eq!(*seen.lock(), vec![Event::Error(Lwm2mError::Cancelled)]);
    assert_eq!(client.state(quit).unwrap(), SessionState::Error);

    // Halted, but still registered until disconnect
    lp.advance(Duration::from_secs(10));
    assert_eq!(engine.service_calls(), 1);
    assert_eq!(client.sessions(), vec![quit]);

    engine.push_service_results([CLIENT_ERROR]);
    let failed = client.connect(&dev1()).unwrap();
    lp.advance(Duration::from_millis(100));
    assert_eq!(client.state(failed).unwrap(), SessionState::Error);

    let mut buf = [0u8; 8];
    assert!(matches!(
        client.read_resource(failed, "/3/0/9", &mut buf),
        Err(Lwm2mError::Protocol(_))
    ));
}

/// Test reads into caller buffers
#[test]
fn test_read_resource_buffers() {
    let (client, engine, _) = setup();
    let handle = client.connect(&dev1()).unwrap();
    engine.set_resource("/3/0/0", "Open Mobile Alliance");

    // Zero capacity
    let mut empty: [u8; 0] = [];
    assert!(matches!(
        client.read_resource(handle, "/3/0/0", &mut empty),
        Err(Lwm2mError::InvalidArgument(_))
    ));

    // Too small: untouched
    let mut small = [0xAAu8; 4];
    assert_eq!(
        client.read_resource(handle, "/3/0/0", &mut small).unwrap_err(),
        Lwm2mError::BufferTooSmall {
            needed: 20,
            capacity: 4
        }
    );
    assert_eq!(small, [0xAA; 4]);

    let mut buf = [0u8; 64];
    let n = client.read_resource(handle, "/3/0/0", &mut buf).unwrap();
    assert_eq!(&buf[..n], b"Open Mobile Alliance");

    // Unknown resource
    assert!(matches!(
        client.read_resource(handle, "/3/0/99", &mut buf),
        Err(Lwm2mError::Protocol(_))
    ));
}

/// Test writes and URI validation
#[test]
fn test_write_resource() {
    let (client, engine, _) = setup();
    let handle = client.connect(&dev1()).unwrap();

    client.write_resource(handle, "/3/0/9", b"55").unwrap();
    assert_eq!(engine.resource("/3/0/9").unwrap(), b"55");

    assert!(matches!(
        client.write_resource(handle, "", b"1"),
        Err(Lwm2mError::InvalidArgument(_))
    ));
    assert!(matches!(
        client.write_resource(handle, "/3/0/9/0/1/2/3/4/5", b"1"),
        Err(Lwm2mError::InvalidArgument(_))
    ));

    engine.set_write_status(CLIENT_ERROR);
    assert!(matches!(
        client.write_resource(handle, "/3/0/9", b"56"),
        Err(Lwm2mError::Protocol(_))
    ));
}

/// Test TLV helpers through the client
#[test]
fn test_tlv_helpers() {
    let (client, engine, _) = setup();

    let ints = client.serialize_tlv_int(&[1, -1]).unwrap();
    assert_eq!(ints, vec![0x41, 0x00, 0x01, 0x41, 0x01, 0xFF]);

    assert!(matches!(
        client.serialize_tlv_int(&[]),
        Err(Lwm2mError::InvalidArgument(_))
    ));

    engine.override_tlv(Ok(Vec::new()));
    assert!(matches!(
        client.serialize_tlv_int(&[1]),
        Err(Lwm2mError::InvalidRange(_))
    ));

    let strings = client.serialize_tlv_string(&["10.0.0.1", "10.0.0.2"]).unwrap();
    assert_eq!(strings.len(), 2 * (3 + 8));
}
