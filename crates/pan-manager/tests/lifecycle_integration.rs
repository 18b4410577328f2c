//! Integration tests for manager startup, shutdown and the control surface.
//!
//! Startup initialises three things in order (bridge module, bridge
//! interface, link session module) before registering the management
//! endpoint.  A failure at any step must leave none of the earlier steps in
//! place.  These tests use the in-process collaborators and inspect their
//! state after each scenario.

use std::sync::Arc;

use async_trait::async_trait;
use pan_core::{BdAddr, CallResponse, MethodCall, PanRole, NETWORK_PATH};
use pan_manager::infrastructure::adapter::simulated::SimulatedAdapter;
use pan_manager::infrastructure::adapter::{BusServiceDirectory, ConfiguredAdapters};
use pan_manager::infrastructure::bus::loopback::LoopbackBus;
use pan_manager::infrastructure::bus::{BusConnection, ObjectHandler};
use pan_manager::infrastructure::collaborators::{
    BusConnectionObjects, BusServerObjects, LocalBridge, LocalSessions,
};
use pan_manager::infrastructure::control::run_control_loop;
use pan_manager::infrastructure::service::{
    ManagerDeps, ManagerSettings, NetworkManager, StartupError,
};
use pan_manager::infrastructure::storage::config::AdapterEntry;
use tokio_test::assert_ok;

struct Squatter;

#[async_trait]
impl ObjectHandler for Squatter {
    async fn handle(&self, _call: MethodCall) -> CallResponse {
        CallResponse::NotHandled
    }
}

struct Harness {
    bus: Arc<LoopbackBus>,
    bridge: Arc<LocalBridge>,
    sessions: Arc<LocalSessions>,
    deps: ManagerDeps,
}

fn harness() -> Harness {
    let bus = Arc::new(LoopbackBus::new());
    let bridge = Arc::new(LocalBridge::new());
    let sessions = Arc::new(LocalSessions::new());
    let deps = ManagerDeps {
        bus: bus.clone(),
        bridge: bridge.clone(),
        sessions: sessions.clone(),
        servers: Arc::new(BusServerObjects::new(bus.clone())),
        connections: Arc::new(BusConnectionObjects::new(bus.clone())),
        resolver: Arc::new(ConfiguredAdapters::new(vec![AdapterEntry {
            index: 0,
            address: None,
        }])),
        directory: Arc::new(BusServiceDirectory::new(bus.clone())),
    };
    Harness {
        bus,
        bridge,
        sessions,
        deps,
    }
}

#[tokio::test]
async fn test_occupied_endpoint_path_unwinds_startup() {
    // Arrange: something already owns the management path.
    let h = harness();
    h.bus.register_object(NETWORK_PATH, Arc::new(Squatter)).unwrap();

    // Act
    let result = NetworkManager::start(ManagerSettings::default(), h.deps.clone());

    // Assert
    assert!(matches!(result, Err(StartupError::Register { .. })));
    assert!(!h.bridge.is_initialised());
    assert!(h.bridge.interfaces().is_empty());
    assert!(!h.sessions.is_initialised());
    assert_eq!(h.bus.registration_count(), 1, "the squatter is untouched");
}

#[tokio::test]
async fn test_occupied_bridge_name_unwinds_startup() {
    let h = harness();
    // A second manager cannot create the same bridge while the first runs.
    let first = NetworkManager::start(ManagerSettings::default(), h.deps.clone()).unwrap();

    let second = NetworkManager::start(ManagerSettings::default(), h.deps.clone());

    assert!(matches!(second, Err(StartupError::BridgeCreate { .. })));
    // The failed start cleaned up the shared bridge module.
    assert!(!h.bridge.is_initialised());
    first.stop().await;
}

#[tokio::test]
async fn test_restart_after_stop_starts_from_a_clean_state() {
    // Arrange
    let h = harness();
    let peer: BdAddr = "AA:BB:CC:DD:EE:FF".parse().unwrap();
    h.bus
        .register_object(
            "/org/bluez/hci0",
            Arc::new(SimulatedAdapter::new([(peer, vec![PanRole::Gn])])),
        )
        .unwrap();
    let manager = NetworkManager::start(ManagerSettings::default(), h.deps.clone()).unwrap();
    let call = MethodCall::new(NETWORK_PATH, "org.bluez.network.Manager", "CreateConnection")
        .arg("AA:BB:CC:DD:EE:FF")
        .arg("gn");
    assert_ok!(h.bus.call(call.clone()).await);
    manager.stop().await;

    // Act
    let manager = NetworkManager::start(ManagerSettings::default(), h.deps.clone()).unwrap();
    let body = assert_ok!(h.bus.call(call).await);

    // Assert: the counter restarted with the new state.
    assert_eq!(
        body,
        vec![pan_core::Value::Str("/org/bluez/network/connection0".into())]
    );
    assert_eq!(h.sessions.kill_count(), 1);
    manager.stop().await;
    assert_eq!(h.sessions.kill_count(), 2);
}

#[tokio::test]
async fn test_control_loop_drives_the_manager_end_to_end() {
    // Arrange
    let h = harness();
    let peer: BdAddr = "AA:BB:CC:DD:EE:FF".parse().unwrap();
    h.bus
        .register_object(
            "/org/bluez/hci0",
            Arc::new(SimulatedAdapter::new([(peer, vec![PanRole::Nap])])),
        )
        .unwrap();
    let manager = NetworkManager::start(ManagerSettings::default(), h.deps.clone()).unwrap();
    let input = concat!(
        r#"{"method": "CreateServer", "args": ["nap"]}"#, "\n",
        r#"{"method": "CreateConnection", "args": ["AA:BB:CC:DD:EE:FF", "nap"]}"#, "\n",
        r#"{"method": "CreateConnection", "args": ["11:22:33:44:55:66", "nap"]}"#, "\n",
        r#"{"method": "ListConnections"}"#, "\n",
    );
    let mut output = Vec::new();

    // Act
    run_control_loop(
        h.bus.clone(),
        input.as_bytes(),
        &mut output,
        manager.subscribe(),
    )
    .await
    .unwrap();

    // Assert: replies come back in request order; signals may be interleaved.
    let replies: Vec<serde_json::Value> = String::from_utf8(output)
        .unwrap()
        .lines()
        .map(|l| serde_json::from_str::<serde_json::Value>(l).unwrap())
        .filter(|v| v.get("signal").is_none())
        .collect();
    assert_eq!(replies.len(), 4);
    assert_eq!(replies[0]["ok"], "/org/bluez/network/server/1116");
    assert_eq!(replies[1]["ok"], "/org/bluez/network/connection0");
    assert_eq!(
        replies[2]["error"]["name"],
        "org.bluez.Error.ConnectionAttemptFailed"
    );
    assert_eq!(
        replies[3]["ok"],
        serde_json::json!(["/org/bluez/network/connection0"])
    );
    manager.stop().await;
}
