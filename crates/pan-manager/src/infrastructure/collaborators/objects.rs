//! Server and connection objects exported on the bus.
//!
//! Each attached object answers a few read-only queries at its own path:
//!
//! | Interface                     | Method       | Returns                 |
//! |-------------------------------|--------------|-------------------------|
//! | `org.bluez.network.Server`    | `GetUUID`    | service UUID (128-bit)  |
//! |                               | `GetName`    | human-readable name     |
//! | `org.bluez.network.Connection`| `GetUUID`    | service UUID (128-bit)  |
//! |                               | `GetAddress` | remote device address   |
//!
//! Exact-path registrations take precedence over the manager's fallback, so
//! once detached a path falls back to the manager, which answers
//! `UnknownObject`.

use std::sync::Arc;

use async_trait::async_trait;
use pan_core::{BdAddr, BusError, CallResponse, MethodCall, ServiceRequestType, Value};

use crate::application::collaborators::{CollaboratorError, ConnectionObjects, ServerObjects};
use crate::infrastructure::bus::{BusConnection, ObjectHandler};

pub const SERVER_INTERFACE: &str = "org.bluez.network.Server";
pub const CONNECTION_INTERFACE: &str = "org.bluez.network.Connection";

fn attach_error(path: &str, err: BusError) -> CollaboratorError {
    if err.has_name(BusError::OBJECT_PATH_IN_USE) {
        CollaboratorError::InUse(path.to_string())
    } else {
        CollaboratorError::Failed(err.to_string())
    }
}

fn detach(bus: &dyn BusConnection, path: &str) -> Result<(), CollaboratorError> {
    bus.unregister_object_path(path)
        .map_err(|_| CollaboratorError::Missing(path.to_string()))
}

// ── Servers ───────────────────────────────────────────────────────────────────

struct ServerObject {
    service: ServiceRequestType,
}

#[async_trait]
impl ObjectHandler for ServerObject {
    async fn handle(&self, call: MethodCall) -> CallResponse {
        if call.interface != SERVER_INTERFACE {
            return CallResponse::NotHandled;
        }
        match call.member.as_str() {
            "GetUUID" => CallResponse::Return(vec![Value::Str(self.service.uuid128())]),
            "GetName" => CallResponse::Return(vec![Value::Str(format!(
                "{} network service",
                self.service
            ))]),
            _ => CallResponse::NotHandled,
        }
    }
}

/// Exports server objects on the bus.
pub struct BusServerObjects {
    bus: Arc<dyn BusConnection>,
}

impl BusServerObjects {
    pub fn new(bus: Arc<dyn BusConnection>) -> Self {
        Self { bus }
    }
}

impl ServerObjects for BusServerObjects {
    fn attach(&self, path: &str, service: ServiceRequestType) -> Result<(), CollaboratorError> {
        self.bus
            .register_object(path, Arc::new(ServerObject { service }))
            .map_err(|e| attach_error(path, e))
    }

    fn detach(&self, path: &str) -> Result<(), CollaboratorError> {
        detach(self.bus.as_ref(), path)
    }
}

// ── Connections ───────────────────────────────────────────────────────────────

struct ConnectionObject {
    remote: BdAddr,
    service: ServiceRequestType,
}

#[async_trait]
impl ObjectHandler for ConnectionObject {
    async fn handle(&self, call: MethodCall) -> CallResponse {
        if call.interface != CONNECTION_INTERFACE {
            return CallResponse::NotHandled;
        }
        match call.member.as_str() {
            "GetUUID" => CallResponse::Return(vec![Value::Str(self.service.uuid128())]),
            "GetAddress" => CallResponse::Return(vec![Value::Str(self.remote.to_string())]),
            _ => CallResponse::NotHandled,
        }
    }
}

/// Exports connection objects on the bus.
pub struct BusConnectionObjects {
    bus: Arc<dyn BusConnection>,
}

impl BusConnectionObjects {
    pub fn new(bus: Arc<dyn BusConnection>) -> Self {
        Self { bus }
    }
}

impl ConnectionObjects for BusConnectionObjects {
    fn attach(
        &self,
        path: &str,
        remote: BdAddr,
        service: ServiceRequestType,
    ) -> Result<(), CollaboratorError> {
        self.bus
            .register_object(path, Arc::new(ConnectionObject { remote, service }))
            .map_err(|e| attach_error(path, e))
    }

    fn detach(&self, path: &str) -> Result<(), CollaboratorError> {
        detach(self.bus.as_ref(), path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::bus::loopback::LoopbackBus;
    use crate::infrastructure::bus::BusCallError;

    const PATH: &str = "/org/bluez/network/connection0";

    #[tokio::test]
    async fn test_attached_connection_answers_queries() {
        // Arrange
        let bus = Arc::new(LoopbackBus::new());
        let objects = BusConnectionObjects::new(bus.clone());
        let remote: BdAddr = "AA:BB:CC:DD:EE:FF".parse().unwrap();

        // Act
        objects
            .attach(PATH, remote, ServiceRequestType::GroupNetwork)
            .unwrap();
        let address = bus
            .call(MethodCall::new(PATH, CONNECTION_INTERFACE, "GetAddress"))
            .await
            .unwrap();

        // Assert
        assert_eq!(address, vec![Value::Str("AA:BB:CC:DD:EE:FF".into())]);
    }

    #[tokio::test]
    async fn test_detached_server_is_gone() {
        let bus = Arc::new(LoopbackBus::new());
        let objects = BusServerObjects::new(bus.clone());
        let path = "/org/bluez/network/server/1116";
        objects
            .attach(path, ServiceRequestType::NetworkAccessPoint)
            .unwrap();

        objects.detach(path).unwrap();

        let result = bus
            .call(MethodCall::new(path, SERVER_INTERFACE, "GetUUID"))
            .await;
        assert!(matches!(
            result,
            Err(BusCallError::Reply(err)) if err.has_name(BusError::UNKNOWN_OBJECT)
        ));
    }

    #[test]
    fn test_attach_on_occupied_path_is_in_use() {
        let bus = Arc::new(LoopbackBus::new());
        let objects = BusServerObjects::new(bus);
        let path = "/org/bluez/network/server/1117";
        objects.attach(path, ServiceRequestType::GroupNetwork).unwrap();

        let result = objects.attach(path, ServiceRequestType::GroupNetwork);

        assert_eq!(result, Err(CollaboratorError::InUse(path.to_string())));
    }

    #[test]
    fn test_detach_unknown_path_is_missing() {
        let objects = BusConnectionObjects::new(Arc::new(LoopbackBus::new()));
        assert_eq!(
            objects.detach(PATH),
            Err(CollaboratorError::Missing(PATH.to_string()))
        );
    }

    #[tokio::test]
    async fn test_server_object_reports_uuid_and_name() {
        let server = ServerObject {
            service: ServiceRequestType::NetworkAccessPoint,
        };

        let uuid = server
            .handle(MethodCall::new("/s", SERVER_INTERFACE, "GetUUID"))
            .await;
        let name = server
            .handle(MethodCall::new("/s", SERVER_INTERFACE, "GetName"))
            .await;

        assert_eq!(
            uuid,
            CallResponse::Return(vec![Value::Str(
                "00001116-0000-1000-8000-00805f9b34fb".into()
            )])
        );
        assert_eq!(
            name,
            CallResponse::Return(vec![Value::Str("NAP network service".into())])
        );
    }
}
