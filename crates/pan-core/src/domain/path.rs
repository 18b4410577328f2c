//! Object paths.
//!
//! Servers and connections are named by paths below the management endpoint:
//!
//! ```text
//! /org/bluez/network                  management endpoint
//! /org/bluez/network/server/1116      NAP server (hex service id)
//! /org/bluez/network/connection0      first connection of this manager run
//! /org/bluez/hci0                     adapter endpoint for outbound lookups
//! ```
//!
//! Server paths are a pure function of the service type, so asking twice for
//! the same server yields the same path.  Connection paths come from a
//! counter owned by the manager.

use crate::domain::service::ServiceRequestType;

/// The management endpoint's well-known path.
pub const NETWORK_PATH: &str = "/org/bluez/network";

/// Interface name of the management endpoint.
pub const NETWORK_MANAGER_INTERFACE: &str = "org.bluez.network.Manager";

/// Adapter endpoints live at `ADAPTER_PATH_PREFIX` followed by the adapter index.
pub const ADAPTER_PATH_PREFIX: &str = "/org/bluez/hci";

/// Interface that exposes the remote service directory lookups.
pub const ADAPTER_INTERFACE: &str = "org.bluez.Adapter";

/// Deterministic path of the server offering `service`.
pub fn server_path(service: ServiceRequestType) -> String {
    format!("{NETWORK_PATH}/server/{:X}", service.id())
}

/// Path of the `n`th connection created during this manager run.
pub fn connection_path(n: u64) -> String {
    format!("{NETWORK_PATH}/connection{n}")
}

/// Path of the adapter endpoint with the given index.
pub fn adapter_path(index: u16) -> String {
    format!("{ADAPTER_PATH_PREFIX}{index}")
}
