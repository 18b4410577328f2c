//! # pan-core
//!
//! Shared library for the PAN network manager containing the bus message
//! model, the manager's method/signal surface, the caller-visible error
//! taxonomy, and the Bluetooth domain types (device addresses, PAN service
//! roles, object paths).
//!
//! This crate has no async runtime and performs no I/O.  It is used by the
//! manager daemon and by anything that talks to it.
//!
//! # Architecture overview
//!
//! A PAN (personal area network) manager lets a local host either offer a
//! network service to nearby Bluetooth devices (a *server*) or reach out to a
//! remote device's network service (a *connection*).
//!
//! - **`domain`** – Plain Bluetooth concepts: the 6-byte device address, the
//!   three PAN service roles (PANU, NAP, GN) and the object-path scheme used
//!   to name servers and connections.
//!
//! - **`protocol`** – How requests travel over the message bus: typed
//!   argument values, method calls, signals, error replies, and the closed
//!   set of methods and signals the management endpoint understands.

pub mod domain;
pub mod protocol;

pub use domain::address::{AddressParseError, BdAddr};
pub use domain::path::{
    adapter_path, connection_path, server_path, ADAPTER_INTERFACE, ADAPTER_PATH_PREFIX,
    NETWORK_MANAGER_INTERFACE, NETWORK_PATH,
};
pub use domain::service::{PanRole, ServiceParseError, ServiceRequestType};
pub use protocol::errors::ManagerError;
pub use protocol::manager::{ManagerMethod, ManagerSignal};
pub use protocol::messages::{ArgError, Args, BusError, CallResponse, MethodCall, Signal, Value};
