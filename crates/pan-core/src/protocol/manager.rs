//! The management endpoint's method and signal surface.
//!
//! Method names are resolved once into [`ManagerMethod`]; anything outside
//! this closed set is not the manager's to answer.

use crate::domain::path::{NETWORK_MANAGER_INTERFACE, NETWORK_PATH};

use super::messages::{Signal, Value};

/// Methods exposed on `org.bluez.network.Manager`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ManagerMethod {
    ListServers,
    CreateServer,
    RemoveServer,
    ListConnections,
    CreateConnection,
    RemoveConnection,
}

impl ManagerMethod {
    pub const ALL: [ManagerMethod; 6] = [
        ManagerMethod::ListServers,
        ManagerMethod::CreateServer,
        ManagerMethod::RemoveServer,
        ManagerMethod::ListConnections,
        ManagerMethod::CreateConnection,
        ManagerMethod::RemoveConnection,
    ];

    pub fn member(self) -> &'static str {
        match self {
            ManagerMethod::ListServers => "ListServers",
            ManagerMethod::CreateServer => "CreateServer",
            ManagerMethod::RemoveServer => "RemoveServer",
            ManagerMethod::ListConnections => "ListConnections",
            ManagerMethod::CreateConnection => "CreateConnection",
            ManagerMethod::RemoveConnection => "RemoveConnection",
        }
    }

    /// Input argument signature.
    pub fn signature(self) -> &'static str {
        match self {
            ManagerMethod::ListServers | ManagerMethod::ListConnections => "",
            ManagerMethod::CreateServer
            | ManagerMethod::RemoveServer
            | ManagerMethod::RemoveConnection => "s",
            ManagerMethod::CreateConnection => "ss",
        }
    }

    /// Resolves a member name; `None` for anything outside the interface.
    pub fn from_member(member: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|m| m.member() == member)
    }
}

/// Lifecycle notifications emitted on the management endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ManagerSignal {
    ServerCreated(String),
    ServerRemoved(String),
    ConnectionCreated(String),
    ConnectionRemoved(String),
}

impl ManagerSignal {
    pub fn member(&self) -> &'static str {
        match self {
            ManagerSignal::ServerCreated(_) => "ServerCreated",
            ManagerSignal::ServerRemoved(_) => "ServerRemoved",
            ManagerSignal::ConnectionCreated(_) => "ConnectionCreated",
            ManagerSignal::ConnectionRemoved(_) => "ConnectionRemoved",
        }
    }

    /// The affected identifier.
    pub fn path(&self) -> &str {
        match self {
            ManagerSignal::ServerCreated(p)
            | ManagerSignal::ServerRemoved(p)
            | ManagerSignal::ConnectionCreated(p)
            | ManagerSignal::ConnectionRemoved(p) => p,
        }
    }

    /// Wraps the notification as a bus signal from the management endpoint.
    pub fn into_signal(self) -> Signal {
        let member = self.member().to_string();
        let path = match self {
            ManagerSignal::ServerCreated(p)
            | ManagerSignal::ServerRemoved(p)
            | ManagerSignal::ConnectionCreated(p)
            | ManagerSignal::ConnectionRemoved(p) => p,
        };
        Signal {
            path: NETWORK_PATH.to_string(),
            interface: NETWORK_MANAGER_INTERFACE.to_string(),
            member,
            args: vec![Value::Str(path)],
        }
    }

    /// Recognises a manager lifecycle signal on the bus.
    pub fn from_signal(signal: &Signal) -> Option<Self> {
        if signal.path != NETWORK_PATH || signal.interface != NETWORK_MANAGER_INTERFACE {
            return None;
        }
        let path = match signal.args.first() {
            Some(Value::Str(p)) => p.clone(),
            _ => return None,
        };
        match signal.member.as_str() {
            "ServerCreated" => Some(ManagerSignal::ServerCreated(path)),
            "ServerRemoved" => Some(ManagerSignal::ServerRemoved(path)),
            "ConnectionCreated" => Some(ManagerSignal::ConnectionCreated(path)),
            "ConnectionRemoved" => Some(ManagerSignal::ConnectionRemoved(path)),
            _ => None,
        }
    }
}
