//! Adapter-side service directory.
//!
//! Outbound negotiation lookups are method calls on the local adapter
//! endpoint (`/org/bluez/hci<N>`, interface `org.bluez.Adapter`):
//!
//! | Lookup                     | Method                     | In     | Out  |
//! |----------------------------|----------------------------|--------|------|
//! | `discover_service_handles` | `GetRemoteServiceHandles`  | `ss`   | `au` |
//! | `fetch_service_record`     | `GetRemoteServiceRecord`   | `su`   | `ay` |
//!
//! [`BusServiceDirectory`] issues those calls over a [`BusConnection`];
//! [`ConfiguredAdapters`] picks which adapter endpoint they go to.

pub mod simulated;

use std::sync::Arc;

use async_trait::async_trait;
use pan_core::{adapter_path, Args, BdAddr, MethodCall, ServiceRequestType, ADAPTER_INTERFACE};

use crate::application::negotiate::{AdapterResolver, DirectoryError, ServiceDirectory};
use crate::infrastructure::bus::{BusCallError, BusConnection};
use crate::infrastructure::storage::config::AdapterEntry;

pub const GET_REMOTE_SERVICE_HANDLES: &str = "GetRemoteServiceHandles";
pub const GET_REMOTE_SERVICE_RECORD: &str = "GetRemoteServiceRecord";

/// [`ServiceDirectory`] backed by adapter method calls.
pub struct BusServiceDirectory {
    bus: Arc<dyn BusConnection>,
}

impl BusServiceDirectory {
    pub fn new(bus: Arc<dyn BusConnection>) -> Self {
        Self { bus }
    }
}

impl From<BusCallError> for DirectoryError {
    fn from(err: BusCallError) -> Self {
        match err {
            BusCallError::Send(msg) => DirectoryError::Transport(msg),
            BusCallError::Reply(reply) => DirectoryError::Remote {
                name: reply.name,
                message: reply.message,
            },
        }
    }
}

#[async_trait]
impl ServiceDirectory for BusServiceDirectory {
    async fn discover_service_handles(
        &self,
        adapter: &str,
        remote: BdAddr,
        service: ServiceRequestType,
    ) -> Result<Vec<u32>, DirectoryError> {
        let call = MethodCall::new(adapter, ADAPTER_INTERFACE, GET_REMOTE_SERVICE_HANDLES)
            .arg(remote.to_string())
            .arg(service.uuid128());
        let body = self.bus.call(call).await?;
        Args::new(&body)
            .uint32_array(0)
            .map(<[u32]>::to_vec)
            .map_err(|e| DirectoryError::MalformedReply(e.to_string()))
    }

    async fn fetch_service_record(
        &self,
        adapter: &str,
        remote: BdAddr,
        handle: u32,
    ) -> Result<Vec<u8>, DirectoryError> {
        let call = MethodCall::new(adapter, ADAPTER_INTERFACE, GET_REMOTE_SERVICE_RECORD)
            .arg(remote.to_string())
            .arg(handle);
        let body = self.bus.call(call).await?;
        Args::new(&body)
            .bytes(0)
            .map(<[u8]>::to_vec)
            .map_err(|e| DirectoryError::MalformedReply(e.to_string()))
    }
}

/// Resolves local addresses against the configured adapter list.
///
/// The wildcard address picks the first adapter.  Any other address picks
/// the adapter configured with that address.
#[derive(Debug, Clone, Default)]
pub struct ConfiguredAdapters {
    adapters: Vec<AdapterEntry>,
}

impl ConfiguredAdapters {
    pub fn new(adapters: Vec<AdapterEntry>) -> Self {
        Self { adapters }
    }
}

impl AdapterResolver for ConfiguredAdapters {
    fn resolve(&self, local: BdAddr) -> Option<String> {
        let entry = if local.is_any() {
            self.adapters.first()
        } else {
            self.adapters.iter().find(|a| a.address == Some(local))
        };
        entry.map(|a| adapter_path(a.index))
    }
}
