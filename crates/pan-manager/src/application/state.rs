//! ManagerState: the single owned context behind the management endpoint.

use pan_core::{connection_path, BdAddr};

use super::registry::ObjectRegistry;

/// Process-wide manager state.
///
/// Created once when the manager starts and dropped when it stops.  It is
/// threaded explicitly through the dispatcher; there is no global instance.
#[derive(Debug)]
pub struct ManagerState {
    /// Local adapter identity used to route outbound negotiation requests.
    pub local_address: BdAddr,
    /// Registered server and connection paths.
    pub registry: ObjectRegistry,
    next_connection_id: u64,
}

impl ManagerState {
    pub fn new(local_address: BdAddr) -> Self {
        Self {
            local_address,
            registry: ObjectRegistry::new(),
            next_connection_id: 0,
        }
    }

    /// Reserves a fresh connection path.
    ///
    /// The counter only moves forward for the lifetime of this state, so two
    /// reservations never return the same path even if the first one was
    /// never registered.  It is 64 bits wide and cannot wrap in practice.
    pub fn allocate_connection_path(&mut self) -> String {
        let path = connection_path(self.next_connection_id);
        self.next_connection_id += 1;
        path
    }
}
