//! A stand-in adapter endpoint that answers service lookups from a fixed
//! table of peers.
//!
//! Used by the binary when no real adapter is present and by the integration
//! tests.  Behaviour per lookup:
//!
//! - unknown peer: `org.bluez.Error.ConnectionAttemptFailed` ("Host is down")
//! - peer without the requested service: an empty handle list
//! - peer with the service: one handle, `0x10000 | service id`
//! - record for a handle the peer does not own: `org.bluez.Error.DoesNotExist`
//!
//! Records are a minimal SDP attribute list holding only the
//! ServiceClassIDList attribute (`0x0001`) with the service's 16-bit UUID.

use std::collections::HashMap;

use async_trait::async_trait;
use pan_core::{
    BdAddr, BusError, CallResponse, ManagerError, MethodCall, PanRole, Value, ADAPTER_INTERFACE,
};
use tracing::debug;

use super::{GET_REMOTE_SERVICE_HANDLES, GET_REMOTE_SERVICE_RECORD};
use crate::infrastructure::bus::ObjectHandler;

/// Base added to a service id to form its record handle.
const HANDLE_BASE: u32 = 0x10000;

/// Adapter endpoint backed by a peer table.
#[derive(Debug, Clone, Default)]
pub struct SimulatedAdapter {
    peers: HashMap<BdAddr, Vec<PanRole>>,
}

impl SimulatedAdapter {
    pub fn new(peers: impl IntoIterator<Item = (BdAddr, Vec<PanRole>)>) -> Self {
        Self {
            peers: peers.into_iter().collect(),
        }
    }

    fn peer(&self, address: &str) -> Result<(BdAddr, &[PanRole]), BusError> {
        let remote: BdAddr = address
            .parse()
            .map_err(|e: pan_core::AddressParseError| {
                BusError::new(ManagerError::INVALID_ARGUMENTS, e.to_string())
            })?;
        self.peers
            .get(&remote)
            .map(|roles| (remote, roles.as_slice()))
            .ok_or_else(|| BusError::new(ManagerError::CONNECTION_ATTEMPT_FAILED, "Host is down"))
    }

    fn service_handles(&self, call: &MethodCall) -> Result<Vec<Value>, BusError> {
        let args = call.args();
        let address = args.string(0).map_err(invalid)?;
        let uuid = args.string(1).map_err(invalid)?;
        let (remote, roles) = self.peer(address)?;

        let handles: Vec<u32> = PanRole::from_label(uuid)
            .filter(|role| roles.contains(role))
            .map(|role| HANDLE_BASE | u32::from(role.id()))
            .into_iter()
            .collect();
        debug!(%remote, %uuid, ?handles, "service handles requested");
        Ok(vec![Value::U32Array(handles)])
    }

    fn service_record(&self, call: &MethodCall) -> Result<Vec<Value>, BusError> {
        let args = call.args();
        let address = args.string(0).map_err(invalid)?;
        let handle = args.uint32(1).map_err(invalid)?;
        let (remote, roles) = self.peer(address)?;

        let role = (handle & !0xFFFF == HANDLE_BASE)
            .then(|| u16::try_from(handle & 0xFFFF).ok())
            .flatten()
            .and_then(PanRole::from_id)
            .filter(|role| roles.contains(role))
            .ok_or_else(|| {
                BusError::new(
                    ManagerError::DOES_NOT_EXIST,
                    format!("No service record with handle {handle:#x}"),
                )
            })?;
        debug!(%remote, handle = format_args!("{handle:#x}"), %role, "service record requested");
        Ok(vec![Value::Bytes(service_class_record(role.id()))])
    }
}

fn invalid(err: pan_core::ArgError) -> BusError {
    BusError::new(ManagerError::INVALID_ARGUMENTS, err.to_string())
}

/// SDP attribute list: `{ 0x0001: { uuid16 } }`.
fn service_class_record(uuid16: u16) -> Vec<u8> {
    let [hi, lo] = uuid16.to_be_bytes();
    vec![
        0x35, 0x08, // sequence, 8 bytes
        0x09, 0x00, 0x01, // attribute id 0x0001
        0x35, 0x03, // sequence, 3 bytes
        0x19, hi, lo, // uuid16
    ]
}

#[async_trait]
impl ObjectHandler for SimulatedAdapter {
    async fn handle(&self, call: MethodCall) -> CallResponse {
        if call.interface != ADAPTER_INTERFACE {
            return CallResponse::NotHandled;
        }
        let result = match call.member.as_str() {
            GET_REMOTE_SERVICE_HANDLES => self.service_handles(&call),
            GET_REMOTE_SERVICE_RECORD => self.service_record(&call),
            _ => return CallResponse::NotHandled,
        };
        match result {
            Ok(body) => CallResponse::Return(body),
            Err(err) => CallResponse::Error(err),
        }
    }
}
