//! RequestDispatcher: routes calls on the management endpoint.
//!
//! Every call the dispatcher handles resolves exactly once.  The five
//! synchronous methods resolve here, in [`Dispatch::Reply`].
//! `CreateConnection` resolves later: the dispatcher validates it, reserves a
//! connection path and returns [`Dispatch::Negotiate`], and the coordinating
//! task finishes it through [`RequestDispatcher::complete_negotiation`].
//!
//! # Architecture
//!
//! The dispatcher owns no state.  [`ManagerState`] is passed in by the
//! coordinating task on every call, which keeps every registry mutation on
//! that one task.  Object attachment and signal emission go through injected
//! traits, so the whole module runs under unit tests without a bus.

use std::sync::Arc;

use pan_core::{
    server_path, BdAddr, ManagerError, ManagerMethod, ManagerSignal, MethodCall,
    ServiceRequestType, Value, NETWORK_MANAGER_INTERFACE, NETWORK_PATH,
};
use tracing::{debug, error, info};

use super::collaborators::{ConnectionObjects, ServerObjects};
use super::negotiate::{NegotiationFailure, NegotiationRequest, NegotiationStage, ServiceRecord};
use super::registry::ObjectKind;
use super::state::ManagerState;

/// Receives lifecycle notifications.
///
/// Infrastructure forwards them to the bus; tests record them.
pub trait SignalSink: Send + Sync {
    fn emit(&self, signal: ManagerSignal);
}

/// What the coordinating task must do with a call.
#[derive(Debug, PartialEq, Eq)]
pub enum Dispatch {
    /// Reply to the caller now.
    Reply(Result<Vec<Value>, ManagerError>),
    /// Start a negotiation; the caller is answered when it completes.
    Negotiate(NegotiationRequest),
    /// Not ours to answer.
    Unhandled,
}

/// Routes management calls onto the registry and collaborators.
pub struct RequestDispatcher {
    servers: Arc<dyn ServerObjects>,
    connections: Arc<dyn ConnectionObjects>,
    signals: Arc<dyn SignalSink>,
}

impl RequestDispatcher {
    pub fn new(
        servers: Arc<dyn ServerObjects>,
        connections: Arc<dyn ConnectionObjects>,
        signals: Arc<dyn SignalSink>,
    ) -> Self {
        Self {
            servers,
            connections,
            signals,
        }
    }

    /// Handles one inbound call.
    pub fn dispatch(&self, state: &mut ManagerState, call: &MethodCall) -> Dispatch {
        if call.path != NETWORK_PATH {
            debug!(path = %call.path, "call below the management endpoint");
            return Dispatch::Reply(Err(ManagerError::UnknownObject(call.path.clone())));
        }
        if call.interface != NETWORK_MANAGER_INTERFACE {
            return Dispatch::Unhandled;
        }
        let Some(method) = ManagerMethod::from_member(&call.member) else {
            return Dispatch::Unhandled;
        };

        debug!(method = method.member(), "dispatching");
        match method {
            ManagerMethod::ListServers => {
                Dispatch::Reply(Ok(list_reply(state, ObjectKind::Server)))
            }
            ManagerMethod::ListConnections => {
                Dispatch::Reply(Ok(list_reply(state, ObjectKind::Connection)))
            }
            ManagerMethod::CreateServer => Dispatch::Reply(self.create_server(state, call)),
            ManagerMethod::RemoveServer => {
                Dispatch::Reply(self.remove(state, call, ObjectKind::Server))
            }
            ManagerMethod::RemoveConnection => {
                Dispatch::Reply(self.remove(state, call, ObjectKind::Connection))
            }
            ManagerMethod::CreateConnection => match begin_connection(state, call) {
                Ok(request) => Dispatch::Negotiate(request),
                Err(e) => Dispatch::Reply(Err(e)),
            },
        }
    }

    fn create_server(
        &self,
        state: &mut ManagerState,
        call: &MethodCall,
    ) -> Result<Vec<Value>, ManagerError> {
        let label = string_arg(call, ManagerMethod::CreateServer, 0)?;
        let service = parse_service(label)?;
        let path = server_path(service);

        if state.registry.contains(ObjectKind::Server, &path) {
            debug!(%path, "server already registered");
            return Ok(vec![Value::Str(path)]);
        }

        self.servers.attach(&path, service).map_err(|e| {
            error!(%path, "unable to attach server object: {e}");
            ManagerError::RegistrationFailed("D-Bus path registration failed".to_string())
        })?;
        state.registry.register(ObjectKind::Server, &path);

        info!(%path, %service, "server created");
        self.signals.emit(ManagerSignal::ServerCreated(path.clone()));
        Ok(vec![Value::Str(path)])
    }

    fn remove(
        &self,
        state: &mut ManagerState,
        call: &MethodCall,
        kind: ObjectKind,
    ) -> Result<Vec<Value>, ManagerError> {
        let method = match kind {
            ObjectKind::Server => ManagerMethod::RemoveServer,
            ObjectKind::Connection => ManagerMethod::RemoveConnection,
        };
        let path = string_arg(call, method, 0)?;
        self.release(state, kind, path)?;
        Ok(Vec::new())
    }

    /// Takes back a connection whose caller never received the reply.
    ///
    /// Observers saw `ConnectionCreated`, so `ConnectionRemoved` follows.
    pub fn retract_connection(&self, state: &mut ManagerState, path: &str) {
        if let Err(e) = self.release(state, ObjectKind::Connection, path) {
            debug!(%path, "nothing to retract: {e}");
        }
    }

    /// Unregisters `path`, detaches its object and signals the removal.
    fn release(
        &self,
        state: &mut ManagerState,
        kind: ObjectKind,
        path: &str,
    ) -> Result<(), ManagerError> {
        state
            .registry
            .unregister(kind, path)
            .map_err(|_| ManagerError::NotFound("Path doesn't exist".to_string()))?;

        let detached = match kind {
            ObjectKind::Server => self.servers.detach(path),
            ObjectKind::Connection => self.connections.detach(path),
        };
        if let Err(e) = detached {
            error!(%path, "unable to detach object: {e}");
        }

        info!(%path, ?kind, "object removed");
        self.signals.emit(match kind {
            ObjectKind::Server => ManagerSignal::ServerRemoved(path.to_string()),
            ObjectKind::Connection => ManagerSignal::ConnectionRemoved(path.to_string()),
        });
        Ok(())
    }

    /// Finishes a `CreateConnection` call once its lookups have run.
    ///
    /// On success the connection object is attached, its path registered and
    /// `ConnectionCreated` emitted before the path is returned.  On failure
    /// nothing is registered.
    pub fn complete_negotiation(
        &self,
        state: &mut ManagerState,
        request: &NegotiationRequest,
        outcome: Result<ServiceRecord, NegotiationFailure>,
    ) -> Result<Vec<Value>, ManagerError> {
        let record = outcome.map_err(ManagerError::from)?;
        let path = &request.candidate_path;

        self.connections
            .attach(path, request.remote, request.service)
            .map_err(|e| {
                error!(
                    id = %request.id,
                    stage = ?NegotiationStage::Validated,
                    %path,
                    "unable to attach connection object: {e}"
                );
                ManagerError::from(NegotiationFailure::RegistrationFailed(
                    "D-Bus path registration failed".to_string(),
                ))
            })?;

        if !state.registry.register(ObjectKind::Connection, path) {
            // Counter-allocated paths never collide; undo the attach anyway.
            if let Err(e) = self.connections.detach(path) {
                error!(%path, "unable to detach connection object: {e}");
            }
            return Err(ManagerError::RegistrationFailed(format!(
                "{path} is already registered"
            )));
        }

        info!(
            id = %request.id,
            stage = ?NegotiationStage::Registered,
            %path,
            remote = %request.remote,
            service = %request.service,
            handle = format_args!("{:#x}", record.handle),
            "connection created"
        );
        self.signals
            .emit(ManagerSignal::ConnectionCreated(path.clone()));
        Ok(vec![Value::Str(path.clone())])
    }

    /// Detaches every registered object and empties the registry.
    ///
    /// Used at manager stop; no removal signals are emitted.
    pub fn release_all(&self, state: &mut ManagerState) {
        for path in state.registry.list(ObjectKind::Server) {
            if let Err(e) = self.servers.detach(path) {
                error!(%path, "can't detach server object: {e}");
            }
        }
        for path in state.registry.list(ObjectKind::Connection) {
            if let Err(e) = self.connections.detach(path) {
                error!(%path, "can't detach connection object: {e}");
            }
        }
        state.registry.clear();
    }
}

fn list_reply(state: &ManagerState, kind: ObjectKind) -> Vec<Value> {
    vec![Value::StrArray(state.registry.list(kind).to_vec())]
}

fn string_arg(call: &MethodCall, method: ManagerMethod, index: usize) -> Result<&str, ManagerError> {
    call.args().string(index).map_err(|e| {
        ManagerError::InvalidArguments(format!(
            "{} expects signature \"{}\": {e}",
            method.member(),
            method.signature()
        ))
    })
}

fn parse_service(label: &str) -> Result<ServiceRequestType, ManagerError> {
    label
        .parse()
        .map_err(|e: pan_core::ServiceParseError| ManagerError::InvalidArguments(e.to_string()))
}

fn begin_connection(
    state: &mut ManagerState,
    call: &MethodCall,
) -> Result<NegotiationRequest, ManagerError> {
    let address = string_arg(call, ManagerMethod::CreateConnection, 0)?;
    let label = string_arg(call, ManagerMethod::CreateConnection, 1)?;

    let remote: BdAddr = address
        .parse()
        .map_err(|e: pan_core::AddressParseError| ManagerError::InvalidArguments(e.to_string()))?;
    let service = parse_service(label)?;

    let request = NegotiationRequest::new(remote, service, state.allocate_connection_path());
    debug!(id = %request.id, %remote, %service, path = %request.candidate_path, "negotiation requested");
    Ok(request)
}

// ── Tests ─────────────────────────────────────────────────────────────────────
