//! NetworkManager: lifecycle and coordinating task of the management endpoint.
//!
//! # Architecture
//!
//! ```text
//!  bus call ──► ManagerEndpoint ──mpsc──► Coordinator (one task)
//!                    ▲                     │ owns ManagerState + RequestDispatcher
//!                    │ oneshot reply       │
//!                    └─────────────────────┤ Dispatch::Reply ─► reply now
//!                                          │ Dispatch::Negotiate ─► JoinSet::spawn
//!                                          │        negotiation task: handles, record
//!                                          │◄── join_next(): complete_negotiation, reply
//!                                          │◄── shutdown: abort all, release all, kill sessions
//! ```
//!
//! Only the coordinator touches the registry, so registry mutations are
//! serialised without a lock.  Negotiation tasks run concurrently with each
//! other and with synchronous calls; whichever finishes first is completed
//! first.  A negotiation whose caller has stopped waiting is discarded, so
//! every `CreateConnection` either registers its path and answers the caller
//! or registers nothing.
//!
//! # Shutdown
//!
//! [`NetworkManager::stop`] unregisters the endpoint, then tells the
//! coordinator to stop.  In-flight negotiations are aborted; their callers'
//! reply channels are dropped unanswered, which callers observe as
//! `NoReply`.  Nothing an aborted negotiation would have registered is ever
//! registered.  Finally the bridge and session modules are torn down.

use std::sync::Arc;

use async_trait::async_trait;
use pan_core::{BdAddr, BusError, CallResponse, ManagerError, MethodCall, Signal, Value, NETWORK_PATH};
use thiserror::Error;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, error, info, warn};

use crate::application::collaborators::{
    BridgeControl, CollaboratorError, ConnectionObjects, LinkSessions, ServerObjects,
};
use crate::application::dispatch::{Dispatch, RequestDispatcher};
use crate::application::negotiate::{
    AdapterResolver, NegotiationFailure, NegotiationRequest, Negotiator, ServiceDirectory,
    ServiceRecord,
};
use crate::application::state::ManagerState;
use crate::infrastructure::bus::{BusConnection, BusSignals, ObjectHandler};

/// Inbound calls queued for the coordinator.
const COMMAND_QUEUE: usize = 64;

/// Error raised while starting the manager.
///
/// Whatever had been initialised before the failure has been torn down
/// again by the time this is returned.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("can't initialise bridge module: {0}")]
    BridgeInit(#[source] CollaboratorError),

    #[error("can't create bridge {name}: {source}")]
    BridgeCreate {
        name: String,
        #[source]
        source: CollaboratorError,
    },

    #[error("can't initialise link session module: {0}")]
    SessionsInit(#[source] CollaboratorError),

    #[error("can't register {path} on the bus: {source}")]
    Register {
        path: String,
        #[source]
        source: BusError,
    },
}

/// Settings the manager is started with.
#[derive(Debug, Clone)]
pub struct ManagerSettings {
    pub local_address: BdAddr,
    pub bridge_name: String,
}

impl Default for ManagerSettings {
    fn default() -> Self {
        Self {
            local_address: BdAddr::ANY,
            bridge_name: "pan0".to_string(),
        }
    }
}

/// Everything the manager drives.
#[derive(Clone)]
pub struct ManagerDeps {
    pub bus: Arc<dyn BusConnection>,
    pub bridge: Arc<dyn BridgeControl>,
    pub sessions: Arc<dyn LinkSessions>,
    pub servers: Arc<dyn ServerObjects>,
    pub connections: Arc<dyn ConnectionObjects>,
    pub resolver: Arc<dyn AdapterResolver>,
    pub directory: Arc<dyn ServiceDirectory>,
}

/// The caller's half of a pending call.
type PendingReply = oneshot::Sender<CallResponse>;

enum Command {
    Call { call: MethodCall, reply: PendingReply },
}

/// Sends calls straight to the coordinator, bypassing the bus.
#[derive(Clone)]
pub struct ManagerHandle {
    commands: mpsc::Sender<Command>,
}

impl ManagerHandle {
    /// Submits `call` and waits for its answer.
    ///
    /// A call abandoned by shutdown resolves to a `NoReply` error.
    pub async fn call(&self, call: MethodCall) -> CallResponse {
        let (reply, answer) = oneshot::channel();
        if self.commands.send(Command::Call { call, reply }).await.is_err() {
            return CallResponse::Error(BusError::new(
                BusError::UNKNOWN_OBJECT,
                "network manager is not running",
            ));
        }
        answer.await.unwrap_or_else(|_| {
            CallResponse::Error(BusError::new(
                BusError::NO_REPLY,
                "Call was abandoned before a reply was sent",
            ))
        })
    }
}

/// Bus-side face of the management endpoint.
struct ManagerEndpoint {
    handle: ManagerHandle,
}

#[async_trait]
impl ObjectHandler for ManagerEndpoint {
    async fn handle(&self, call: MethodCall) -> CallResponse {
        self.handle.call(call).await
    }
}

struct NegotiationOutcome {
    request: NegotiationRequest,
    caller: PendingReply,
    result: Result<ServiceRecord, NegotiationFailure>,
}

struct Coordinator {
    state: ManagerState,
    dispatcher: RequestDispatcher,
    negotiator: Arc<Negotiator>,
    sessions: Arc<dyn LinkSessions>,
    commands: mpsc::Receiver<Command>,
    shutdown: oneshot::Receiver<()>,
    in_flight: JoinSet<NegotiationOutcome>,
}

fn to_response(result: Result<Vec<Value>, ManagerError>) -> CallResponse {
    match result {
        Ok(body) => CallResponse::Return(body),
        Err(err) => CallResponse::Error(err.into()),
    }
}

impl Coordinator {
    async fn run(mut self) {
        loop {
            tokio::select! {
                _ = &mut self.shutdown => break,
                Some(joined) = self.in_flight.join_next() => match joined {
                    Ok(outcome) => self.finish(outcome),
                    Err(e) if e.is_cancelled() => {}
                    Err(e) => error!("negotiation task failed: {e}"),
                },
                command = self.commands.recv() => match command {
                    Some(Command::Call { call, reply }) => self.handle_call(call, reply),
                    None => break,
                },
            }
        }
        self.shut_down().await;
    }

    fn handle_call(&mut self, call: MethodCall, reply: PendingReply) {
        match self.dispatcher.dispatch(&mut self.state, &call) {
            Dispatch::Reply(result) => {
                let _ = reply.send(to_response(result));
            }
            Dispatch::Unhandled => {
                let _ = reply.send(CallResponse::NotHandled);
            }
            Dispatch::Negotiate(request) => {
                let negotiator = Arc::clone(&self.negotiator);
                let local = self.state.local_address;
                self.in_flight.spawn(async move {
                    let result = negotiator.negotiate(local, &request).await;
                    NegotiationOutcome {
                        request,
                        caller: reply,
                        result,
                    }
                });
            }
        }
    }

    /// Resolves a finished negotiation.
    ///
    /// A caller that stopped waiting (bus timeout) gets nothing registered
    /// on its behalf: the outcome is dropped before the hand-off, and a
    /// connection registered just as the caller left is taken back.
    fn finish(&mut self, outcome: NegotiationOutcome) {
        let NegotiationOutcome {
            request,
            caller,
            result,
        } = outcome;
        if caller.is_closed() {
            warn!(
                id = %request.id,
                path = %request.candidate_path,
                "caller went away during negotiation; outcome discarded"
            );
            return;
        }

        let result = self
            .dispatcher
            .complete_negotiation(&mut self.state, &request, result);
        let registered = result.is_ok();
        if caller.send(to_response(result)).is_err() && registered {
            warn!(
                id = %request.id,
                path = %request.candidate_path,
                "caller went away before the reply; retracting connection"
            );
            self.dispatcher
                .retract_connection(&mut self.state, &request.candidate_path);
        }
    }

    async fn shut_down(mut self) {
        let abandoned = self.in_flight.len();
        self.in_flight.abort_all();
        while self.in_flight.join_next().await.is_some() {}
        if abandoned > 0 {
            info!(abandoned, "in-flight negotiations abandoned");
        }

        self.dispatcher.release_all(&mut self.state);
        self.sessions.kill_all();
        debug!("coordinator stopped");
    }
}

/// A running network manager.
pub struct NetworkManager {
    settings: ManagerSettings,
    deps: ManagerDeps,
    handle: ManagerHandle,
    shutdown: oneshot::Sender<()>,
    coordinator: JoinHandle<()>,
}

impl NetworkManager {
    /// Initialises the bridge and session modules, registers the management
    /// endpoint and starts the coordinating task.
    ///
    /// Must be called from within a tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns a [`StartupError`] naming the step that failed, after undoing
    /// every earlier step.
    pub fn start(settings: ManagerSettings, deps: ManagerDeps) -> Result<Self, StartupError> {
        deps.bridge.init().map_err(StartupError::BridgeInit)?;

        if let Err(source) = deps.bridge.create(&settings.bridge_name) {
            deps.bridge.cleanup();
            return Err(StartupError::BridgeCreate {
                name: settings.bridge_name.clone(),
                source,
            });
        }

        if let Err(e) = deps.sessions.init() {
            unwind_bridge(&deps, &settings.bridge_name);
            return Err(StartupError::SessionsInit(e));
        }

        let (commands_tx, commands_rx) = mpsc::channel(COMMAND_QUEUE);
        let handle = ManagerHandle {
            commands: commands_tx,
        };
        let endpoint = Arc::new(ManagerEndpoint {
            handle: handle.clone(),
        });
        if let Err(source) = deps.bus.register_fallback(NETWORK_PATH, endpoint) {
            deps.sessions.cleanup();
            unwind_bridge(&deps, &settings.bridge_name);
            return Err(StartupError::Register {
                path: NETWORK_PATH.to_string(),
                source,
            });
        }

        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let coordinator = Coordinator {
            state: ManagerState::new(settings.local_address),
            dispatcher: RequestDispatcher::new(
                Arc::clone(&deps.servers),
                Arc::clone(&deps.connections),
                Arc::new(BusSignals::new(Arc::clone(&deps.bus))),
            ),
            negotiator: Arc::new(Negotiator::new(
                Arc::clone(&deps.resolver),
                Arc::clone(&deps.directory),
            )),
            sessions: Arc::clone(&deps.sessions),
            commands: commands_rx,
            shutdown: shutdown_rx,
            in_flight: JoinSet::new(),
        };
        let coordinator = tokio::spawn(coordinator.run());

        info!(
            path = NETWORK_PATH,
            bridge = %settings.bridge_name,
            local = %settings.local_address,
            "network manager started"
        );
        Ok(Self {
            settings,
            deps,
            handle,
            shutdown: shutdown_tx,
            coordinator,
        })
    }

    /// A handle for calling the endpoint without going through the bus.
    pub fn handle(&self) -> ManagerHandle {
        self.handle.clone()
    }

    /// Lifecycle signals emitted from now on (along with every other signal
    /// on the bus).
    pub fn subscribe(&self) -> broadcast::Receiver<Signal> {
        self.deps.bus.subscribe_signals()
    }

    /// Stops the manager and tears down everything `start` set up.
    pub async fn stop(self) {
        if let Err(e) = self.deps.bus.unregister_object_path(NETWORK_PATH) {
            error!("can't unregister {NETWORK_PATH}: {e}");
        }

        let _ = self.shutdown.send(());
        if let Err(e) = self.coordinator.await {
            error!("coordinator task failed: {e}");
        }

        if let Err(e) = self.deps.bridge.remove(&self.settings.bridge_name) {
            error!(bridge = %self.settings.bridge_name, "can't remove bridge: {e}");
        }
        self.deps.sessions.cleanup();
        self.deps.bridge.cleanup();
        info!("network manager stopped");
    }
}

fn unwind_bridge(deps: &ManagerDeps, bridge_name: &str) {
    if let Err(e) = deps.bridge.remove(bridge_name) {
        error!(bridge = bridge_name, "can't remove bridge: {e}");
    }
    deps.bridge.cleanup();
}
