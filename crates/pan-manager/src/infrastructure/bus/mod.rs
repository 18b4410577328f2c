//! Message-bus seam.
//!
//! The manager reaches the bus only through [`BusConnection`]: it registers
//! its endpoint, issues outbound calls to adapters, and broadcasts lifecycle
//! signals.  Objects on the bus implement [`ObjectHandler`].
//!
//! The workspace ships one implementation, [`loopback::LoopbackBus`], which
//! routes calls between handlers inside the process.

pub mod loopback;

use std::sync::Arc;

use async_trait::async_trait;
use pan_core::{BusError, CallResponse, ManagerSignal, MethodCall, Signal, Value};
use thiserror::Error;
use tokio::sync::broadcast;
use tracing::warn;

use crate::application::dispatch::SignalSink;

/// Error returned by [`BusConnection::call`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BusCallError {
    /// The call could not be sent (bus closed, connection lost).
    #[error("send failed: {0}")]
    Send(String),
    /// The target answered with an error reply.
    #[error("error reply: {0}")]
    Reply(BusError),
}

impl BusCallError {
    /// The error as a caller on the bus would see it.
    pub fn into_bus_error(self) -> BusError {
        match self {
            BusCallError::Send(msg) => BusError::new(BusError::DISCONNECTED, msg),
            BusCallError::Reply(err) => err,
        }
    }
}

/// An object that answers calls addressed to its path.
#[async_trait]
pub trait ObjectHandler: Send + Sync {
    async fn handle(&self, call: MethodCall) -> CallResponse;
}

/// A connection to the message bus.
#[async_trait]
pub trait BusConnection: Send + Sync {
    /// Sends `call` and waits for its reply.
    ///
    /// # Errors
    ///
    /// [`BusCallError::Send`] if the call could not be delivered,
    /// [`BusCallError::Reply`] for an error reply, including the transport's
    /// own `NoReply` timeout.
    async fn call(&self, call: MethodCall) -> Result<Vec<Value>, BusCallError>;

    /// Registers `handler` for exactly `path`.
    fn register_object(&self, path: &str, handler: Arc<dyn ObjectHandler>)
        -> Result<(), BusError>;

    /// Registers `handler` for `path` and every path beneath it.
    fn register_fallback(
        &self,
        path: &str,
        handler: Arc<dyn ObjectHandler>,
    ) -> Result<(), BusError>;

    /// Removes whichever registration owns `path`.
    fn unregister_object_path(&self, path: &str) -> Result<(), BusError>;

    fn emit_signal(&self, signal: Signal) -> Result<(), BusCallError>;

    /// Receives every signal emitted after this call.
    fn subscribe_signals(&self) -> broadcast::Receiver<Signal>;
}

/// Forwards lifecycle notifications onto the bus.
pub struct BusSignals {
    bus: Arc<dyn BusConnection>,
}

impl BusSignals {
    pub fn new(bus: Arc<dyn BusConnection>) -> Self {
        Self { bus }
    }
}

impl SignalSink for BusSignals {
    fn emit(&self, signal: ManagerSignal) {
        let member = signal.member();
        if let Err(e) = self.bus.emit_signal(signal.into_signal()) {
            warn!(signal = member, "unable to emit signal: {e}");
        }
    }
}
