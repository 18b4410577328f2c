//! In-process message bus.
//!
//! # Routing
//!
//! A call is delivered to the handler registered for exactly its path.  If
//! there is none, it goes to the fallback registration with the longest
//! prefix covering the path (`/org/bluez/network` covers
//! `/org/bluez/network/connection0`, but not `/org/bluez/networkX`).  If
//! nothing covers the path the caller gets `UnknownObject`.
//!
//! The handler runs on the caller's task.  A handler answering
//! [`CallResponse::NotHandled`] produces `UnknownMethod`; a handler that takes
//! longer than the call timeout produces `NoReply`.
//!
//! # Signals
//!
//! Signals fan out over a `tokio::sync::broadcast` channel.  A subscriber
//! that falls behind by more than [`SIGNAL_CAPACITY`] signals loses the
//! oldest ones.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use pan_core::{BusError, MethodCall, Signal, Value};
use tokio::sync::broadcast;
use tracing::{debug, trace};

use super::{BusCallError, BusConnection, ObjectHandler};

/// Default per-call timeout, matching the usual D-Bus reply timeout.
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(25);

/// Buffered signals per subscriber.
pub const SIGNAL_CAPACITY: usize = 64;

#[derive(Clone)]
struct Registration {
    handler: Arc<dyn ObjectHandler>,
    fallback: bool,
}

/// A message bus that lives entirely inside the process.
pub struct LoopbackBus {
    registrations: Mutex<HashMap<String, Registration>>,
    signals: broadcast::Sender<Signal>,
    call_timeout: Duration,
    closed: AtomicBool,
}

impl LoopbackBus {
    pub fn new() -> Self {
        Self::with_call_timeout(DEFAULT_CALL_TIMEOUT)
    }

    pub fn with_call_timeout(call_timeout: Duration) -> Self {
        let (signals, _) = broadcast::channel(SIGNAL_CAPACITY);
        Self {
            registrations: Mutex::new(HashMap::new()),
            signals,
            call_timeout,
            closed: AtomicBool::new(false),
        }
    }

    /// Refuses every further call and signal.
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Number of live registrations.
    pub fn registration_count(&self) -> usize {
        self.lock().len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, Registration>> {
        // A poisoned map is still structurally valid.
        self.registrations
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn route(&self, path: &str) -> Option<Arc<dyn ObjectHandler>> {
        let registrations = self.lock();
        if let Some(reg) = registrations.get(path) {
            return Some(reg.handler.clone());
        }
        registrations
            .iter()
            .filter(|(prefix, reg)| reg.fallback && covers(prefix, path))
            .max_by_key(|(prefix, _)| prefix.len())
            .map(|(_, reg)| reg.handler.clone())
    }

    fn register(
        &self,
        path: &str,
        handler: Arc<dyn ObjectHandler>,
        fallback: bool,
    ) -> Result<(), BusError> {
        let mut registrations = self.lock();
        if registrations.contains_key(path) {
            return Err(BusError::new(
                BusError::OBJECT_PATH_IN_USE,
                format!("An object is already exported for the path {path}"),
            ));
        }
        registrations.insert(path.to_string(), Registration { handler, fallback });
        debug!(%path, fallback, "object registered");
        Ok(())
    }
}

impl Default for LoopbackBus {
    fn default() -> Self {
        Self::new()
    }
}

/// Returns `true` if a fallback at `prefix` receives calls for `path`.
fn covers(prefix: &str, path: &str) -> bool {
    if prefix == "/" {
        return true;
    }
    match path.strip_prefix(prefix) {
        Some(rest) => rest.is_empty() || rest.starts_with('/'),
        None => false,
    }
}

#[async_trait]
impl BusConnection for LoopbackBus {
    async fn call(&self, call: MethodCall) -> Result<Vec<Value>, BusCallError> {
        if self.is_closed() {
            return Err(BusCallError::Send("bus connection is closed".to_string()));
        }

        let Some(handler) = self.route(&call.path) else {
            return Err(BusCallError::Reply(BusError::new(
                BusError::UNKNOWN_OBJECT,
                format!("No such object path '{}'", call.path),
            )));
        };

        trace!(%call, "delivering call");
        match tokio::time::timeout(self.call_timeout, handler.handle(call)).await {
            Ok(response) => response.into_result().map_err(BusCallError::Reply),
            Err(_) => Err(BusCallError::Reply(BusError::new(
                BusError::NO_REPLY,
                "Did not receive a reply",
            ))),
        }
    }

    fn register_object(
        &self,
        path: &str,
        handler: Arc<dyn ObjectHandler>,
    ) -> Result<(), BusError> {
        self.register(path, handler, false)
    }

    fn register_fallback(
        &self,
        path: &str,
        handler: Arc<dyn ObjectHandler>,
    ) -> Result<(), BusError> {
        self.register(path, handler, true)
    }

    fn unregister_object_path(&self, path: &str) -> Result<(), BusError> {
        match self.lock().remove(path) {
            Some(_) => {
                debug!(%path, "object unregistered");
                Ok(())
            }
            None => Err(BusError::new(
                BusError::UNKNOWN_OBJECT,
                format!("No object registered at {path}"),
            )),
        }
    }

    fn emit_signal(&self, signal: Signal) -> Result<(), BusCallError> {
        if self.is_closed() {
            return Err(BusCallError::Send("bus connection is closed".to_string()));
        }
        // No subscribers is not an error.
        let _ = self.signals.send(signal);
        Ok(())
    }

    fn subscribe_signals(&self) -> broadcast::Receiver<Signal> {
        self.signals.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pan_core::CallResponse;

    // ── Test doubles ──────────────────────────────────────────────────────────

    /// Replies with a fixed tag so tests can tell handlers apart.
    struct Tagged(&'static str);

    #[async_trait]
    impl ObjectHandler for Tagged {
        async fn handle(&self, call: MethodCall) -> CallResponse {
            if call.member == "Unknown" {
                return CallResponse::NotHandled;
            }
            CallResponse::Return(vec![Value::Str(self.0.to_string())])
        }
    }

    struct Stalled;

    #[async_trait]
    impl ObjectHandler for Stalled {
        async fn handle(&self, _call: MethodCall) -> CallResponse {
            std::future::pending::<CallResponse>().await
        }
    }

    fn call(path: &str, member: &str) -> MethodCall {
        MethodCall::new(path, "org.example.Test", member)
    }

    fn reply_error(result: Result<Vec<Value>, BusCallError>) -> BusError {
        match result {
            Err(BusCallError::Reply(err)) => err,
            other => panic!("expected an error reply, got {other:?}"),
        }
    }

    // ── Routing ───────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn test_exact_registration_wins_over_fallback() {
        let bus = LoopbackBus::new();
        bus.register_fallback("/a", Arc::new(Tagged("fallback"))).unwrap();
        bus.register_object("/a/b", Arc::new(Tagged("exact"))).unwrap();

        let reply = bus.call(call("/a/b", "Get")).await.unwrap();

        assert_eq!(reply, vec![Value::Str("exact".into())]);
    }

    #[tokio::test]
    async fn test_longest_fallback_prefix_wins() {
        let bus = LoopbackBus::new();
        bus.register_fallback("/a", Arc::new(Tagged("short"))).unwrap();
        bus.register_fallback("/a/b", Arc::new(Tagged("long"))).unwrap();

        let deep = bus.call(call("/a/b/c", "Get")).await.unwrap();
        let shallow = bus.call(call("/a/x", "Get")).await.unwrap();

        assert_eq!(deep, vec![Value::Str("long".into())]);
        assert_eq!(shallow, vec![Value::Str("short".into())]);
    }

    #[tokio::test]
    async fn test_fallback_does_not_cover_sibling_with_shared_prefix() {
        let bus = LoopbackBus::new();
        bus.register_fallback("/org/bluez/network", Arc::new(Tagged("m"))).unwrap();

        let err = reply_error(bus.call(call("/org/bluez/networkX", "Get")).await);

        assert!(err.has_name(BusError::UNKNOWN_OBJECT));
    }

    #[tokio::test]
    async fn test_exact_registration_does_not_cover_children() {
        let bus = LoopbackBus::new();
        bus.register_object("/a", Arc::new(Tagged("a"))).unwrap();

        let err = reply_error(bus.call(call("/a/b", "Get")).await);

        assert!(err.has_name(BusError::UNKNOWN_OBJECT));
    }

    #[tokio::test]
    async fn test_not_handled_becomes_unknown_method() {
        let bus = LoopbackBus::new();
        bus.register_object("/a", Arc::new(Tagged("a"))).unwrap();

        let err = reply_error(bus.call(call("/a", "Unknown")).await);

        assert!(err.has_name(BusError::UNKNOWN_METHOD));
    }

    #[tokio::test]
    async fn test_stalled_handler_times_out_with_no_reply() {
        let bus = LoopbackBus::with_call_timeout(Duration::from_millis(20));
        bus.register_object("/slow", Arc::new(Stalled)).unwrap();

        let err = reply_error(bus.call(call("/slow", "Get")).await);

        assert!(err.has_name(BusError::NO_REPLY));
    }

    // ── Registration ──────────────────────────────────────────────────────────

    #[test]
    fn test_double_registration_is_object_path_in_use() {
        let bus = LoopbackBus::new();
        bus.register_object("/a", Arc::new(Tagged("a"))).unwrap();

        let err = bus.register_fallback("/a", Arc::new(Tagged("b"))).unwrap_err();

        assert!(err.has_name(BusError::OBJECT_PATH_IN_USE));
        assert_eq!(bus.registration_count(), 1);
    }

    #[tokio::test]
    async fn test_unregister_removes_route() {
        let bus = LoopbackBus::new();
        bus.register_object("/a", Arc::new(Tagged("a"))).unwrap();

        bus.unregister_object_path("/a").unwrap();

        assert!(bus.unregister_object_path("/a").is_err());
        let err = reply_error(bus.call(call("/a", "Get")).await);
        assert!(err.has_name(BusError::UNKNOWN_OBJECT));
    }

    // ── Closing ───────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn test_closed_bus_refuses_calls_and_signals() {
        let bus = LoopbackBus::new();
        bus.register_object("/a", Arc::new(Tagged("a"))).unwrap();
        bus.close();

        let result = bus.call(call("/a", "Get")).await;
        let signal = bus.emit_signal(Signal {
            path: "/a".into(),
            interface: "org.example.Test".into(),
            member: "Changed".into(),
            args: Vec::new(),
        });

        assert!(matches!(result, Err(BusCallError::Send(_))));
        assert!(matches!(signal, Err(BusCallError::Send(_))));
    }

    // ── Signals ───────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn test_signals_reach_every_subscriber() {
        let bus = LoopbackBus::new();
        let mut first = bus.subscribe_signals();
        let mut second = bus.subscribe_signals();
        let signal = Signal {
            path: "/a".into(),
            interface: "org.example.Test".into(),
            member: "Changed".into(),
            args: vec![Value::U32(1)],
        };

        bus.emit_signal(signal.clone()).unwrap();

        assert_eq!(first.recv().await.unwrap(), signal);
        assert_eq!(second.recv().await.unwrap(), signal);
    }

    #[test]
    fn test_signal_without_subscribers_is_not_an_error() {
        let bus = LoopbackBus::new();
        let result = bus.emit_signal(Signal {
            path: "/a".into(),
            interface: "i".into(),
            member: "m".into(),
            args: Vec::new(),
        });
        assert!(result.is_ok());
    }
}
