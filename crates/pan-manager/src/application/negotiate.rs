//! Remote service negotiation for `CreateConnection`.
//!
//! Before a connection object may exist, the remote device must prove it
//! actually offers the requested PAN service.  That takes two dependent
//! lookups against the remote's service directory, issued through the local
//! adapter:
//!
//! ```text
//! Start ──► HandlesRequested ──► RecordRequested ──► Validated ──► Registered
//!   │              │                    │                │
//!   └──────────────┴────────────────────┴────────────────┴──► Failed(reason)
//! ```
//!
//! | Stage              | Failure                                   | Reason               |
//! |--------------------|-------------------------------------------|----------------------|
//! | `Start`            | no local adapter for the local address    | `AdapterUnavailable` |
//! | `HandlesRequested` | connection-attempt failure, not delivered | `ConnectionFailed`   |
//! |                    | other error reply, bad reply, no handles  | `NotSupported`       |
//! | `RecordRequested`  | connection-attempt failure, not delivered | `ConnectionFailed`   |
//! |                    | other error reply, bad reply, empty record| `NotSupported`       |
//! | `Validated`        | connection object cannot be attached      | `RegistrationFailed` |
//!
//! Only the first discovered handle is pursued.  If its record cannot be
//! fetched the negotiation fails even when further handles were returned.
//!
//! [`Negotiator::negotiate`] covers `Start` through `Validated`; the last
//! step touches the registry and therefore runs on the coordinating task (see
//! `RequestDispatcher::complete_negotiation`).
//!
//! There is no timer here.  Request timeouts belong to the transport.

use std::sync::Arc;

use async_trait::async_trait;
use pan_core::{BdAddr, ManagerError, ServiceRequestType};
use thiserror::Error;
use tracing::{debug, warn};
use uuid::Uuid;

/// Error returned by a [`ServiceDirectory`] lookup.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DirectoryError {
    /// The request never reached the remote side.
    #[error("request could not be delivered: {0}")]
    Transport(String),
    /// The remote side answered with a named error.
    #[error("{name}: {message}")]
    Remote { name: String, message: String },
    /// The reply did not have the expected shape.
    #[error("malformed reply: {0}")]
    MalformedReply(String),
}

/// Outbound lookups against a remote device's service directory.
///
/// `adapter` is the local adapter endpoint chosen by an [`AdapterResolver`].
#[async_trait]
pub trait ServiceDirectory: Send + Sync {
    /// Returns the record handles of every service matching `service`.
    async fn discover_service_handles(
        &self,
        adapter: &str,
        remote: BdAddr,
        service: ServiceRequestType,
    ) -> Result<Vec<u32>, DirectoryError>;

    /// Returns the raw service record for `handle`.
    async fn fetch_service_record(
        &self,
        adapter: &str,
        remote: BdAddr,
        handle: u32,
    ) -> Result<Vec<u8>, DirectoryError>;
}

/// Picks the local adapter endpoint that issues outbound lookups.
#[cfg_attr(test, mockall::automock)]
pub trait AdapterResolver: Send + Sync {
    /// Returns the adapter endpoint path for `local`, or `None` if no adapter
    /// matches.
    fn resolve(&self, local: BdAddr) -> Option<String>;
}

/// Progress of a negotiation.
///
/// The negotiator walks `Start` to `Validated`; the dispatcher takes it to
/// `Registered` once the connection object is attached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NegotiationStage {
    Start,
    HandlesRequested,
    RecordRequested,
    Validated,
    Registered,
}

/// Terminal failure of a negotiation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NegotiationFailure {
    #[error("no local adapter for {0}")]
    AdapterUnavailable(BdAddr),
    #[error("connection attempt failed: {0}")]
    ConnectionFailed(String),
    #[error("remote service not supported: {0}")]
    NotSupported(String),
    #[error("registration failed: {0}")]
    RegistrationFailed(String),
}

impl From<NegotiationFailure> for ManagerError {
    fn from(failure: NegotiationFailure) -> Self {
        match failure {
            NegotiationFailure::AdapterUnavailable(addr) => {
                ManagerError::Unavailable(format!("Bluetooth adapter for {addr} is not available"))
            }
            NegotiationFailure::ConnectionFailed(msg) => ManagerError::ConnectionFailed(msg),
            NegotiationFailure::NotSupported(_) => ManagerError::NotSupported,
            NegotiationFailure::RegistrationFailed(msg) => ManagerError::RegistrationFailed(msg),
        }
    }
}

/// One `CreateConnection` call in flight.
///
/// The caller's pending reply travels alongside the request (see
/// `infrastructure::service`), never inside the negotiation task's logic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NegotiationRequest {
    /// Correlates log lines of one negotiation.
    pub id: Uuid,
    pub remote: BdAddr,
    pub service: ServiceRequestType,
    /// Reserved, not yet registered, connection path.
    pub candidate_path: String,
}

impl NegotiationRequest {
    pub fn new(remote: BdAddr, service: ServiceRequestType, candidate_path: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            remote,
            service,
            candidate_path,
        }
    }
}

/// A validated remote service record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceRecord {
    /// Adapter endpoint the lookups went through.
    pub adapter: String,
    pub handle: u32,
    pub bytes: Vec<u8>,
}

/// Runs the lookup part of a negotiation.
pub struct Negotiator {
    resolver: Arc<dyn AdapterResolver>,
    directory: Arc<dyn ServiceDirectory>,
}

impl Negotiator {
    pub fn new(resolver: Arc<dyn AdapterResolver>, directory: Arc<dyn ServiceDirectory>) -> Self {
        Self {
            resolver,
            directory,
        }
    }

    /// Drives `request` from `Start` to `Validated`.
    ///
    /// # Errors
    ///
    /// Returns the [`NegotiationFailure`] of the first stage that failed.
    pub async fn negotiate(
        &self,
        local: BdAddr,
        request: &NegotiationRequest,
    ) -> Result<ServiceRecord, NegotiationFailure> {
        let id = request.id;

        debug!(%id, stage = ?NegotiationStage::Start, %local);
        let adapter = self.resolver.resolve(local).ok_or_else(|| {
            warn!(%id, stage = ?NegotiationStage::Start, %local, "no adapter available for negotiation");
            NegotiationFailure::AdapterUnavailable(local)
        })?;

        debug!(%id, stage = ?NegotiationStage::HandlesRequested, %adapter, remote = %request.remote, service = %request.service);
        let handles = self
            .directory
            .discover_service_handles(&adapter, request.remote, request.service)
            .await
            .map_err(|e| fail(id, NegotiationStage::HandlesRequested, e))?;

        let Some(&handle) = handles.first() else {
            warn!(%id, remote = %request.remote, "remote returned no service handles");
            return Err(NegotiationFailure::NotSupported(
                "no matching service handles".to_string(),
            ));
        };

        debug!(%id, stage = ?NegotiationStage::RecordRequested, handle = format_args!("{handle:#x}"), candidates = handles.len());
        let bytes = self
            .directory
            .fetch_service_record(&adapter, request.remote, handle)
            .await
            .map_err(|e| fail(id, NegotiationStage::RecordRequested, e))?;

        if bytes.is_empty() {
            warn!(%id, handle, "invalid PAN service record length");
            return Err(NegotiationFailure::NotSupported(
                "empty service record".to_string(),
            ));
        }

        debug!(%id, stage = ?NegotiationStage::Validated, record_len = bytes.len());
        Ok(ServiceRecord {
            adapter,
            handle,
            bytes,
        })
    }
}

/// Classifies a lookup error.
fn classify(err: DirectoryError) -> NegotiationFailure {
    match err {
        DirectoryError::Transport(msg) => NegotiationFailure::ConnectionFailed(msg),
        DirectoryError::Remote { name, message }
            if name == ManagerError::CONNECTION_ATTEMPT_FAILED =>
        {
            NegotiationFailure::ConnectionFailed(message)
        }
        other => NegotiationFailure::NotSupported(other.to_string()),
    }
}

fn fail(id: Uuid, stage: NegotiationStage, err: DirectoryError) -> NegotiationFailure {
    warn!(%id, ?stage, "service lookup failed: {err}");
    classify(err)
}

// ── Tests ─────────────────────────────────────────────────────────────────────
