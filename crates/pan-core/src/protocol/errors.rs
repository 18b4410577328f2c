//! Caller-visible error taxonomy.
//!
//! Every call the management endpoint handles resolves exactly once, either
//! with a return value or with one of these errors.  Each variant maps onto a
//! fixed wire error name so clients can match on it.

use thiserror::Error;

use super::messages::BusError;

/// Error returned to callers of the management endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ManagerError {
    /// Malformed or unsupported request (missing argument, unknown service).
    #[error("invalid arguments: {0}")]
    InvalidArguments(String),

    /// Remove on an identifier that is not registered.
    #[error("{0}")]
    NotFound(String),

    /// The peer reported a connection-attempt failure, or the request could
    /// not be delivered to it.
    #[error("connection attempt failed: {0}")]
    ConnectionFailed(String),

    /// The peer has no matching service, returned an empty result, or failed
    /// in some other way during negotiation.
    #[error("not supported")]
    NotSupported,

    /// A local object could not be attached to its path.
    #[error("{0}")]
    RegistrationFailed(String),

    /// The local adapter could not be resolved.
    #[error("adapter not available: {0}")]
    Unavailable(String),

    /// The call was addressed below the management endpoint to a path that
    /// names no object.
    #[error("no such object: {0}")]
    UnknownObject(String),
}

impl ManagerError {
    pub const INVALID_ARGUMENTS: &'static str = "org.bluez.Error.InvalidArguments";
    pub const DOES_NOT_EXIST: &'static str = "org.bluez.Error.DoesNotExist";
    pub const CONNECTION_ATTEMPT_FAILED: &'static str = "org.bluez.Error.ConnectionAttemptFailed";
    pub const NOT_SUPPORTED: &'static str = "org.bluez.Error.NotSupported";
    pub const FAILED: &'static str = "org.bluez.Error.Failed";
    pub const NOT_AVAILABLE: &'static str = "org.bluez.Error.NotAvailable";

    /// Wire error name for this variant.
    pub fn bus_name(&self) -> &'static str {
        match self {
            ManagerError::InvalidArguments(_) => Self::INVALID_ARGUMENTS,
            ManagerError::NotFound(_) => Self::DOES_NOT_EXIST,
            ManagerError::ConnectionFailed(_) => Self::CONNECTION_ATTEMPT_FAILED,
            ManagerError::NotSupported => Self::NOT_SUPPORTED,
            ManagerError::RegistrationFailed(_) => Self::FAILED,
            ManagerError::Unavailable(_) => Self::NOT_AVAILABLE,
            ManagerError::UnknownObject(_) => BusError::UNKNOWN_OBJECT,
        }
    }

    /// Human-readable message carried in the error reply.
    fn bus_message(&self) -> String {
        match self {
            ManagerError::InvalidArguments(msg)
            | ManagerError::NotFound(msg)
            | ManagerError::ConnectionFailed(msg)
            | ManagerError::RegistrationFailed(msg)
            | ManagerError::Unavailable(msg) => msg.clone(),
            ManagerError::NotSupported => "Not supported".to_string(),
            ManagerError::UnknownObject(path) => format!("No such object {path}"),
        }
    }
}

impl From<ManagerError> for BusError {
    fn from(err: ManagerError) -> Self {
        BusError::new(err.bus_name(), err.bus_message())
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
