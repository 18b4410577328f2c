//! External collaborators driven by the manager.
//!
//! The manager does not implement bridging, BNEP tunnels, or the server and
//! connection objects themselves.  It only needs the narrow interfaces below.
//! Implementations live in `infrastructure::collaborators`; tests use the
//! `mockall` doubles generated from these traits.

use pan_core::{BdAddr, ServiceRequestType};
use thiserror::Error;

/// Error reported by a collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CollaboratorError {
    /// Something is already attached or created under this name.
    #[error("{0} is already in use")]
    InUse(String),
    /// Nothing is attached or created under this name.
    #[error("{0} does not exist")]
    Missing(String),
    /// The collaborator has not been initialised.
    #[error("{0} module is not initialised")]
    NotInitialised(&'static str),
    /// Any other failure.
    #[error("{0}")]
    Failed(String),
}

/// Creates and removes the virtual network bridge that PAN links join.
#[cfg_attr(test, mockall::automock)]
pub trait BridgeControl: Send + Sync {
    fn init(&self) -> Result<(), CollaboratorError>;
    fn create(&self, name: &str) -> Result<(), CollaboratorError>;
    fn remove(&self, name: &str) -> Result<(), CollaboratorError>;
    fn cleanup(&self);
}

/// The link-layer (BNEP) session manager.
#[cfg_attr(test, mockall::automock)]
pub trait LinkSessions: Send + Sync {
    fn init(&self) -> Result<(), CollaboratorError>;
    /// Tears down every open tunnel.
    fn kill_all(&self);
    fn cleanup(&self);
}

/// Attaches server objects to their paths.
#[cfg_attr(test, mockall::automock)]
pub trait ServerObjects: Send + Sync {
    fn attach(&self, path: &str, service: ServiceRequestType) -> Result<(), CollaboratorError>;
    fn detach(&self, path: &str) -> Result<(), CollaboratorError>;
}

/// Attaches connection objects to their paths.
#[cfg_attr(test, mockall::automock)]
pub trait ConnectionObjects: Send + Sync {
    fn attach(
        &self,
        path: &str,
        remote: BdAddr,
        service: ServiceRequestType,
    ) -> Result<(), CollaboratorError>;
    fn detach(&self, path: &str) -> Result<(), CollaboratorError>;
}
