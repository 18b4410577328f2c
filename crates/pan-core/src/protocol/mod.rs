//! Protocol module: bus message model, the manager surface, and error replies.

pub mod errors;
pub mod manager;
pub mod messages;

pub use errors::ManagerError;
pub use manager::{ManagerMethod, ManagerSignal};
pub use messages::*;
