//! Implementations of the collaborator traits.
//!
//! - **`local`** – `LocalBridge` and `LocalSessions`: bookkeeping stand-ins
//!   for the kernel bridge and the BNEP session manager.  Interface
//!   configuration and link-layer framing are outside this crate.
//! - **`objects`** – `BusServerObjects` and `BusConnectionObjects`: export
//!   server and connection objects at their paths on the bus.

pub mod local;
pub mod objects;

pub use local::{LocalBridge, LocalSessions};
pub use objects::{BusConnectionObjects, BusServerObjects};
