//! Application layer of the PAN network manager.
//!
//! Code in this layer decides *what* happens to a request; it never touches
//! the message bus, sockets, or kernel interfaces directly.  Everything
//! outside the process is reached through the collaborator traits, which the
//! infrastructure layer implements.
//!
//! # Sub-modules
//!
//! - **`registry`** – The in-memory record of registered server and
//!   connection paths, with uniqueness and insertion-order listing.
//!
//! - **`state`** – `ManagerState`: the single owned context holding the local
//!   adapter address, the registry, and the connection path counter.
//!
//! - **`collaborators`** – Traits for the external pieces the manager drives:
//!   bridge interface, link-layer sessions, server and connection objects.
//!
//! - **`dispatch`** – Routes calls on the management endpoint to the six
//!   manager methods, replies synchronously where it can, and hands
//!   `CreateConnection` over to the negotiator.
//!
//! - **`negotiate`** – The two-stage remote service lookup (handles, then
//!   record) that must succeed before a connection object is created.

pub mod collaborators;
pub mod dispatch;
pub mod negotiate;
pub mod registry;
pub mod state;
