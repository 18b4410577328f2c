//! Domain types for the PAN network manager.
//!
//! Nothing in here knows about the message bus or the async runtime; these
//! are the Bluetooth-level concepts every other layer builds on.

/// 48-bit Bluetooth device address.
pub mod address;

/// Object-path naming scheme for the management endpoint, servers,
/// connections and adapters.
pub mod path;

/// PAN service roles and the subset a caller may request.
pub mod service;
