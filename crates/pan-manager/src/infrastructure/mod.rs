//! Infrastructure layer for the PAN network manager.
//!
//! Contains the pieces that talk to the outside world: the message bus, the
//! adapter-side service directory, the bridge and session collaborators,
//! file-system storage, the stdin control surface, and the manager service
//! that wires them to the application layer.
//!
//! **Dependency rule**: this layer may depend on `application` and
//! `pan_core`, but MUST NOT be imported by the `application` layer.

pub mod adapter;
pub mod bus;
pub mod collaborators;
pub mod control;
pub mod service;
pub mod storage;
