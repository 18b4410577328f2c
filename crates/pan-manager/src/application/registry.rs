//! ObjectRegistry: the manager's record of live server and connection paths.
//!
//! Two disjoint collections of opaque path strings are kept:
//!
//! ```text
//! servers:      /org/bluez/network/server/1116, /org/bluez/network/server/1117
//! connections:  /org/bluez/network/connection0, /org/bluez/network/connection3
//! ```
//!
//! - A path appears at most once in its collection.
//! - A path is never in both collections at once.
//! - Listing returns paths in the order they were registered.
//!
//! The registry only tracks identities.  Attaching and detaching the objects
//! behind those paths is done by the collaborators; callers of
//! [`ObjectRegistry::unregister`] are responsible for detaching the object.
//!
//! The registry is not synchronised.  It is owned by the manager's
//! coordinating task, which is the only writer.

use thiserror::Error;

/// Which collection a path belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObjectKind {
    Server,
    Connection,
}

/// Error type for registry operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("path {0} is not registered")]
    NotFound(String),
}

/// In-memory registry of server and connection paths.
///
/// # Vec choice
///
/// Both collections are plain `Vec<String>`.  A manager holds a handful of
/// objects at most and listing must preserve insertion order, so a linear
/// scan is both simpler and faster than a hashed index here.
#[derive(Debug, Default)]
pub struct ObjectRegistry {
    servers: Vec<String>,
    connections: Vec<String>,
}

impl ObjectRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn collection(&self, kind: ObjectKind) -> &Vec<String> {
        match kind {
            ObjectKind::Server => &self.servers,
            ObjectKind::Connection => &self.connections,
        }
    }

    fn collection_mut(&mut self, kind: ObjectKind) -> &mut Vec<String> {
        match kind {
            ObjectKind::Server => &mut self.servers,
            ObjectKind::Connection => &mut self.connections,
        }
    }

    /// Returns the registered paths of `kind` in registration order.
    pub fn list(&self, kind: ObjectKind) -> &[String] {
        self.collection(kind)
    }

    /// Returns `true` if `path` is registered as `kind`.
    pub fn contains(&self, kind: ObjectKind, path: &str) -> bool {
        self.collection(kind).iter().any(|p| p == path)
    }

    /// Appends `path` to `kind`.
    ///
    /// Returns `false`, leaving the registry unchanged, when the path is
    /// already registered in either collection.
    pub fn register(&mut self, kind: ObjectKind, path: &str) -> bool {
        if self.contains(ObjectKind::Server, path) || self.contains(ObjectKind::Connection, path) {
            return false;
        }
        self.collection_mut(kind).push(path.to_string());
        true
    }

    /// Removes `path` from `kind`.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::NotFound`] if the path is not registered as `kind`.
    pub fn unregister(&mut self, kind: ObjectKind, path: &str) -> Result<(), RegistryError> {
        let paths = self.collection_mut(kind);
        let index = paths
            .iter()
            .position(|p| p == path)
            .ok_or_else(|| RegistryError::NotFound(path.to_string()))?;
        paths.remove(index);
        Ok(())
    }

    /// Number of paths registered as `kind`.
    pub fn len(&self, kind: ObjectKind) -> usize {
        self.collection(kind).len()
    }

    pub fn is_empty(&self) -> bool {
        self.servers.is_empty() && self.connections.is_empty()
    }

    /// Drops every registered path.
    pub fn clear(&mut self) {
        self.servers.clear();
        self.connections.clear();
    }
}
