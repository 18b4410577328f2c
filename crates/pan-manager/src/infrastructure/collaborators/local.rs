//! In-process bridge and session bookkeeping.

use std::sync::Mutex;

use tracing::{debug, info};

use crate::application::collaborators::{BridgeControl, CollaboratorError, LinkSessions};

#[derive(Debug, Default)]
struct BridgeState {
    initialised: bool,
    interfaces: Vec<String>,
}

/// Tracks which bridge interfaces exist.
#[derive(Debug, Default)]
pub struct LocalBridge {
    state: Mutex<BridgeState>,
}

impl LocalBridge {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BridgeState> {
        self.state.lock().unwrap_or_else(|p| p.into_inner())
    }

    pub fn is_initialised(&self) -> bool {
        self.lock().initialised
    }

    /// Names of the bridges currently created.
    pub fn interfaces(&self) -> Vec<String> {
        self.lock().interfaces.clone()
    }
}

impl BridgeControl for LocalBridge {
    fn init(&self) -> Result<(), CollaboratorError> {
        self.lock().initialised = true;
        debug!("bridge module initialised");
        Ok(())
    }

    fn create(&self, name: &str) -> Result<(), CollaboratorError> {
        let mut state = self.lock();
        if !state.initialised {
            return Err(CollaboratorError::NotInitialised("bridge"));
        }
        if state.interfaces.iter().any(|i| i == name) {
            return Err(CollaboratorError::InUse(name.to_string()));
        }
        state.interfaces.push(name.to_string());
        info!(bridge = name, "bridge created");
        Ok(())
    }

    fn remove(&self, name: &str) -> Result<(), CollaboratorError> {
        let mut state = self.lock();
        let index = state
            .interfaces
            .iter()
            .position(|i| i == name)
            .ok_or_else(|| CollaboratorError::Missing(name.to_string()))?;
        state.interfaces.remove(index);
        info!(bridge = name, "bridge removed");
        Ok(())
    }

    fn cleanup(&self) {
        let mut state = self.lock();
        state.initialised = false;
        state.interfaces.clear();
        debug!("bridge module cleaned up");
    }
}

#[derive(Debug, Default)]
struct SessionState {
    initialised: bool,
    kills: usize,
}

/// Tracks the link-layer session module's lifecycle.
#[derive(Debug, Default)]
pub struct LocalSessions {
    state: Mutex<SessionState>,
}

impl LocalSessions {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(|p| p.into_inner())
    }

    pub fn is_initialised(&self) -> bool {
        self.lock().initialised
    }

    /// How many times every session was torn down.
    pub fn kill_count(&self) -> usize {
        self.lock().kills
    }
}

impl LinkSessions for LocalSessions {
    fn init(&self) -> Result<(), CollaboratorError> {
        self.lock().initialised = true;
        debug!("session module initialised");
        Ok(())
    }

    fn kill_all(&self) {
        self.lock().kills += 1;
        info!("all link sessions terminated");
    }

    fn cleanup(&self) {
        self.lock().initialised = false;
        debug!("session module cleaned up");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bridge_create_requires_init() {
        let bridge = LocalBridge::new();
        assert_eq!(
            bridge.create("pan0"),
            Err(CollaboratorError::NotInitialised("bridge"))
        );
    }

    #[test]
    fn test_bridge_lifecycle() {
        // Arrange
        let bridge = LocalBridge::new();
        bridge.init().unwrap();

        // Act
        bridge.create("pan0").unwrap();
        let duplicate = bridge.create("pan0");

        // Assert
        assert_eq!(duplicate, Err(CollaboratorError::InUse("pan0".into())));
        assert_eq!(bridge.interfaces(), vec!["pan0".to_string()]);
        bridge.remove("pan0").unwrap();
        assert!(bridge.interfaces().is_empty());
        assert_eq!(bridge.remove("pan0"), Err(CollaboratorError::Missing("pan0".into())));
    }

    #[test]
    fn test_bridge_cleanup_resets_everything() {
        let bridge = LocalBridge::new();
        bridge.init().unwrap();
        bridge.create("pan0").unwrap();

        bridge.cleanup();

        assert!(!bridge.is_initialised());
        assert!(bridge.interfaces().is_empty());
    }

    #[test]
    fn test_sessions_track_init_and_kills() {
        let sessions = LocalSessions::new();
        sessions.init().unwrap();
        sessions.kill_all();
        sessions.kill_all();
        assert!(sessions.is_initialised());
        assert_eq!(sessions.kill_count(), 2);
        sessions.cleanup();
        assert!(!sessions.is_initialised());
    }
}
