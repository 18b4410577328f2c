//! TOML-based configuration for the manager daemon.
//!
//! Reads `AppConfig` from the platform-appropriate location:
//! - Windows:  `%APPDATA%\PANNetwork\config.toml`
//! - Linux:    `$XDG_CONFIG_HOME/pan-network/config.toml` (or `~/.config/...`)
//! - macOS:    `~/Library/Application Support/PANNetwork/config.toml`
//!
//! An explicit path (`--config`) overrides the platform location.
//!
//! ```toml
//! [manager]
//! log_level = "debug"
//! bridge_name = "pan0"
//! local_address = "00:00:00:00:00:00"
//! call_timeout_ms = 25000
//!
//! [[adapters]]
//! index = 0
//! address = "00:1A:7D:DA:71:13"
//!
//! [[peers]]
//! address = "AA:BB:CC:DD:EE:FF"
//! services = ["nap", "gn"]
//! ```
//!
//! Every field has a `#[serde(default = ...)]`, so a missing file or a file
//! that predates newer fields still loads.  The manager never writes the
//! file.

use std::path::{Path, PathBuf};
use std::time::Duration;

use pan_core::{BdAddr, PanRole};
use serde::Deserialize;
use thiserror::Error;

/// Error type for configuration file operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The platform config directory could not be determined.
    #[error("could not determine platform config directory")]
    NoPlatformConfigDir,

    /// A file system I/O error occurred.
    #[error("I/O error accessing config at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The TOML content could not be parsed.
    #[error("failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),
}

// ── Config schema types ───────────────────────────────────────────────────────

/// Top-level configuration stored on disk.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct AppConfig {
    #[serde(default)]
    pub manager: ManagerConfig,
    /// Local adapters, in preference order.
    #[serde(default = "default_adapters")]
    pub adapters: Vec<AdapterEntry>,
    /// Remote devices the simulated adapter knows about.
    #[serde(default)]
    pub peers: Vec<PeerEntry>,
}

/// Manager behaviour settings.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct ManagerConfig {
    /// `tracing` filter used when `RUST_LOG` is unset.
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Name of the bridge interface created at startup.
    #[serde(default = "default_bridge_name")]
    pub bridge_name: String,
    /// Local adapter address; the wildcard selects the first adapter.
    #[serde(default)]
    pub local_address: BdAddr,
    /// Reply timeout for bus calls, in milliseconds.
    #[serde(default = "default_call_timeout_ms")]
    pub call_timeout_ms: u64,
}

impl ManagerConfig {
    pub fn call_timeout(&self) -> Duration {
        Duration::from_millis(self.call_timeout_ms)
    }
}

/// A local adapter.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct AdapterEntry {
    /// Adapter index (`hci<index>`).
    pub index: u16,
    #[serde(default)]
    pub address: Option<BdAddr>,
}

/// A remote device and the PAN roles it offers.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct PeerEntry {
    pub address: BdAddr,
    #[serde(default)]
    pub services: Vec<PanRole>,
}

// ── Default helpers ───────────────────────────────────────────────────────────

fn default_log_level() -> String {
    "info".to_string()
}
fn default_bridge_name() -> String {
    "pan0".to_string()
}
fn default_call_timeout_ms() -> u64 {
    25_000
}
fn default_adapters() -> Vec<AdapterEntry> {
    vec![AdapterEntry {
        index: 0,
        address: None,
    }]
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            manager: ManagerConfig::default(),
            adapters: default_adapters(),
            peers: Vec::new(),
        }
    }
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            bridge_name: default_bridge_name(),
            local_address: BdAddr::ANY,
            call_timeout_ms: default_call_timeout_ms(),
        }
    }
}

// ── Config repository ─────────────────────────────────────────────────────────

/// Determines the platform-appropriate directory for the config file.
///
/// # Errors
///
/// Returns [`ConfigError::NoPlatformConfigDir`] when the platform config base
/// directory cannot be determined from the environment.
pub fn config_dir() -> Result<PathBuf, ConfigError> {
    platform_config_dir().ok_or(ConfigError::NoPlatformConfigDir)
}

/// Resolves the full path to the platform config file.
///
/// # Errors
///
/// Returns [`ConfigError::NoPlatformConfigDir`] if the base directory cannot be
/// determined.
pub fn config_file_path() -> Result<PathBuf, ConfigError> {
    Ok(config_dir()?.join("config.toml"))
}

/// Loads `AppConfig` from the platform location.
///
/// # Errors
///
/// See [`load_config_from`].
pub fn load_config() -> Result<AppConfig, ConfigError> {
    load_config_from(&config_file_path()?)
}

/// Loads `AppConfig` from `path`, returning `AppConfig::default()` if the
/// file does not exist.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] for file-system errors other than "not found",
/// and [`ConfigError::Parse`] if the TOML is malformed.
pub fn load_config_from(path: &Path) -> Result<AppConfig, ConfigError> {
    match std::fs::read_to_string(path) {
        Ok(content) => Ok(toml::from_str(&content)?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(AppConfig::default()),
        Err(e) => Err(ConfigError::Io {
            path: path.to_path_buf(),
            source: e,
        }),
    }
}

fn platform_config_dir() -> Option<PathBuf> {
    #[cfg(target_os = "windows")]
    {
        std::env::var_os("APPDATA").map(|p| PathBuf::from(p).join("PANNetwork"))
    }

    #[cfg(target_os = "linux")]
    {
        let base = std::env::var_os("XDG_CONFIG_HOME")
            .map(PathBuf::from)
            .or_else(|| std::env::var_os("HOME").map(|h| PathBuf::from(h).join(".config")))?;
        Some(base.join("pan-network"))
    }

    #[cfg(target_os = "macos")]
    {
        std::env::var_os("HOME").map(|h| {
            PathBuf::from(h)
                .join("Library")
                .join("Application Support")
                .join("PANNetwork")
        })
    }

    #[cfg(not(any(target_os = "windows", target_os = "linux", target_os = "macos")))]
    {
        None
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn temp_dir() -> PathBuf {
        std::env::temp_dir().join(format!("pan_config_test_{}", Uuid::new_v4()))
    }

    // ── Defaults ──────────────────────────────────────────────────────────────

    #[test]
    fn test_default_config_uses_pan0_and_wildcard_address() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.manager.bridge_name, "pan0");
        assert!(cfg.manager.local_address.is_any());
        assert_eq!(cfg.manager.log_level, "info");
    }

    #[test]
    fn test_default_call_timeout_is_25_seconds() {
        assert_eq!(
            ManagerConfig::default().call_timeout(),
            Duration::from_secs(25)
        );
    }

    #[test]
    fn test_default_config_has_one_adapter_and_no_peers() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.adapters, vec![AdapterEntry { index: 0, address: None }]);
        assert!(cfg.peers.is_empty());
    }

    // ── Parsing ───────────────────────────────────────────────────────────────

    #[test]
    fn test_empty_toml_uses_defaults() {
        let cfg: AppConfig = toml::from_str("").unwrap();
        assert_eq!(cfg, AppConfig::default());
    }

    #[test]
    fn test_full_toml_is_parsed() {
        // Arrange
        let toml_str = r#"
[manager]
log_level = "debug"
bridge_name = "br-pan"
local_address = "00:1A:7D:DA:71:13"
call_timeout_ms = 500

[[adapters]]
index = 1
address = "00:1A:7D:DA:71:13"

[[peers]]
address = "AA:BB:CC:DD:EE:FF"
services = ["nap", "gn"]
"#;

        // Act
        let cfg: AppConfig = toml::from_str(toml_str).unwrap();

        // Assert
        assert_eq!(cfg.manager.bridge_name, "br-pan");
        assert_eq!(cfg.manager.local_address.to_string(), "00:1A:7D:DA:71:13");
        assert_eq!(cfg.manager.call_timeout(), Duration::from_millis(500));
        assert_eq!(cfg.adapters.len(), 1);
        assert_eq!(cfg.adapters[0].index, 1);
        assert_eq!(cfg.peers[0].services, vec![PanRole::Nap, PanRole::Gn]);
    }

    #[test]
    fn test_invalid_address_is_a_parse_error() {
        let result: Result<AppConfig, _> =
            toml::from_str("[manager]\nlocal_address = \"not-an-address\"\n");
        assert!(result.is_err());
    }

    #[test]
    fn test_unknown_service_name_is_a_parse_error() {
        let result: Result<AppConfig, _> = toml::from_str(
            "[[peers]]\naddress = \"AA:BB:CC:DD:EE:FF\"\nservices = [\"wifi\"]\n",
        );
        assert!(result.is_err());
    }

    // ── File access ───────────────────────────────────────────────────────────

    #[test]
    fn test_load_missing_file_returns_default() {
        let path = temp_dir().join("config.toml");
        let cfg = load_config_from(&path).unwrap();
        assert_eq!(cfg, AppConfig::default());
    }

    #[test]
    fn test_load_reads_file_and_ignores_unknown_keys() {
        // Arrange: keys outside the schema, such as `version`, are ignored.
        let dir = temp_dir();
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("config.toml");
        std::fs::write(
            &path,
            "[manager]\nversion = \"1.0\"\nlog_level = \"trace\"\n\n\
             [[peers]]\naddress = \"AA:BB:CC:DD:EE:FF\"\nservices = [\"gn\"]\n",
        )
        .unwrap();

        // Act
        let loaded = load_config_from(&path).unwrap();

        // Assert
        assert_eq!(loaded.manager.log_level, "trace");
        assert_eq!(loaded.peers.len(), 1);
        assert_eq!(loaded.peers[0].services, vec![PanRole::Gn]);
        assert_eq!(loaded.adapters, default_adapters());

        // Cleanup
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_malformed_file_is_reported() {
        let dir = temp_dir();
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("config.toml");
        std::fs::write(&path, "[[[ not toml").unwrap();

        let result = load_config_from(&path);

        assert!(matches!(result, Err(ConfigError::Parse(_))));
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_config_file_path_ends_with_config_toml() {
        if let Ok(path) = config_file_path() {
            assert!(path.ends_with("pan-network/config.toml") || path.ends_with("config.toml"));
        }
    }
}
