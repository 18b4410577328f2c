//! PAN network manager daemon.
//!
//! Starts the management endpoint on an in-process bus, with a simulated
//! adapter answering service lookups for the peers listed in the config,
//! and serves JSON-lines requests on stdin until end of input or Ctrl-C.
//!
//! ```text
//! main()
//!  └─ load config (--config or platform path)
//!  └─ LoopbackBus
//!       ├─ /org/bluez/hci<N>     SimulatedAdapter per configured adapter
//!       └─ /org/bluez/network    NetworkManager endpoint (fallback)
//!  └─ control loop: stdin ─► bus ─► stdout
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tokio::io::BufReader;
use tracing::info;
use tracing_subscriber::EnvFilter;

use pan_core::adapter_path;
use pan_manager::infrastructure::adapter::simulated::SimulatedAdapter;
use pan_manager::infrastructure::adapter::{BusServiceDirectory, ConfiguredAdapters};
use pan_manager::infrastructure::bus::loopback::LoopbackBus;
use pan_manager::infrastructure::bus::BusConnection;
use pan_manager::infrastructure::collaborators::{
    BusConnectionObjects, BusServerObjects, LocalBridge, LocalSessions,
};
use pan_manager::infrastructure::control::run_control_loop;
use pan_manager::infrastructure::service::{ManagerDeps, ManagerSettings, NetworkManager};
use pan_manager::infrastructure::storage::config::{load_config, load_config_from, AppConfig};

// ── CLI argument definitions ──────────────────────────────────────────────────

/// PAN network manager.
///
/// Manages network servers and outgoing PAN connections.  Requests are read
/// as JSON lines on stdin; replies and lifecycle signals are written to
/// stdout.
#[derive(Debug, Parser)]
#[command(name = "pan-manager", about = "PAN network server and connection manager", version)]
struct Cli {
    /// Path to the TOML configuration file.
    ///
    /// Defaults to the platform config directory
    /// (`~/.config/pan-network/config.toml` on Linux).
    #[arg(long, env = "PAN_CONFIG")]
    config: Option<PathBuf>,

    /// Overrides `manager.bridge_name` from the config file.
    #[arg(long, env = "PAN_BRIDGE")]
    bridge: Option<String>,
}

impl Cli {
    fn load_config(&self) -> anyhow::Result<AppConfig> {
        let mut config = match &self.config {
            Some(path) => load_config_from(path)
                .with_context(|| format!("failed to load config from {}", path.display()))?,
            None => load_config().context("failed to load config")?,
        };
        if let Some(bridge) = &self.bridge {
            config.manager.bridge_name = bridge.clone();
        }
        Ok(config)
    }
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = cli.load_config()?;

    // `RUST_LOG` wins over the configured level.  Logs go to stderr so stdout
    // stays a clean reply stream.
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.manager.log_level)),
        )
        .init();

    info!("PAN network manager starting");

    let bus = Arc::new(LoopbackBus::with_call_timeout(config.manager.call_timeout()));

    let peers = config
        .peers
        .iter()
        .map(|p| (p.address, p.services.clone()));
    let adapter = Arc::new(SimulatedAdapter::new(peers));
    for entry in &config.adapters {
        let path = adapter_path(entry.index);
        bus.register_object(&path, adapter.clone())
            .with_context(|| format!("failed to register adapter {path}"))?;
    }

    let deps = ManagerDeps {
        bus: bus.clone(),
        bridge: Arc::new(LocalBridge::new()),
        sessions: Arc::new(LocalSessions::new()),
        servers: Arc::new(BusServerObjects::new(bus.clone())),
        connections: Arc::new(BusConnectionObjects::new(bus.clone())),
        resolver: Arc::new(ConfiguredAdapters::new(config.adapters.clone())),
        directory: Arc::new(BusServiceDirectory::new(bus.clone())),
    };
    let settings = ManagerSettings {
        local_address: config.manager.local_address,
        bridge_name: config.manager.bridge_name.clone(),
    };
    let manager = NetworkManager::start(settings, deps).context("failed to start network manager")?;

    let signals = manager.subscribe();
    let stdin = BufReader::new(tokio::io::stdin());
    let control = run_control_loop(bus.clone(), stdin, tokio::io::stdout(), signals);

    tokio::select! {
        result = control => result.context("control loop failed")?,
        result = tokio::signal::ctrl_c() => {
            result.context("failed to listen for Ctrl-C")?;
            info!("shutdown signal received");
        }
    }

    manager.stop().await;
    bus.close();
    info!("PAN network manager stopped");
    Ok(())
}

// ── Tests ─────────────────────────────────────────────────────────────────────
