//! Storage infrastructure: configuration file loading.
//!
//! The `config` sub-module reads the TOML configuration from the platform
//! config directory (or an explicit path) and supplies defaults when no file
//! exists yet.

pub mod config;
