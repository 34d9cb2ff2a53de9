//! # Storage Layer
//!
//! Configuration and per-plugin persisted state.
//!
//! ## Storage Formats
//!
//! | Data | Format | Location |
//! |------|--------|----------|
//! | Host settings | TOML | `<config_dir>/host.toml` |
//! | Plugin configuration | TOML | `<config_dir>/plugins.toml` |
//! | Plugin state | YAML | `<state_dir>/<plugin-id>.state` |
//!
//! State files are written atomically (temp file + rename) and only when a
//! plugin explicitly persists its state.
//!
//! ## Key Types
//!
//! - [`Config`] - Host settings and plugin configuration for a config directory
//! - [`PluginsConfig`] - Parsed plugin configuration document
//! - [`PluginState`] - A plugin's persisted state document

mod config;
mod state;

pub use config::{
    Config, ConfigError, HostConfig, PackageSpec, PluginConfig, PluginsConfig, DEFAULT_CONFIG_DIR,
};
pub use state::{PluginFile, PluginState, StateError};
