//! Caster host - plugin lifecycle and hot reload for voice commands
//!
//! The host reads a plugin configuration, initializes the configured plugin
//! modules, loads their grammars into a speech engine and, for plugins in
//! development mode, watches their source files and reloads them when they
//! change.

pub mod domain;
pub mod storage;
pub mod plugin;
pub mod cli;

pub use domain::{Context, ContextError, PluginId, PluginName};
pub use plugin::{Plugin, PluginBehavior, PluginError, PluginManager};
