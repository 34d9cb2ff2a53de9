//! # Plugin System
//!
//! Lifecycle management and hot reload for voice-command plugins.
//!
//! ## Overview
//!
//! A plugin is a configured unit that owns one or more grammars registered
//! with an external speech engine. The host never compiles or matches
//! speech; it only drives the grammar hooks (`load`, `unload`, `enable`,
//! `disable`, `set_context`).
//!
//! ## Lifecycle
//!
//! ```text
//! plugins.toml ──► PluginManager::init_plugins
//!                    ├── install packages      (failures logged, skipped)
//!                    ├── import each module    (failures logged, skipped)
//!                    ├── construct Plugin      (name checked)
//!                    └── watch dev sources ──► Scheduler::create_timer
//!
//! load_plugins ──► grammars() ─► set_context ─► Grammar::load
//!
//! timer fires ──► FileWatcher::tick ──► reload_plugin (unload + load)
//! ```
//!
//! ## Plugin Discovery
//!
//! Plugin modules are registered explicitly in a [`ModuleRegistry`]. The
//! configuration key names the module; the module's first plugin defined in
//! that module becomes the plugin for the key.
//!
//! ## Key Types
//!
//! - [`PluginManager`] - Owns all plugins and the file watcher
//! - [`Plugin`] - State machine around a single plugin
//! - [`PluginBehavior`] - Trait implemented by plugin authors
//! - [`Grammar`] - Speech engine grammar handle

mod behavior;
mod error;
mod grammar;
mod installer;
mod lifecycle;
mod manager;
mod module;
pub mod phrases;
mod scheduler;
mod watch;

pub use behavior::{PluginBehavior, PluginEnv};
pub use error::PluginError;
pub use grammar::{Grammar, Rule};
pub use installer::{CommandInstaller, DisabledInstaller, PackageInstaller};
pub use lifecycle::{Plugin, PluginStatus};
pub use manager::{
    PluginManager, PluginManagerBuilder, PluginSummary, WatchReport, DEFAULT_WATCH_INTERVAL,
};
pub use module::{ImportError, ModuleRegistry, ModuleSource, PluginEntry, PluginModule};
pub use scheduler::{NoopScheduler, Scheduler, Timer, TimerQueue};
pub use watch::{FileWatcher, ReloadTrigger, SourceFilter, WatchedFile};
