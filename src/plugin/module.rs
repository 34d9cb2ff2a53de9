//! Plugin module registration
//!
//! Plugin modules are registered explicitly at startup instead of being
//! discovered by scanning for subclasses. A module exposes the plugin
//! implementations it contains; an implementation re-exported from another
//! module keeps its original `defined_in` and is skipped when the module is
//! initialized, so it is never registered twice.

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use thiserror::Error;

use super::behavior::{short_type_name, PluginBehavior};
use super::watch::SourceFilter;
use crate::domain::PluginId;

#[derive(Debug, Error)]
pub enum ImportError {
    #[error("No plugin module named '{0}'")]
    NotFound(PluginId),

    #[error("Failed to import plugin module '{module}': {reason}")]
    Failed { module: PluginId, reason: String },
}

type Factory = Arc<dyn Fn() -> Box<dyn PluginBehavior> + Send + Sync>;

/// A plugin implementation exposed by a module
#[derive(Clone)]
pub struct PluginEntry {
    defined_in: PluginId,
    class_name: String,
    factory: Factory,
}

impl PluginEntry {
    /// Registers an implementation under an explicit class name
    pub fn new<F>(defined_in: PluginId, class_name: impl Into<String>, factory: F) -> Self
    where
        F: Fn() -> Box<dyn PluginBehavior> + Send + Sync + 'static,
    {
        Self {
            defined_in,
            class_name: class_name.into(),
            factory: Arc::new(factory),
        }
    }

    /// Registers a default-constructible implementation under its type name
    pub fn of<T>(defined_in: PluginId) -> Self
    where
        T: PluginBehavior + Default + 'static,
    {
        Self::new(defined_in, short_type_name::<T>(), || {
            Box::new(T::default()) as Box<dyn PluginBehavior>
        })
    }

    /// Module the implementation was defined in
    pub fn defined_in(&self) -> &PluginId {
        &self.defined_in
    }

    pub fn class_name(&self) -> &str {
        &self.class_name
    }

    /// Constructs a fresh instance of the implementation
    pub fn instantiate(&self) -> Box<dyn PluginBehavior> {
        (self.factory)()
    }
}

impl fmt::Debug for PluginEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginEntry")
            .field("defined_in", &self.defined_in)
            .field("class_name", &self.class_name)
            .field("factory", &"<factory>")
            .finish()
    }
}

/// An importable plugin module
#[derive(Debug, Clone)]
pub struct PluginModule {
    path: PluginId,
    source_dir: Option<PathBuf>,
    source_filter: SourceFilter,
    entries: Vec<PluginEntry>,
}

impl PluginModule {
    pub fn new(path: PluginId) -> Self {
        Self {
            path,
            source_dir: None,
            source_filter: SourceFilter::any(),
            entries: Vec::new(),
        }
    }

    /// Sets the directory holding the module's source files (watched in dev mode)
    pub fn with_source_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.source_dir = Some(dir.into());
        self
    }

    /// Restricts watching to source files with one of the given extensions
    pub fn with_source_extensions<I, S>(mut self, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.source_filter = SourceFilter::extensions(extensions);
        self
    }

    /// Adds an entry, which may be defined in this module or re-exported
    pub fn with_entry(mut self, entry: PluginEntry) -> Self {
        self.entries.push(entry);
        self
    }

    /// Adds a default-constructible implementation defined in this module
    pub fn with_plugin<T>(self) -> Self
    where
        T: PluginBehavior + Default + 'static,
    {
        let entry = PluginEntry::of::<T>(self.path.clone());
        self.with_entry(entry)
    }

    pub fn path(&self) -> &PluginId {
        &self.path
    }

    pub fn source_dir(&self) -> Option<&Path> {
        self.source_dir.as_deref()
    }

    pub fn source_filter(&self) -> &SourceFilter {
        &self.source_filter
    }

    pub fn entries(&self) -> &[PluginEntry] {
        &self.entries
    }

    /// The first implementation actually defined in this module
    pub fn defined_entry(&self) -> Option<&PluginEntry> {
        self.entries.iter().find(|entry| entry.defined_in == self.path)
    }
}

/// Resolves plugin IDs to modules
pub trait ModuleSource {
    fn import(&self, id: &PluginId) -> Result<PluginModule, ImportError>;
}

/// In-memory module table populated at startup
#[derive(Debug, Clone, Default)]
pub struct ModuleRegistry {
    modules: HashMap<PluginId, PluginModule>,
}

impl ModuleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a module, replacing any module with the same path
    pub fn register(&mut self, module: PluginModule) {
        self.modules.insert(module.path.clone(), module);
    }

    pub fn with_module(mut self, module: PluginModule) -> Self {
        self.register(module);
        self
    }

    pub fn contains(&self, id: &PluginId) -> bool {
        self.modules.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }
}

impl ModuleSource for ModuleRegistry {
    fn import(&self, id: &PluginId) -> Result<PluginModule, ImportError> {
        self.modules
            .get(id)
            .cloned()
            .ok_or_else(|| ImportError::NotFound(id.clone()))
    }
}
