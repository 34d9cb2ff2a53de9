//! Plugin author interface
//!
//! A plugin implementation supplies its grammars and, optionally, the
//! contexts it understands. Everything else (identity, load state, persisted
//! state) is handled by [`Plugin`](super::Plugin).

use anyhow::Result;

use super::grammar::Grammar;
use crate::domain::{Context, ContextError, PluginId, PluginName};
use crate::storage::{PluginConfig, PluginState};

/// Read-only view of the owning plugin, passed to [`PluginBehavior::grammars`]
#[derive(Debug, Clone, Copy)]
pub struct PluginEnv<'a> {
    pub id: &'a PluginId,
    pub name: &'a PluginName,
    pub config: &'a PluginConfig,
    pub state: Option<&'a PluginState>,
}

impl PluginEnv<'_> {
    /// Returns the plugin's persisted state data, if any
    pub fn state_data(&self) -> Option<&serde_yaml::Value> {
        self.state.and_then(|state| state.data())
    }
}

/// Behavior supplied by a plugin implementation
pub trait PluginBehavior {
    /// Class name the implementation reports for itself
    ///
    /// Defaults to the implementing type's name. Together with the module the
    /// implementation was registered in, this forms the plugin's
    /// [`PluginName`].
    fn class_name(&self) -> &str {
        short_type_name::<Self>()
    }

    /// Builds the grammars this plugin registers while loaded
    ///
    /// Called on every load, so a reload rebuilds the grammars from scratch.
    fn grammars(&mut self, env: &PluginEnv<'_>) -> Result<Vec<Box<dyn Grammar>>>;

    /// Returns a context for this plugin
    ///
    /// With `desired == None` this is the plugin's default context; `Ok(None)`
    /// means the plugin has no default. Plugins that do not work with
    /// contexts at all keep the default implementation, which reports
    /// [`ContextError::Unsupported`].
    fn get_context(&self, desired: Option<&Context>) -> Result<Option<Context>, ContextError> {
        let _ = desired;
        Err(ContextError::Unsupported)
    }

    /// Called after a context has been pushed to every grammar
    fn on_context_applied(&mut self, context: &Context) {
        let _ = context;
    }
}

/// Last path segment of a type name, without generic parameters
pub(crate) fn short_type_name<T: ?Sized>() -> &'static str {
    let full = std::any::type_name::<T>();
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or(base)
}
