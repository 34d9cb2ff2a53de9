use thiserror::Error;

use crate::domain::{IdError, PluginId};
use crate::storage::StateError;

#[derive(Debug, Error)]
pub enum PluginError {
    #[error("Plugin not found: {0}")]
    NotFound(PluginId),

    #[error("Plugin name '{actual}' does not match expected '{expected}'")]
    NameMismatch { expected: String, actual: String },

    #[error("Plugin '{0}' already has grammars attached")]
    GrammarsAttached(PluginId),

    #[error("Plugin '{plugin}' failed in {hook}: {source}")]
    Hook {
        plugin: PluginId,
        hook: &'static str,
        #[source]
        source: anyhow::Error,
    },

    #[error("Plugin '{0}' does not provide any contexts")]
    ContextUnsupported(PluginId),

    #[error("Plugin '{plugin}' has no context matching '{desired}'")]
    ContextNoMatch { plugin: PluginId, desired: String },

    #[error("Failed to watch files for plugin '{plugin}': {source}")]
    Watch {
        plugin: PluginId,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    State(#[from] StateError),

    #[error(transparent)]
    Id(#[from] IdError),
}

impl PluginError {
    pub(crate) fn hook(plugin: &PluginId, hook: &'static str, source: anyhow::Error) -> Self {
        Self::Hook {
            plugin: plugin.clone(),
            hook,
            source,
        }
    }
}
