//! Plugin activation contexts
//!
//! A context is an opaque value owned by a plugin. The host stores it and
//! hands it to the plugin's grammars but never looks inside.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Opaque, plugin-defined activation state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Context(serde_json::Value);

impl Context {
    pub fn new(value: impl Into<serde_json::Value>) -> Self {
        Self(value.into())
    }

    /// Returns the underlying value for the plugin that owns this context
    pub fn value(&self) -> &serde_json::Value {
        &self.0
    }

    pub fn into_value(self) -> serde_json::Value {
        self.0
    }
}

impl fmt::Display for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0 {
            serde_json::Value::String(s) => f.write_str(s),
            other => write!(f, "{}", other),
        }
    }
}

impl From<serde_json::Value> for Context {
    fn from(value: serde_json::Value) -> Self {
        Self(value)
    }
}

/// Outcome of asking a plugin for a context it cannot provide
///
/// This is distinct from `Ok(None)`, which means the plugin supports
/// contexts but has no default.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ContextError {
    #[error("plugin does not provide any contexts")]
    Unsupported,

    #[error("no context matches '{0}'")]
    NoMatch(String),
}
