//! Plugin identifiers and qualified names
//!
//! Two namespaces that must never be mixed up:
//! - Plugin IDs: the configuration key, a dotted module path (e.g., `pkg_a.cmds`)
//! - Plugin names: `{plugin-id}.{ClassName}` (e.g., `pkg_a.cmds.Commands`)
//!
//! The manager keys plugins by ID; a plugin reports its own name, and the
//! two are checked against each other at construction time.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum IdError {
    #[error("Invalid plugin ID: expected a dotted module path like 'pkg.module', got '{0}'")]
    InvalidPluginId(String),

    #[error("Invalid plugin name: expected '{{plugin-id}}.{{ClassName}}', got '{0}'")]
    InvalidPluginName(String),

    #[error("Invalid class name: '{0}'")]
    InvalidClassName(String),
}

/// Checks a single path segment: `[A-Za-z_][A-Za-z0-9_]*`
fn is_valid_segment(segment: &str) -> bool {
    let mut chars = segment.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Identifier of a configured plugin, a dotted module path
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PluginId {
    path: String,
}

impl PluginId {
    /// Returns the module path as a string
    pub fn as_str(&self) -> &str {
        &self.path
    }

    /// Returns the individual path segments
    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.path.split('.')
    }

    /// Returns the file name used for this plugin's state document
    pub fn state_file_name(&self) -> String {
        format!("{}.state", self.path)
    }
}

impl fmt::Display for PluginId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(&self.path)
    }
}

impl FromStr for PluginId {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() || !s.split('.').all(is_valid_segment) {
            return Err(IdError::InvalidPluginId(s.to_string()));
        }

        Ok(Self {
            path: s.to_string(),
        })
    }
}

impl TryFrom<String> for PluginId {
    type Error = IdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<PluginId> for String {
    fn from(id: PluginId) -> Self {
        id.path
    }
}

impl AsRef<str> for PluginId {
    fn as_ref(&self) -> &str {
        &self.path
    }
}

/// Fully-qualified plugin name: `{module}.{ClassName}`
///
/// The module part is whatever module the implementation was defined in,
/// which is not necessarily the ID the plugin was configured under.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PluginName {
    module: PluginId,
    class_name: String,
}

impl PluginName {
    /// Creates a name from a module path and a class name
    pub fn new(module: PluginId, class_name: &str) -> Result<Self, IdError> {
        if !is_valid_segment(class_name) {
            return Err(IdError::InvalidClassName(class_name.to_string()));
        }

        Ok(Self {
            module,
            class_name: class_name.to_string(),
        })
    }

    /// Returns the module portion of the name
    pub fn module(&self) -> &PluginId {
        &self.module
    }

    /// Returns the class portion of the name
    pub fn class_name(&self) -> &str {
        &self.class_name
    }

    /// Returns true if this name is `{id}.{class_name}` for the given ID
    pub fn belongs_to(&self, id: &PluginId) -> bool {
        &self.module == id
    }
}

impl fmt::Display for PluginName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.module, self.class_name)
    }
}

impl FromStr for PluginName {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let (module, class_name) = s
            .rsplit_once('.')
            .ok_or_else(|| IdError::InvalidPluginName(s.to_string()))?;

        let module: PluginId = module
            .parse()
            .map_err(|_| IdError::InvalidPluginName(s.to_string()))?;

        Self::new(module, class_name).map_err(|_| IdError::InvalidPluginName(s.to_string()))
    }
}

impl TryFrom<String> for PluginName {
    type Error = IdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<PluginName> for String {
    fn from(name: PluginName) -> Self {
        name.to_string()
    }
}
