//! Configuration handling for the plugin host
//!
//! Two files live in the configuration directory (`./config` by default):
//! - `host.toml` - host settings (watch interval, state directory, installer)
//! - `plugins.toml` - one table per plugin ID, plus a reserved `packages` list

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context as _, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::error;

use crate::domain::{Context, PluginId};

/// Default configuration directory, relative to the working directory
pub const DEFAULT_CONFIG_DIR: &str = "config";

/// Reserved top-level key holding package install specifications
const PACKAGES_KEY: &str = "packages";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Failed to parse configuration: {0}")]
    Parse(String),
}

/// Host-level settings from `host.toml`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HostConfig {
    /// Seconds between two checks of watched plugin files
    pub watch_interval_secs: u64,

    /// Watch every plugin for changes, not only those marked `dev`
    pub dev_mode: bool,

    /// Plugin state directory (defaults to `<config_dir>/plugins.state`)
    pub state_dir: Option<PathBuf>,

    /// Command prefix used to install packages (the package name is appended)
    pub install_command: Vec<String>,

    /// Directory of phrase files for the built-in phrases plugin
    /// (defaults to `<config_dir>/phrases`)
    pub phrases_dir: Option<PathBuf>,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            watch_interval_secs: 10,
            dev_mode: false,
            state_dir: None,
            install_command: vec!["pip".to_string(), "install".to_string()],
            phrases_dir: None,
        }
    }
}

/// A package install specification from the `packages` list
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PackageSpec {
    /// Package name passed to the installer
    pub name: String,

    /// Installer-specific options (version pins, index URLs, ...)
    #[serde(flatten)]
    pub options: toml::Table,
}

impl PackageSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            options: toml::Table::new(),
        }
    }
}

/// Configuration fragment for a single plugin
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PluginConfig {
    settings: toml::Table,
}

impl PluginConfig {
    pub fn new(settings: toml::Table) -> Self {
        Self { settings }
    }

    /// A plugin is watched for changes when its table has a `dev` key
    pub fn is_dev(&self) -> bool {
        self.settings.contains_key("dev")
    }

    /// Context to apply once the plugin is loaded, if configured
    pub fn initial_context(&self) -> Option<Context> {
        let value = self.settings.get("context")?;
        serde_json::to_value(value).ok().map(Context::from)
    }

    pub fn get(&self, key: &str) -> Option<&toml::Value> {
        self.settings.get(key)
    }

    pub fn settings(&self) -> &toml::Table {
        &self.settings
    }
}

/// The parsed plugin configuration document
///
/// Parsed once into an owned value; callers that hand it to the manager
/// keep their own copy.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PluginsConfig {
    packages: Vec<PackageSpec>,
    plugins: BTreeMap<PluginId, PluginConfig>,
}

impl PluginsConfig {
    /// Builds a configuration from already-parsed parts
    pub fn new(
        packages: Vec<PackageSpec>,
        plugins: impl IntoIterator<Item = (PluginId, PluginConfig)>,
    ) -> Self {
        Self {
            packages,
            plugins: plugins.into_iter().collect(),
        }
    }

    /// Loads the document at `path`; a missing file is an empty configuration
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read plugin config: {}", path.display()))?;

        Self::from_toml_str(&content)
            .with_context(|| format!("Failed to parse plugin config: {}", path.display()))
    }

    /// Parses a TOML document
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let mut table: toml::Table =
            toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))?;

        let packages = match table.remove(PACKAGES_KEY) {
            Some(toml::Value::Array(items)) => items
                .into_iter()
                .map(|item| {
                    item.try_into::<PackageSpec>()
                        .map_err(|e| ConfigError::Invalid(format!("package entry: {}", e)))
                })
                .collect::<Result<Vec<_>, _>>()?,
            Some(other) => {
                return Err(ConfigError::Invalid(format!(
                    "'{}' must be an array of tables, got {}",
                    PACKAGES_KEY,
                    other.type_str()
                )))
            }
            None => Vec::new(),
        };

        let mut plugins = BTreeMap::new();
        for (key, value) in table {
            let id: PluginId = match key.parse() {
                Ok(id) => id,
                Err(e) => {
                    error!(key = %key, error = %e, "Skipping plugin entry with invalid ID");
                    continue;
                }
            };

            let settings = match value {
                toml::Value::Table(settings) => settings,
                other => {
                    return Err(ConfigError::Invalid(format!(
                        "plugin '{}' must be a table, got {}",
                        id,
                        other.type_str()
                    )))
                }
            };

            plugins.insert(id, PluginConfig::new(settings));
        }

        Ok(Self { packages, plugins })
    }

    pub fn packages(&self) -> &[PackageSpec] {
        &self.packages
    }

    /// Plugin entries, ordered by ID
    pub fn plugins(&self) -> impl Iterator<Item = (&PluginId, &PluginConfig)> {
        self.plugins.iter()
    }

    pub fn get(&self, id: &PluginId) -> Option<&PluginConfig> {
        self.plugins.get(id)
    }

    pub fn is_empty(&self) -> bool {
        self.packages.is_empty() && self.plugins.is_empty()
    }
}

/// Combined configuration for one configuration directory
#[derive(Debug, Clone)]
pub struct Config {
    pub host: HostConfig,
    pub plugins: PluginsConfig,
    pub config_dir: PathBuf,
}

impl Config {
    /// Loads `host.toml` and `plugins.toml` from a configuration directory
    pub fn load(config_dir: impl Into<PathBuf>) -> Result<Self> {
        let config_dir = config_dir.into();
        let host = Self::load_host(&config_dir)?;
        let plugins = PluginsConfig::load(&config_dir.join("plugins.toml"))?;

        Ok(Self {
            host,
            plugins,
            config_dir,
        })
    }

    /// Returns the per-user configuration directory
    pub fn global_config_dir() -> Option<PathBuf> {
        ProjectDirs::from("dev", "caster", "caster-host").map(|dirs| dirs.config_dir().to_path_buf())
    }

    /// Picks `./config` when it exists, then the per-user directory
    pub fn default_config_dir() -> PathBuf {
        let local = PathBuf::from(DEFAULT_CONFIG_DIR);
        if local.is_dir() {
            return local;
        }

        Self::global_config_dir()
            .filter(|dir| dir.is_dir())
            .unwrap_or(local)
    }

    fn load_host(config_dir: &Path) -> Result<HostConfig> {
        let config_path = config_dir.join("host.toml");
        if !config_path.exists() {
            return Ok(HostConfig::default());
        }

        let content = fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read host config: {}", config_path.display()))?;

        toml::from_str(&content)
            .map_err(|e| ConfigError::Parse(e.to_string()))
            .context("Failed to parse host config")
    }

    /// Resolves a possibly-relative path against the configuration directory
    fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.config_dir.join(path)
        }
    }

    /// Directory holding `<plugin-id>.state` files
    pub fn state_dir(&self) -> PathBuf {
        match &self.host.state_dir {
            Some(dir) => self.resolve(dir),
            None => self.config_dir.join("plugins.state"),
        }
    }

    /// Directory read by the built-in phrases plugin
    pub fn phrases_dir(&self) -> PathBuf {
        match &self.host.phrases_dir {
            Some(dir) => self.resolve(dir),
            None => self.config_dir.join("phrases"),
        }
    }

    /// Saves the host configuration
    pub fn save_host(&self) -> Result<()> {
        fs::create_dir_all(&self.config_dir).with_context(|| {
            format!(
                "Failed to create config directory: {}",
                self.config_dir.display()
            )
        })?;

        let config_path = self.config_dir.join("host.toml");
        let content =
            toml::to_string_pretty(&self.host).context("Failed to serialize host config")?;

        fs::write(&config_path, content)
            .with_context(|| format!("Failed to write host config: {}", config_path.display()))
    }
}
