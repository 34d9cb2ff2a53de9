//! Wiring of configuration, modules and scheduler into a plugin manager

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context as _, Result};
use tracing::{debug, warn};

use crate::plugin::{phrases, CommandInstaller, ModuleRegistry, PluginManager, TimerQueue};
use crate::storage::Config;

/// Settings taken from global command-line flags
#[derive(Debug, Clone, Default)]
pub struct HostOptions {
    pub config_dir: Option<PathBuf>,
    pub state_dir: Option<PathBuf>,
    pub develop: bool,
}

/// A configured plugin manager and the timer queue it registers with
pub struct Host {
    pub config: Config,
    pub state_dir: PathBuf,
    pub manager: PluginManager,
    pub timers: TimerQueue,
}

impl Host {
    pub fn open(options: HostOptions) -> Result<Self> {
        let config_dir = options
            .config_dir
            .unwrap_or_else(Config::default_config_dir);
        debug!(dir = %config_dir.display(), "Using config directory");

        let config = Config::load(&config_dir)
            .with_context(|| format!("Failed to load config from {}", config_dir.display()))?;
        let state_dir = options.state_dir.unwrap_or_else(|| config.state_dir());

        let modules = ModuleRegistry::new().with_module(phrases::module(config.phrases_dir())?);
        let timers = TimerQueue::new();

        let mut builder = PluginManager::builder(modules)
            .scheduler(timers.clone())
            .state_dir(state_dir.clone())
            .watch_interval(Duration::from_secs(config.host.watch_interval_secs))
            .force_dev(options.develop || config.host.dev_mode);

        match CommandInstaller::new(&config.host.install_command) {
            Ok(installer) => builder = builder.installer(installer),
            Err(e) => warn!(error = %e, "Package installation disabled"),
        }

        Ok(Self {
            config,
            state_dir,
            manager: builder.build(),
            timers,
        })
    }

    /// Initializes every configured plugin
    pub fn init(&mut self) -> Result<()> {
        self.manager
            .init_plugins(&self.config.plugins)
            .context("Failed to initialize plugins")
    }

    /// Initializes and loads every configured plugin
    pub fn start(&mut self) -> Result<()> {
        self.init()?;
        self.manager
            .load_plugins()
            .context("Failed to load plugins")?;
        self.manager
            .apply_configured_contexts()
            .context("Failed to apply configured contexts")
    }
}
