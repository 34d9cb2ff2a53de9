//! Plugin manager
//!
//! Owns every configured plugin, keyed by its configuration identifier, and
//! the file watcher used for hot reload in dev mode. Lookup misses on the
//! per-plugin operations are [`PluginError::NotFound`].

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Serialize;
use tracing::{debug, error, info, warn};

use super::error::PluginError;
use super::installer::{DisabledInstaller, PackageInstaller};
use super::lifecycle::{Plugin, PluginStatus};
use super::module::ModuleSource;
use super::scheduler::{NoopScheduler, Scheduler, Timer};
use super::watch::{FileWatcher, ReloadTrigger, SourceFilter, WatchedFile};
use crate::domain::{Context, ContextError, PluginId};
use crate::storage::{PluginConfig, PluginsConfig};

/// Interval between watch ticks unless configured otherwise
pub const DEFAULT_WATCH_INTERVAL: Duration = Duration::from_secs(10);

/// Outcome of one watch tick
#[derive(Debug, Default)]
pub struct WatchReport {
    /// Plugins reloaded, one entry per changed file and dependent
    pub reloaded: Vec<ReloadTrigger>,

    /// Reloads that failed; the plugin is left unloaded
    pub failed: Vec<(ReloadTrigger, PluginError)>,
}

impl WatchReport {
    pub fn is_empty(&self) -> bool {
        self.reloaded.is_empty() && self.failed.is_empty()
    }
}

/// Summary of a managed plugin for display
#[derive(Debug, Clone, Serialize)]
pub struct PluginSummary {
    pub id: PluginId,
    pub name: String,
    pub status: PluginStatus,
    pub context: Option<Context>,
    pub grammars: Vec<String>,
    pub dev: bool,
}

pub struct PluginManagerBuilder {
    modules: Box<dyn ModuleSource>,
    installer: Box<dyn PackageInstaller>,
    scheduler: Box<dyn Scheduler>,
    state_dir: Option<PathBuf>,
    watch_interval: Duration,
    force_dev: bool,
}

impl PluginManagerBuilder {
    pub fn installer(mut self, installer: impl PackageInstaller + 'static) -> Self {
        self.installer = Box::new(installer);
        self
    }

    pub fn scheduler(mut self, scheduler: impl Scheduler + 'static) -> Self {
        self.scheduler = Box::new(scheduler);
        self
    }

    /// Directory holding `<identifier>.state` files
    pub fn state_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.state_dir = Some(dir.into());
        self
    }

    pub fn watch_interval(mut self, interval: Duration) -> Self {
        self.watch_interval = interval;
        self
    }

    /// Treats every plugin as dev, whether or not its config has a `dev` key
    pub fn force_dev(mut self, force: bool) -> Self {
        self.force_dev = force;
        self
    }

    pub fn build(self) -> PluginManager {
        PluginManager {
            initialized: false,
            config: PluginsConfig::default(),
            modules: self.modules,
            installer: self.installer,
            scheduler: self.scheduler,
            state_dir: self.state_dir,
            watch_interval: self.watch_interval,
            force_dev: self.force_dev,
            timer_registered: false,
            plugins: BTreeMap::new(),
            watcher: FileWatcher::new(),
        }
    }
}

pub struct PluginManager {
    initialized: bool,
    config: PluginsConfig,
    modules: Box<dyn ModuleSource>,
    installer: Box<dyn PackageInstaller>,
    scheduler: Box<dyn Scheduler>,
    state_dir: Option<PathBuf>,
    watch_interval: Duration,
    force_dev: bool,
    timer_registered: bool,
    plugins: BTreeMap<PluginId, Plugin>,
    watcher: FileWatcher,
}

impl PluginManager {
    /// Starts building a manager that imports plugin modules from `modules`
    ///
    /// Without further configuration, package installation fails, timers are
    /// dropped and plugins have no persisted state.
    pub fn builder(modules: impl ModuleSource + 'static) -> PluginManagerBuilder {
        PluginManagerBuilder {
            modules: Box::new(modules),
            installer: Box::new(DisabledInstaller),
            scheduler: Box::new(NoopScheduler),
            state_dir: None,
            watch_interval: DEFAULT_WATCH_INTERVAL,
            force_dev: false,
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Installs packages and initializes every configured plugin
    ///
    /// Only the first successful call has any effect. Package install and
    /// module import failures are logged and skipped; a plugin violating its
    /// naming contract aborts initialization, leaving the manager
    /// uninitialized. Files watched before the failure still get their timer.
    pub fn init_plugins(&mut self, config: &PluginsConfig) -> Result<(), PluginError> {
        if self.initialized {
            debug!("Plugins already initialized");
            return Ok(());
        }
        self.config = config.clone();

        for package in self.config.packages() {
            if let Err(e) = self.installer.install_package(package) {
                error!(package = %package.name, error = %format!("{:#}", e), "Failed to install package");
            }
        }

        let entries: Vec<(PluginId, PluginConfig)> = self
            .config
            .plugins()
            .map(|(id, cfg)| (id.clone(), cfg.clone()))
            .collect();
        let result = entries
            .into_iter()
            .try_for_each(|(id, cfg)| self.init_plugin(&id, cfg));

        if !self.watcher.is_empty() && !self.timer_registered {
            info!(
                files = self.watcher.len(),
                interval_secs = self.watch_interval.as_secs(),
                "Watching plugin files"
            );
            self.scheduler
                .create_timer(Timer::WatchPluginFiles, self.watch_interval);
            self.timer_registered = true;
        }

        result?;
        self.initialized = true;
        Ok(())
    }

    /// Imports the module named by `id` and constructs its plugin
    ///
    /// Does nothing if a plugin with this identifier already exists.
    pub fn init_plugin(&mut self, id: &PluginId, config: PluginConfig) -> Result<(), PluginError> {
        if self.plugins.contains_key(id) {
            debug!(plugin = %id, "Plugin already initialized");
            return Ok(());
        }

        let dev = self.force_dev || config.is_dev();

        let module = match self.modules.import(id) {
            Ok(module) => module,
            Err(e) => {
                error!(plugin = %id, error = %e, "Failed to import plugin module");
                return Ok(());
            }
        };

        let Some(entry) = module.defined_entry() else {
            warn!(plugin = %id, "Module does not define a plugin");
            return Ok(());
        };

        let plugin = Plugin::new(
            id.clone(),
            entry.defined_in().clone(),
            entry.instantiate(),
            config,
            self.state_dir.as_deref(),
        )?;

        let name = plugin.name();
        if !name.belongs_to(id) || name.class_name() != entry.class_name() {
            return Err(PluginError::NameMismatch {
                expected: format!("{}.{}", id, entry.class_name()),
                actual: name.to_string(),
            });
        }

        info!(plugin = %id, name = %plugin.name(), dev, "Initialized plugin");
        self.plugins.insert(id.clone(), plugin);

        if dev {
            match module.source_dir() {
                Some(dir) => {
                    if let Err(e) = self.watch_plugin(id, dir, module.source_filter()) {
                        error!(plugin = %id, error = %e, "Failed to watch plugin files");
                    }
                }
                None => warn!(plugin = %id, "Dev mode requested but module has no source directory"),
            }
        }

        Ok(())
    }

    /// Loads every plugin, stopping at the first failure
    pub fn load_plugins(&mut self) -> Result<(), PluginError> {
        for plugin in self.plugins.values_mut() {
            plugin.load()?;
        }
        Ok(())
    }

    /// Unloads every plugin, stopping at the first failure
    pub fn unload_plugins(&mut self) -> Result<(), PluginError> {
        for plugin in self.plugins.values_mut() {
            plugin.unload()?;
        }
        Ok(())
    }

    /// Applies the `context` entry of each plugin's configuration, if present
    pub fn apply_configured_contexts(&mut self) -> Result<(), PluginError> {
        for (id, plugin) in &mut self.plugins {
            if let Some(context) = plugin.config().initial_context() {
                debug!(plugin = %id, context = %context, "Applying configured context");
                plugin.apply_context(Some(context))?;
            }
        }
        Ok(())
    }

    pub fn apply_context(&mut self, id: &PluginId, context: Option<Context>) -> Result<(), PluginError> {
        self.find_mut(id)?.apply_context(context)
    }

    /// Asks a plugin for a context
    ///
    /// A plugin without context support reports
    /// [`PluginError::ContextUnsupported`].
    pub fn get_context(
        &self,
        id: &PluginId,
        desired: Option<&Context>,
    ) -> Result<Option<Context>, PluginError> {
        let plugin = self.plugin(id).ok_or_else(|| PluginError::NotFound(id.clone()))?;
        plugin.get_context(desired).map_err(|e| match e {
            ContextError::Unsupported => PluginError::ContextUnsupported(id.clone()),
            ContextError::NoMatch(desired) => PluginError::ContextNoMatch {
                plugin: id.clone(),
                desired,
            },
        })
    }

    pub fn enable_plugin(&mut self, id: &PluginId) -> Result<(), PluginError> {
        self.find_mut(id)?.enable()
    }

    pub fn disable_plugin(&mut self, id: &PluginId) -> Result<(), PluginError> {
        self.find_mut(id)?.disable()
    }

    /// Hot-reloads a plugin: unload, then load with freshly built grammars
    ///
    /// A plugin that was disabled before is disabled again afterwards. An
    /// unloaded plugin is left alone unless its last load failed, in which
    /// case the load is retried. Returns whether a reload happened.
    pub fn reload_plugin(&mut self, id: &PluginId) -> Result<bool, PluginError> {
        let plugin = self.find_mut(id)?;
        if !plugin.is_loaded() && !plugin.load_failed() {
            debug!(plugin = %id, "Skipping reload of unloaded plugin");
            return Ok(false);
        }
        let was_disabled = plugin.status() == PluginStatus::Disabled;

        info!(plugin = %id, "Reloading");
        plugin.unload()?;
        plugin.load()?;
        if was_disabled {
            plugin.disable()?;
        }
        Ok(true)
    }

    /// Adds every source file under `dir` to the watch set for `id`
    pub fn watch_plugin(
        &mut self,
        id: &PluginId,
        dir: &Path,
        filter: &SourceFilter,
    ) -> Result<usize, PluginError> {
        self.watcher
            .watch(id, dir, filter)
            .map_err(|source| PluginError::Watch {
                plugin: id.clone(),
                source,
            })
    }

    /// Runs the callback for a timer registered with the scheduler
    pub fn fire(&mut self, timer: Timer) -> WatchReport {
        match timer {
            Timer::WatchPluginFiles => self.watch_tick(),
        }
    }

    /// Re-digests watched files and reloads the plugins depending on changed ones
    ///
    /// A failed reload is logged and reported; the remaining reloads still run.
    pub fn watch_tick(&mut self) -> WatchReport {
        let mut report = WatchReport::default();

        for trigger in self.watcher.tick() {
            info!(file = %trigger.file.display(), plugin = %trigger.plugin, "Plugin file changed");
            match self.reload_plugin(&trigger.plugin) {
                Ok(true) => report.reloaded.push(trigger),
                Ok(false) => {}
                Err(e) => {
                    error!(plugin = %trigger.plugin, error = %e, "Reload failed");
                    report.failed.push((trigger, e));
                }
            }
        }

        report
    }

    pub fn plugin(&self, id: &PluginId) -> Option<&Plugin> {
        self.plugins.get(id)
    }

    pub fn plugin_mut(&mut self, id: &PluginId) -> Option<&mut Plugin> {
        self.plugins.get_mut(id)
    }

    fn find_mut(&mut self, id: &PluginId) -> Result<&mut Plugin, PluginError> {
        self.plugins
            .get_mut(id)
            .ok_or_else(|| PluginError::NotFound(id.clone()))
    }

    /// Managed plugins, ordered by identifier
    pub fn plugins(&self) -> impl Iterator<Item = (&PluginId, &Plugin)> {
        self.plugins.iter()
    }

    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }

    /// Configuration fragment the plugin was initialized with
    pub fn get_config(&self, id: &PluginId) -> Option<&PluginConfig> {
        self.config.get(id)
    }

    pub fn watched_files(&self) -> impl Iterator<Item = (&Path, &WatchedFile)> {
        self.watcher.files()
    }

    pub fn is_watched(&self, id: &PluginId) -> bool {
        self.watcher.is_watching(id)
    }

    pub fn summaries(&self) -> Vec<PluginSummary> {
        self.plugins
            .iter()
            .map(|(id, plugin)| PluginSummary {
                id: id.clone(),
                name: plugin.name().to_string(),
                status: plugin.status(),
                context: plugin.context().cloned(),
                grammars: plugin.grammar_names().into_iter().map(String::from).collect(),
                dev: self.is_watched(id),
            })
            .collect()
    }
}

impl Drop for PluginManager {
    fn drop(&mut self) {
        for (id, plugin) in &mut self.plugins {
            if let Err(e) = plugin.unload() {
                error!(plugin = %id, error = %e, "Failed to unload plugin during shutdown");
            }
        }
    }
}
