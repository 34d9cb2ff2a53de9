//! Shared fixtures for lifecycle tests
//!
//! The recording plugin logs every hook call so tests can assert on the
//! exact sequence the host produced.

#![allow(dead_code)]

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use caster_host::domain::{Context, ContextError, PluginId};
use caster_host::plugin::{
    Grammar, ModuleRegistry, PluginBehavior, PluginEntry, PluginEnv, PluginModule, Rule,
};
use caster_host::storage::{PluginConfig, PluginsConfig};

/// Hook log and switches shared by a plugin and its grammars
#[derive(Debug, Default)]
pub struct Recorder {
    calls: Mutex<Vec<String>>,
    fail_load: AtomicBool,
}

impl Recorder {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn record(&self, call: impl Into<String>) {
        self.calls.lock().unwrap().push(call.into());
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    /// Number of recorded calls starting with `prefix`
    pub fn count(&self, prefix: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.starts_with(prefix))
            .count()
    }

    pub fn clear(&self) {
        self.calls.lock().unwrap().clear();
    }

    /// Makes every grammar load hook fail until switched off again
    pub fn set_fail_load(&self, fail: bool) {
        self.fail_load.store(fail, Ordering::SeqCst);
    }
}

pub struct RecordingRule {
    name: String,
    recorder: Arc<Recorder>,
}

impl Rule for RecordingRule {
    fn name(&self) -> &str {
        &self.name
    }

    fn enable(&mut self) -> anyhow::Result<()> {
        self.recorder.record(format!("rule.enable:{}", self.name));
        Ok(())
    }

    fn disable(&mut self) -> anyhow::Result<()> {
        self.recorder.record(format!("rule.disable:{}", self.name));
        Ok(())
    }
}

pub struct RecordingGrammar {
    name: String,
    rules: Vec<RecordingRule>,
    recorder: Arc<Recorder>,
}

impl Grammar for RecordingGrammar {
    fn name(&self) -> &str {
        &self.name
    }

    fn load(&mut self) -> anyhow::Result<()> {
        self.recorder.record(format!("load:{}", self.name));
        if self.recorder.fail_load.load(Ordering::SeqCst) {
            anyhow::bail!("engine rejected {}", self.name);
        }
        Ok(())
    }

    fn unload(&mut self) -> anyhow::Result<()> {
        self.recorder.record(format!("unload:{}", self.name));
        Ok(())
    }

    fn enable(&mut self) -> anyhow::Result<()> {
        self.recorder.record(format!("enable:{}", self.name));
        Ok(())
    }

    fn disable(&mut self) -> anyhow::Result<()> {
        self.recorder.record(format!("disable:{}", self.name));
        Ok(())
    }

    fn set_context(&mut self, context: &Context) -> anyhow::Result<()> {
        self.recorder
            .record(format!("set_context:{}:{}", self.name, context));
        Ok(())
    }

    fn rules(&mut self) -> Vec<&mut dyn Rule> {
        self.rules.iter_mut().map(|r| r as &mut dyn Rule).collect()
    }
}

/// Plugin with a single grammar `main` holding one rule
pub struct Commands {
    recorder: Arc<Recorder>,
    default_context: Result<Option<Context>, ContextError>,
}

impl PluginBehavior for Commands {
    fn grammars(&mut self, _env: &PluginEnv<'_>) -> anyhow::Result<Vec<Box<dyn Grammar>>> {
        self.recorder.record("grammars");
        Ok(vec![Box::new(RecordingGrammar {
            name: "main".to_string(),
            rules: vec![RecordingRule {
                name: "main-rule".to_string(),
                recorder: Arc::clone(&self.recorder),
            }],
            recorder: Arc::clone(&self.recorder),
        })])
    }

    fn get_context(&self, desired: Option<&Context>) -> Result<Option<Context>, ContextError> {
        match desired {
            None => self.default_context.clone(),
            Some(context) => match &self.default_context {
                Err(ContextError::Unsupported) => Err(ContextError::Unsupported),
                _ => Ok(Some(context.clone())),
            },
        }
    }

    fn on_context_applied(&mut self, context: &Context) {
        self.recorder.record(format!("applied:{}", context));
    }
}

pub fn id(s: &str) -> PluginId {
    s.parse().unwrap()
}

/// Module `path` defining `Commands`, optionally with watched sources
pub fn commands_module(
    path: &str,
    recorder: &Arc<Recorder>,
    default_context: Result<Option<Context>, ContextError>,
    source_dir: Option<&Path>,
) -> PluginModule {
    let recorder = Arc::clone(recorder);
    let entry = PluginEntry::new(id(path), "Commands", move || {
        Box::new(Commands {
            recorder: Arc::clone(&recorder),
            default_context: default_context.clone(),
        }) as Box<dyn PluginBehavior>
    });

    let module = PluginModule::new(id(path)).with_entry(entry);
    match source_dir {
        Some(dir) => module.with_source_dir(dir),
        None => module,
    }
}

/// Registry with a single `Commands` module that has no default context
pub fn registry(path: &str, recorder: &Arc<Recorder>) -> ModuleRegistry {
    ModuleRegistry::new().with_module(commands_module(
        path,
        recorder,
        Err(ContextError::Unsupported),
        None,
    ))
}

/// Plugin configuration with empty tables for each ID
pub fn config(ids: &[&str]) -> PluginsConfig {
    PluginsConfig::new(
        Vec::new(),
        ids.iter().map(|s| (id(s), PluginConfig::default())),
    )
}

/// Plugin configuration marking each ID as dev
pub fn dev_config(ids: &[&str]) -> PluginsConfig {
    let toml = ids
        .iter()
        .map(|s| format!("[\"{}\"]\ndev = true\n", s))
        .collect::<String>();
    PluginsConfig::from_toml_str(&toml).unwrap()
}
