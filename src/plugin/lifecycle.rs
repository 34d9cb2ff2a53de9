//! Plugin state machine
//!
//! ```text
//! constructed ──► unloaded ◄──► loaded (enabled ◄──► disabled)
//! ```
//!
//! A plugin owns its grammars only while loaded. Unloading tears the grammars
//! down and a later load asks the implementation for a fresh set, which is
//! how hot reload picks up changed plugin files.

use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::behavior::{PluginBehavior, PluginEnv};
use super::error::PluginError;
use super::grammar::Grammar;
use crate::domain::{Context, ContextError, PluginId, PluginName};
use crate::storage::{PluginConfig, PluginState, StateError};

/// Externally visible plugin status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PluginStatus {
    Unloaded,
    Enabled,
    Disabled,
}

impl PluginStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PluginStatus::Unloaded => "unloaded",
            PluginStatus::Enabled => "enabled",
            PluginStatus::Disabled => "disabled",
        }
    }
}

impl fmt::Display for PluginStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// A lifecycle-managed plugin instance
pub struct Plugin {
    id: PluginId,
    name: PluginName,
    config: PluginConfig,
    behavior: Box<dyn PluginBehavior>,
    grammars: Vec<Box<dyn Grammar>>,
    loaded: bool,
    enabled: bool,
    load_failed: bool,
    context: Option<Context>,
    state: Option<PluginState>,
}

impl Plugin {
    /// Constructs a plugin and resolves its default context
    ///
    /// `defined_in` is the module the implementation was registered in; the
    /// plugin's name is that module plus the class name the implementation
    /// reports. When `state_dir` is set, the plugin's state document is read
    /// from it.
    pub fn new(
        id: PluginId,
        defined_in: PluginId,
        behavior: Box<dyn PluginBehavior>,
        config: PluginConfig,
        state_dir: Option<&Path>,
    ) -> Result<Self, PluginError> {
        let name = PluginName::new(defined_in, behavior.class_name())?;
        let state = state_dir.map(|dir| PluginState::for_plugin(dir, &id));

        let context = match behavior.get_context(None) {
            Ok(context) => context,
            Err(ContextError::Unsupported) => None,
            Err(e) => {
                warn!(plugin = %name, error = %e, "Failed to resolve default context");
                None
            }
        };

        Ok(Self {
            id,
            name,
            config,
            behavior,
            grammars: Vec::new(),
            loaded: false,
            enabled: false,
            load_failed: false,
            context,
            state,
        })
    }

    /// Configuration ID this plugin was created for
    pub fn id(&self) -> &PluginId {
        &self.id
    }

    /// Fully-qualified name (`{module}.{ClassName}`)
    pub fn name(&self) -> &PluginName {
        &self.name
    }

    pub fn config(&self) -> &PluginConfig {
        &self.config
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    /// Whether the most recent load attempt failed
    ///
    /// Cleared by a successful load or an explicit unload.
    pub fn load_failed(&self) -> bool {
        self.load_failed
    }

    pub fn status(&self) -> PluginStatus {
        match (self.loaded, self.enabled) {
            (false, _) => PluginStatus::Unloaded,
            (true, true) => PluginStatus::Enabled,
            (true, false) => PluginStatus::Disabled,
        }
    }

    /// Current context, if any
    pub fn context(&self) -> Option<&Context> {
        self.context.as_ref()
    }

    pub fn grammar_names(&self) -> Vec<&str> {
        self.grammars.iter().map(|g| g.name()).collect()
    }

    /// Loads the plugin's grammars
    ///
    /// Does nothing when already loaded. If a grammar fails to load, the
    /// grammars attached so far are released again and the plugin stays
    /// unloaded.
    pub fn load(&mut self) -> Result<(), PluginError> {
        if self.loaded {
            return Ok(());
        }

        if !self.grammars.is_empty() {
            return Err(PluginError::GrammarsAttached(self.id.clone()));
        }

        info!(plugin = %self.name, "Loading ...");

        let result = self.load_grammars();
        self.load_failed = result.is_err();
        result
    }

    fn load_grammars(&mut self) -> Result<(), PluginError> {
        let env = PluginEnv {
            id: &self.id,
            name: &self.name,
            config: &self.config,
            state: self.state.as_ref(),
        };
        let grammars = self
            .behavior
            .grammars(&env)
            .map_err(|e| PluginError::hook(&self.id, "grammars", e))?;

        for grammar in grammars {
            info!(plugin = %self.name, grammar = grammar.name(), "Adding grammar");
            self.grammars.push(grammar);
        }

        if let Err(e) = self.attach_grammars() {
            self.release_grammars();
            return Err(e);
        }

        self.loaded = true;
        self.enabled = true;
        Ok(())
    }

    fn attach_grammars(&mut self) -> Result<(), PluginError> {
        self.apply_context(None)?;

        for grammar in &mut self.grammars {
            grammar
                .load()
                .map_err(|e| PluginError::hook(&self.id, "load", e))?;
        }

        Ok(())
    }

    /// Drops attached grammars after a failed load, unloading them best-effort
    fn release_grammars(&mut self) {
        for grammar in &mut self.grammars {
            if let Err(e) = grammar.unload() {
                debug!(plugin = %self.name, grammar = grammar.name(), error = %e, "Unload after failed load");
            }
        }
        self.grammars.clear();
    }

    /// Unloads the plugin's grammars
    ///
    /// Does nothing when not loaded. Every grammar's unload hook runs and all
    /// grammars are released even if one hook fails; the first failure is
    /// returned.
    pub fn unload(&mut self) -> Result<(), PluginError> {
        self.load_failed = false;
        if !self.loaded {
            return Ok(());
        }

        info!(plugin = %self.name, "Unloading ...");

        let mut first_error = None;
        for grammar in &mut self.grammars {
            if let Err(e) = grammar.unload() {
                warn!(plugin = %self.name, grammar = grammar.name(), error = %e, "Grammar unload failed");
                first_error.get_or_insert(PluginError::hook(&self.id, "unload", e));
            }
        }

        self.grammars.clear();
        self.loaded = false;
        self.enabled = false;

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Enables every grammar; does nothing unless loaded
    pub fn enable(&mut self) -> Result<(), PluginError> {
        if !self.loaded {
            return Ok(());
        }

        for grammar in &mut self.grammars {
            info!(plugin = %self.name, grammar = grammar.name(), "Enabling grammar");
            grammar
                .enable()
                .map_err(|e| PluginError::hook(&self.id, "enable", e))?;
        }

        self.enabled = true;
        Ok(())
    }

    /// Disables every rule, then every grammar; does nothing unless loaded
    pub fn disable(&mut self) -> Result<(), PluginError> {
        if !self.loaded {
            return Ok(());
        }

        for grammar in &mut self.grammars {
            info!(plugin = %self.name, grammar = grammar.name(), "Disabling grammar");
            for rule in grammar.rules() {
                rule.disable()
                    .map_err(|e| PluginError::hook(&self.id, "disable", e))?;
            }
            grammar
                .disable()
                .map_err(|e| PluginError::hook(&self.id, "disable", e))?;
        }

        self.enabled = false;
        Ok(())
    }

    /// Stores `context` (when given) and pushes the current context to all grammars
    ///
    /// Without a context, supplied or default, this does nothing and the
    /// grammars keep whatever context they had.
    pub fn apply_context(&mut self, context: Option<Context>) -> Result<(), PluginError> {
        if let Some(context) = context {
            self.context = Some(context);
        }

        let Some(current) = &self.context else {
            return Ok(());
        };

        info!(plugin = %self.name, context = %current, "Applying context");
        for grammar in &mut self.grammars {
            grammar
                .set_context(current)
                .map_err(|e| PluginError::hook(&self.id, "set_context", e))?;
        }

        self.behavior.on_context_applied(current);
        Ok(())
    }

    /// Asks the implementation for a context; see [`PluginBehavior::get_context`]
    pub fn get_context(&self, desired: Option<&Context>) -> Result<Option<Context>, ContextError> {
        self.behavior.get_context(desired)
    }

    /// Unloads and reloads every grammar in place, keeping the same grammars
    pub fn reload(&mut self) -> Result<(), PluginError> {
        for grammar in &mut self.grammars {
            debug!(plugin = %self.name, grammar = grammar.name(), "Reloading grammar");
            grammar
                .unload()
                .map_err(|e| PluginError::hook(&self.id, "unload", e))?;
            grammar
                .load()
                .map_err(|e| PluginError::hook(&self.id, "load", e))?;
        }
        Ok(())
    }

    /// Persisted state handle, when a state directory is configured
    pub fn state_handle(&self) -> Option<&PluginState> {
        self.state.as_ref()
    }

    /// In-memory state data
    pub fn state(&self) -> Option<&serde_yaml::Value> {
        self.state.as_ref().and_then(|state| state.data())
    }

    /// Replaces the in-memory state data (not written until persisted)
    pub fn set_state(&mut self, data: Option<serde_yaml::Value>) -> Result<(), PluginError> {
        let state = self
            .state
            .as_mut()
            .ok_or_else(|| StateError::NotConfigured(self.id.clone()))?;
        state.set_data(data);
        Ok(())
    }

    /// Writes the in-memory state to the plugin's state file
    pub fn persist_state(&self) -> Result<(), PluginError> {
        let state = self
            .state
            .as_ref()
            .ok_or_else(|| StateError::NotConfigured(self.id.clone()))?;
        state.persist()?;
        Ok(())
    }
}

impl fmt::Debug for Plugin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Plugin")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("status", &self.status())
            .field("grammars", &self.grammar_names())
            .field("context", &self.context)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;
    use tempfile::TempDir;

    use crate::plugin::grammar::Rule;

    /// Shared call log so tests can inspect hooks after grammars are dropped
    type Calls = Rc<RefCell<Vec<String>>>;

    struct TestRule {
        name: String,
        calls: Calls,
    }

    impl Rule for TestRule {
        fn name(&self) -> &str {
            &self.name
        }

        fn enable(&mut self) -> anyhow::Result<()> {
            self.calls.borrow_mut().push(format!("rule.enable:{}", self.name));
            Ok(())
        }

        fn disable(&mut self) -> anyhow::Result<()> {
            self.calls.borrow_mut().push(format!("rule.disable:{}", self.name));
            Ok(())
        }
    }

    struct TestGrammar {
        name: String,
        rules: Vec<TestRule>,
        calls: Calls,
        fail_load: bool,
    }

    impl TestGrammar {
        fn record(&self, hook: &str) {
            self.calls.borrow_mut().push(format!("{}:{}", hook, self.name));
        }
    }

    impl Grammar for TestGrammar {
        fn name(&self) -> &str {
            &self.name
        }

        fn load(&mut self) -> anyhow::Result<()> {
            self.record("load");
            if self.fail_load {
                anyhow::bail!("engine rejected grammar");
            }
            Ok(())
        }

        fn unload(&mut self) -> anyhow::Result<()> {
            self.record("unload");
            Ok(())
        }

        fn enable(&mut self) -> anyhow::Result<()> {
            self.record("enable");
            Ok(())
        }

        fn disable(&mut self) -> anyhow::Result<()> {
            self.record("disable");
            Ok(())
        }

        fn set_context(&mut self, context: &Context) -> anyhow::Result<()> {
            self.calls
                .borrow_mut()
                .push(format!("set_context:{}:{}", self.name, context));
            Ok(())
        }

        fn rules(&mut self) -> Vec<&mut dyn Rule> {
            self.rules.iter_mut().map(|r| r as &mut dyn Rule).collect()
        }
    }

    struct Commands {
        calls: Calls,
        default_context: Result<Option<Context>, ContextError>,
        grammar_names: Vec<&'static str>,
        failing_grammar: Option<&'static str>,
        applied: Rc<RefCell<Vec<Context>>>,
    }

    impl PluginBehavior for Commands {
        fn grammars(&mut self, _env: &PluginEnv<'_>) -> anyhow::Result<Vec<Box<dyn Grammar>>> {
            self.calls.borrow_mut().push("grammars".to_string());
            Ok(self
                .grammar_names
                .iter()
                .map(|name| {
                    Box::new(TestGrammar {
                        name: name.to_string(),
                        rules: vec![TestRule {
                            name: format!("{}-rule", name),
                            calls: self.calls.clone(),
                        }],
                        calls: self.calls.clone(),
                        fail_load: self.failing_grammar == Some(*name),
                    }) as Box<dyn Grammar>
                })
                .collect())
        }

        fn get_context(&self, desired: Option<&Context>) -> Result<Option<Context>, ContextError> {
            match desired {
                None => self.default_context.clone(),
                Some(context) => Ok(Some(context.clone())),
            }
        }

        fn on_context_applied(&mut self, context: &Context) {
            self.applied.borrow_mut().push(context.clone());
        }
    }

    struct Fixture {
        plugin: Plugin,
        calls: Calls,
        applied: Rc<RefCell<Vec<Context>>>,
    }

    fn fixture(default_context: Result<Option<Context>, ContextError>) -> Fixture {
        fixture_with(default_context, None, None)
    }

    fn fixture_with(
        default_context: Result<Option<Context>, ContextError>,
        failing_grammar: Option<&'static str>,
        state_dir: Option<&Path>,
    ) -> Fixture {
        let calls: Calls = Rc::default();
        let applied = Rc::default();
        let behavior = Commands {
            calls: Rc::clone(&calls),
            default_context,
            grammar_names: vec!["editing", "navigation"],
            failing_grammar,
            applied: Rc::clone(&applied),
        };
        let id: PluginId = "pkg_a.cmds".parse().unwrap();
        let plugin = Plugin::new(
            id.clone(),
            id,
            Box::new(behavior),
            PluginConfig::default(),
            state_dir,
        )
        .unwrap();

        Fixture {
            plugin,
            calls,
            applied,
        }
    }

    fn calls(fixture: &Fixture) -> Vec<String> {
        fixture.calls.borrow().clone()
    }

    #[test]
    fn name_is_module_plus_class() {
        let f = fixture(Err(ContextError::Unsupported));
        assert_eq!(f.plugin.name().to_string(), "pkg_a.cmds.Commands");
        assert_eq!(f.plugin.id().as_str(), "pkg_a.cmds");
        assert_eq!(f.plugin.status(), PluginStatus::Unloaded);
    }

    #[test]
    fn unsupported_default_context_leaves_context_empty() {
        let f = fixture(Err(ContextError::Unsupported));
        assert!(f.plugin.context().is_none());
    }

    #[test]
    fn default_context_is_resolved_at_construction() {
        let f = fixture(Ok(Some(Context::new("editor"))));
        assert_eq!(f.plugin.context(), Some(&Context::new("editor")));
    }

    #[test]
    fn load_attaches_applies_context_then_loads() {
        let mut f = fixture(Ok(Some(Context::new("editor"))));
        f.plugin.load().unwrap();

        assert_eq!(
            calls(&f),
            vec![
                "grammars",
                "set_context:editing:editor",
                "set_context:navigation:editor",
                "load:editing",
                "load:navigation",
            ]
        );
        assert_eq!(f.plugin.status(), PluginStatus::Enabled);
        assert_eq!(f.plugin.grammar_names(), vec!["editing", "navigation"]);
        assert_eq!(f.applied.borrow().len(), 1);
    }

    #[test]
    fn second_load_is_a_noop() {
        let mut f = fixture(Err(ContextError::Unsupported));
        f.plugin.load().unwrap();
        let after_first = calls(&f);

        f.plugin.load().unwrap();
        assert_eq!(calls(&f), after_first);
        assert_eq!(f.plugin.grammar_names().len(), 2);
    }

    #[test]
    fn unload_of_unloaded_plugin_is_a_noop() {
        let mut f = fixture(Err(ContextError::Unsupported));
        f.plugin.unload().unwrap();
        assert!(calls(&f).is_empty());
    }

    #[test]
    fn unload_releases_grammars() {
        let mut f = fixture(Err(ContextError::Unsupported));
        f.plugin.load().unwrap();
        f.plugin.unload().unwrap();

        assert!(f.plugin.grammar_names().is_empty());
        assert_eq!(f.plugin.status(), PluginStatus::Unloaded);
        assert!(calls(&f).ends_with(&["unload:editing".to_string(), "unload:navigation".to_string()]));
    }

    #[test]
    fn unload_then_load_rebuilds_grammars() {
        let mut f = fixture(Err(ContextError::Unsupported));
        f.plugin.load().unwrap();
        f.plugin.unload().unwrap();
        f.plugin.load().unwrap();

        let grammars_calls = calls(&f).iter().filter(|c| *c == "grammars").count();
        assert_eq!(grammars_calls, 2);
        assert_eq!(f.plugin.grammar_names().len(), 2);
    }

    #[test]
    fn failed_load_leaves_plugin_unloaded_and_retryable() {
        let mut f = fixture_with(Err(ContextError::Unsupported), Some("navigation"), None);

        let err = f.plugin.load().unwrap_err();
        assert!(matches!(err, PluginError::Hook { hook: "load", .. }));
        assert_eq!(f.plugin.status(), PluginStatus::Unloaded);
        assert!(f.plugin.grammar_names().is_empty());

        assert!(f.plugin.load_failed());

        // Retrying hits the same hook failure rather than the double-load guard
        let err = f.plugin.load().unwrap_err();
        assert!(matches!(err, PluginError::Hook { .. }));

        f.plugin.unload().unwrap();
        assert!(!f.plugin.load_failed());
    }

    #[test]
    fn enable_and_disable_require_loaded() {
        let mut f = fixture(Err(ContextError::Unsupported));
        f.plugin.enable().unwrap();
        f.plugin.disable().unwrap();
        assert!(calls(&f).is_empty());
    }

    #[test]
    fn disable_disables_rules_before_grammar() {
        let mut f = fixture(Err(ContextError::Unsupported));
        f.plugin.load().unwrap();
        f.calls.borrow_mut().clear();

        f.plugin.disable().unwrap();
        assert_eq!(
            calls(&f),
            vec![
                "rule.disable:editing-rule",
                "disable:editing",
                "rule.disable:navigation-rule",
                "disable:navigation",
            ]
        );
        assert_eq!(f.plugin.status(), PluginStatus::Disabled);

        f.plugin.enable().unwrap();
        assert_eq!(f.plugin.status(), PluginStatus::Enabled);
    }

    #[test]
    fn apply_context_without_any_context_is_silent() {
        let mut f = fixture(Err(ContextError::Unsupported));
        f.plugin.load().unwrap();
        f.calls.borrow_mut().clear();

        f.plugin.apply_context(None).unwrap();
        assert!(calls(&f).is_empty());
        assert!(f.applied.borrow().is_empty());
    }

    #[test]
    fn apply_context_replaces_and_pushes() {
        let mut f = fixture(Ok(None));
        f.plugin.load().unwrap();

        f.plugin.apply_context(Some(Context::new("terminal"))).unwrap();
        assert_eq!(f.plugin.context(), Some(&Context::new("terminal")));
        assert!(calls(&f).contains(&"set_context:editing:terminal".to_string()));
        assert_eq!(*f.applied.borrow(), vec![Context::new("terminal")]);
    }

    #[test]
    fn context_survives_reload() {
        let mut f = fixture(Ok(None));
        f.plugin.load().unwrap();
        f.plugin.apply_context(Some(Context::new("terminal"))).unwrap();
        f.plugin.unload().unwrap();
        f.calls.borrow_mut().clear();

        f.plugin.load().unwrap();
        assert!(calls(&f).contains(&"set_context:navigation:terminal".to_string()));
    }

    #[test]
    fn reload_cycles_existing_grammars() {
        let mut f = fixture(Err(ContextError::Unsupported));
        f.plugin.load().unwrap();
        f.calls.borrow_mut().clear();

        f.plugin.reload().unwrap();
        assert_eq!(
            calls(&f),
            vec![
                "unload:editing",
                "load:editing",
                "unload:navigation",
                "load:navigation",
            ]
        );
    }

    #[test]
    fn state_without_state_dir() {
        let mut f = fixture(Err(ContextError::Unsupported));
        assert!(f.plugin.state().is_none());
        assert!(matches!(
            f.plugin.persist_state(),
            Err(PluginError::State(StateError::NotConfigured(_)))
        ));
        assert!(f.plugin.set_state(None).is_err());
    }

    #[test]
    fn persisted_state_is_visible_to_new_instance() {
        let dir = TempDir::new().unwrap();
        let data: serde_yaml::Value = serde_yaml::from_str("spoken: 12\n").unwrap();

        let mut f = fixture_with(Err(ContextError::Unsupported), None, Some(dir.path()));
        f.plugin.set_state(Some(data.clone())).unwrap();
        f.plugin.persist_state().unwrap();

        let fresh = fixture_with(Err(ContextError::Unsupported), None, Some(dir.path()));
        assert_eq!(fresh.plugin.state(), Some(&data));
    }
}
