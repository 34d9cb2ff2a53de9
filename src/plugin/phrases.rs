//! Built-in phrase plugin
//!
//! Turns a directory of YAML phrase files into grammars. Each `*.yaml` or
//! `*.yml` file becomes one grammar named after the file stem, with one rule
//! per `spoken phrase: output text` entry:
//!
//! ```yaml
//! "say hello": "Hello, world!"
//! "sign off": "Best regards"
//! ```
//!
//! The grammars only track their engine-facing state and log transitions,
//! which makes the plugin useful for exercising the host without a speech
//! engine attached.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context as _, Result};
use tracing::{debug, info};

use super::behavior::{PluginBehavior, PluginEnv};
use super::grammar::{Grammar, Rule};
use super::module::{PluginEntry, PluginModule};
use crate::domain::{Context, ContextError, PluginId};

/// Module path the phrase plugin is registered under
pub const PHRASES_MODULE: &str = "caster.phrases";

/// Builds the phrase plugin module reading phrase files from `dir`
pub fn module(dir: PathBuf) -> Result<PluginModule> {
    let path: PluginId = PHRASES_MODULE.parse()?;
    let entry_dir = dir.clone();
    let entry = PluginEntry::new(path.clone(), "Phrases", move || {
        Box::new(Phrases::new(entry_dir.clone())) as Box<dyn PluginBehavior>
    });

    Ok(PluginModule::new(path)
        .with_source_dir(dir)
        .with_source_extensions(["yaml", "yml"])
        .with_entry(entry))
}

/// Plugin whose grammars come from phrase files
#[derive(Debug, Clone)]
pub struct Phrases {
    dir: PathBuf,
}

impl Phrases {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn phrase_files(&self) -> Result<Vec<PathBuf>> {
        if !self.dir.is_dir() {
            debug!(dir = %self.dir.display(), "No phrases directory");
            return Ok(Vec::new());
        }

        let mut files = Vec::new();
        for entry in fs::read_dir(&self.dir)
            .with_context(|| format!("Failed to read directory: {}", self.dir.display()))?
        {
            let path = entry?.path();
            let is_yaml = path
                .extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| e == "yaml" || e == "yml");
            if is_yaml && path.is_file() {
                files.push(path);
            }
        }

        files.sort();
        Ok(files)
    }
}

impl PluginBehavior for Phrases {
    fn class_name(&self) -> &str {
        "Phrases"
    }

    fn grammars(&mut self, env: &PluginEnv<'_>) -> Result<Vec<Box<dyn Grammar>>> {
        let mut grammars: Vec<Box<dyn Grammar>> = Vec::new();
        for path in self.phrase_files()? {
            let grammar = PhraseGrammar::from_file(&path)?;
            debug!(plugin = %env.id, grammar = grammar.name(), rules = grammar.rules.len(), "Parsed phrase file");
            grammars.push(Box::new(grammar));
        }
        Ok(grammars)
    }

    /// Phrases have no default context and accept any context asked for
    fn get_context(&self, desired: Option<&Context>) -> Result<Option<Context>, ContextError> {
        Ok(desired.cloned())
    }
}

/// One phrase file loaded as a grammar
#[derive(Debug, Clone)]
pub struct PhraseGrammar {
    name: String,
    rules: Vec<PhraseRule>,
    loaded: bool,
    enabled: bool,
    context: Option<Context>,
}

impl PhraseGrammar {
    pub fn new(name: impl Into<String>, phrases: BTreeMap<String, String>) -> Self {
        Self {
            name: name.into(),
            rules: phrases
                .into_iter()
                .map(|(spoken, output)| PhraseRule {
                    spoken,
                    output,
                    enabled: true,
                })
                .collect(),
            loaded: false,
            enabled: false,
            context: None,
        }
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read phrase file: {}", path.display()))?;
        let phrases: Option<BTreeMap<String, String>> = serde_yaml::from_str(&content)
            .with_context(|| format!("Invalid phrase file: {}", path.display()))?;

        let name = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("phrases");
        Ok(Self::new(name, phrases.unwrap_or_default()))
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn context(&self) -> Option<&Context> {
        self.context.as_ref()
    }

    pub fn phrase_rules(&self) -> &[PhraseRule] {
        &self.rules
    }
}

impl Grammar for PhraseGrammar {
    fn name(&self) -> &str {
        &self.name
    }

    fn load(&mut self) -> Result<()> {
        info!(grammar = %self.name, rules = self.rules.len(), "Grammar loaded");
        self.loaded = true;
        self.enabled = true;
        Ok(())
    }

    fn unload(&mut self) -> Result<()> {
        info!(grammar = %self.name, "Grammar unloaded");
        self.loaded = false;
        self.enabled = false;
        Ok(())
    }

    fn enable(&mut self) -> Result<()> {
        self.enabled = true;
        Ok(())
    }

    fn disable(&mut self) -> Result<()> {
        self.enabled = false;
        Ok(())
    }

    fn set_context(&mut self, context: &Context) -> Result<()> {
        debug!(grammar = %self.name, context = %context, "Grammar context set");
        self.context = Some(context.clone());
        Ok(())
    }

    fn rules(&mut self) -> Vec<&mut dyn Rule> {
        self.rules.iter_mut().map(|r| r as &mut dyn Rule).collect()
    }
}

/// A spoken phrase mapped to the text it produces
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhraseRule {
    pub spoken: String,
    pub output: String,
    enabled: bool,
}

impl PhraseRule {
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }
}

impl Rule for PhraseRule {
    fn name(&self) -> &str {
        &self.spoken
    }

    fn enable(&mut self) -> Result<()> {
        self.enabled = true;
        Ok(())
    }

    fn disable(&mut self) -> Result<()> {
        self.enabled = false;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::PluginName;
    use crate::storage::PluginConfig;
    use tempfile::TempDir;

    fn env_parts() -> (PluginId, PluginName, PluginConfig) {
        let id: PluginId = PHRASES_MODULE.parse().unwrap();
        let name = PluginName::new(id.clone(), "Phrases").unwrap();
        (id, name, PluginConfig::default())
    }

    #[test]
    fn module_defines_phrases_plugin() {
        let module = module(PathBuf::from("/tmp/phrases")).unwrap();
        let entry = module.defined_entry().unwrap();
        assert_eq!(entry.class_name(), "Phrases");
        assert_eq!(entry.instantiate().class_name(), "Phrases");
        assert_eq!(module.source_dir(), Some(Path::new("/tmp/phrases")));
        assert!(module.source_filter().matches(Path::new("/tmp/phrases/greetings.yaml")));
        assert!(!module.source_filter().matches(Path::new("/tmp/phrases/greetings.yaml~")));
    }

    #[test]
    fn each_yaml_file_is_a_grammar() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("greetings.yaml"), "\"say hello\": \"Hello\"\n").unwrap();
        fs::write(dir.path().join("email.yml"), "\"sign off\": \"Regards\"\nthanks: Thanks\n").unwrap();
        fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let (id, name, config) = env_parts();
        let env = PluginEnv {
            id: &id,
            name: &name,
            config: &config,
            state: None,
        };
        let grammars = Phrases::new(dir.path()).grammars(&env).unwrap();

        let names: Vec<&str> = grammars.iter().map(|g| g.name()).collect();
        assert_eq!(names, vec!["email", "greetings"]);
    }

    #[test]
    fn missing_directory_yields_no_grammars() {
        let dir = TempDir::new().unwrap();
        let (id, name, config) = env_parts();
        let env = PluginEnv {
            id: &id,
            name: &name,
            config: &config,
            state: None,
        };

        let grammars = Phrases::new(dir.path().join("absent")).grammars(&env).unwrap();
        assert!(grammars.is_empty());
    }

    #[test]
    fn malformed_phrase_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("bad.yaml"), "- not\n- a mapping\n").unwrap();

        let (id, name, config) = env_parts();
        let env = PluginEnv {
            id: &id,
            name: &name,
            config: &config,
            state: None,
        };
        let err = Phrases::new(dir.path()).grammars(&env).err().unwrap();
        assert!(format!("{:#}", err).contains("bad.yaml"));
    }

    #[test]
    fn empty_phrase_file_has_no_rules() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("empty.yaml");
        fs::write(&path, "").unwrap();

        let grammar = PhraseGrammar::from_file(&path).unwrap();
        assert_eq!(grammar.name(), "empty");
        assert!(grammar.phrase_rules().is_empty());
    }

    #[test]
    fn grammar_tracks_engine_state() {
        let mut phrases = BTreeMap::new();
        phrases.insert("say hello".to_string(), "Hello".to_string());
        let mut grammar = PhraseGrammar::new("greetings", phrases);

        grammar.set_context(&Context::new("editor")).unwrap();
        grammar.load().unwrap();
        assert!(grammar.is_loaded() && grammar.is_enabled());
        assert_eq!(grammar.context(), Some(&Context::new("editor")));

        for rule in grammar.rules() {
            rule.disable().unwrap();
        }
        grammar.disable().unwrap();
        assert!(!grammar.is_enabled());
        assert!(grammar.phrase_rules().iter().all(|r| !r.is_enabled()));

        grammar.unload().unwrap();
        assert!(!grammar.is_loaded());
    }

    #[test]
    fn any_desired_context_is_accepted() {
        let phrases = Phrases::new("/nowhere");
        assert_eq!(phrases.get_context(None), Ok(None));
        assert_eq!(
            phrases.get_context(Some(&Context::new("terminal"))),
            Ok(Some(Context::new("terminal")))
        );
    }
}
