//! The `init` command: create a configuration directory

use std::fs;
use std::path::Path;

use anyhow::{Context as _, Result};

use super::output::Output;
use crate::storage::{Config, PluginsConfig};

const PLUGINS_TEMPLATE: &str = r#"# Plugin configuration
#
# One table per plugin module. Quote the module path, since TOML would
# otherwise read dots as nested tables. A `dev` key enables hot reload.
#
# packages = [{ name = "some-package" }]

["caster.phrases"]
# dev = true
# context = "editor"
"#;

pub fn init(output: &Output, dir: &Path) -> Result<()> {
    let config = Config::load(dir)?;

    if !dir.join("host.toml").exists() {
        config.save_host()?;
    }

    let plugins_path = dir.join("plugins.toml");
    if !plugins_path.exists() {
        // Template must stay parseable
        PluginsConfig::from_toml_str(PLUGINS_TEMPLATE)?;
        fs::write(&plugins_path, PLUGINS_TEMPLATE)
            .with_context(|| format!("Failed to write {}", plugins_path.display()))?;
    }

    for sub in [config.phrases_dir(), config.state_dir()] {
        fs::create_dir_all(&sub)
            .with_context(|| format!("Failed to create directory: {}", sub.display()))?;
    }

    output.success(&format!("Initialized configuration in {}", dir.display()));
    Ok(())
}
