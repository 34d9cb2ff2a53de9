//! Plugin inspection commands

use anyhow::{Context as _, Result};

use super::host::Host;
use super::output::Output;
use crate::domain::PluginId;
use crate::storage::PluginState;

/// Loads all plugins and prints their status
pub fn list(host: &mut Host, output: &Output) -> Result<()> {
    host.start()?;
    let summaries = host.manager.summaries();

    if output.is_json() {
        output.data(&summaries);
        return Ok(());
    }

    if summaries.is_empty() {
        println!("No plugins configured.");
        println!();
        println!(
            "Plugins are configured in {}",
            host.config.config_dir.join("plugins.toml").display()
        );
        return Ok(());
    }

    println!(
        "{:<30} {:<40} {:<10} {:<15} {}",
        "ID", "NAME", "STATUS", "CONTEXT", "DEV"
    );
    println!("{}", "-".repeat(100));
    for summary in &summaries {
        let context = summary
            .context
            .as_ref()
            .map(|c| c.to_string())
            .unwrap_or_else(|| "-".to_string());
        println!(
            "{:<30} {:<40} {:<10} {:<15} {}",
            summary.id,
            summary.name,
            summary.status,
            context,
            if summary.dev { "yes" } else { "no" }
        );
    }

    Ok(())
}

/// Prints the persisted state document of a plugin
pub fn state(host: &Host, output: &Output, id: &str) -> Result<()> {
    let id: PluginId = id.parse()?;
    let state = PluginState::for_plugin(&host.state_dir, &id);

    if output.is_json() {
        output.data(&serde_json::json!({
            "id": id,
            "path": state.path().display().to_string(),
            "state": state.data(),
        }));
        return Ok(());
    }

    match state.data() {
        Some(data) => {
            let yaml = serde_yaml::to_string(data).context("Failed to format state")?;
            print!("{}", yaml);
        }
        None => println!("No state for {} ({})", id, state.path().display()),
    }

    Ok(())
}

/// Initializes plugins and prints the files watched for hot reload
pub fn watch_files(host: &mut Host, output: &Output) -> Result<()> {
    host.init()?;

    if output.is_json() {
        let files: Vec<_> = host
            .manager
            .watched_files()
            .map(|(path, file)| {
                serde_json::json!({
                    "path": path.display().to_string(),
                    "digest": file.digest().to_string(),
                    "dependents": file.dependents(),
                })
            })
            .collect();
        output.data(&files);
        return Ok(());
    }

    let mut any = false;
    for (path, file) in host.manager.watched_files() {
        any = true;
        let dependents: Vec<String> = file.dependents().iter().map(|d| d.to_string()).collect();
        println!(
            "{}  {}  {}",
            file.digest().short(),
            path.display(),
            dependents.join(", ")
        );
    }

    if !any {
        println!("No watched files.");
        println!();
        println!("Add a `dev` key to a plugin's table in plugins.toml or pass --develop.");
    }

    Ok(())
}
