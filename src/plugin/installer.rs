//! Package installation for plugin dependencies
//!
//! Entries under `packages` in the plugin configuration are handed to a
//! [`PackageInstaller`] before any plugin is initialized. Failures are the
//! manager's to log; installers just report them.

use std::process::Command;

use anyhow::{Context, Result};
use tracing::info;

use crate::storage::PackageSpec;

pub trait PackageInstaller {
    fn install_package(&mut self, package: &PackageSpec) -> Result<()>;
}

/// Installer used when no install command is available
#[derive(Debug, Default, Clone, Copy)]
pub struct DisabledInstaller;

impl PackageInstaller for DisabledInstaller {
    fn install_package(&mut self, package: &PackageSpec) -> Result<()> {
        anyhow::bail!("Package installation is disabled (wanted '{}')", package.name)
    }
}

/// Runs an external command such as `pip install` for each package
#[derive(Debug, Clone)]
pub struct CommandInstaller {
    program: String,
    args: Vec<String>,
}

impl CommandInstaller {
    /// Builds an installer from an argv prefix; the package requirement is appended
    pub fn new(command: &[String]) -> Result<Self> {
        let (program, args) = command
            .split_first()
            .context("Install command must not be empty")?;

        Ok(Self {
            program: program.clone(),
            args: args.to_vec(),
        })
    }

    /// Requirement string passed to the install command
    ///
    /// A `version` option pins the package: `name==version`.
    pub fn requirement(package: &PackageSpec) -> String {
        match package.options.get("version").and_then(|v| v.as_str()) {
            Some(version) => format!("{}=={}", package.name, version),
            None => package.name.clone(),
        }
    }
}

impl PackageInstaller for CommandInstaller {
    fn install_package(&mut self, package: &PackageSpec) -> Result<()> {
        let requirement = Self::requirement(package);
        info!(package = %requirement, program = %self.program, "Installing package");

        let output = Command::new(&self.program)
            .args(&self.args)
            .arg(&requirement)
            .output()
            .with_context(|| format!("Failed to execute installer: {}", self.program))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            anyhow::bail!("Installing '{}' failed: {}", requirement, stderr.trim());
        }

        Ok(())
    }
}
