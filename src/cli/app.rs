//! Main CLI application structure

use std::path::PathBuf;

use anyhow::Result;
use clap::{ArgAction, Parser, Subcommand};

use super::host::{Host, HostOptions};
use super::output::{Output, OutputFormat};
use super::{config_cmd, logging, plugin_cmd, run_cmd};
use crate::storage::DEFAULT_CONFIG_DIR;

#[derive(Parser)]
#[command(name = "caster-host")]
#[command(author, version, about = "Plugin host for voice commands")]
#[command(propagate_version = true)]
pub struct Cli {
    /// Output format
    #[arg(long, short = 'f', global = true, default_value = "text")]
    pub format: OutputFormat,

    /// Increase log verbosity (-v info, -vv debug)
    #[arg(long, short = 'v', global = true, action = ArgAction::Count)]
    pub verbose: u8,

    /// Configuration directory (defaults to ./config)
    #[arg(long, short = 'c', global = true, env = "CASTER_CONFIG_DIR")]
    pub config_dir: Option<PathBuf>,

    /// Directory for plugin state files (defaults to <config-dir>/plugins.state)
    #[arg(long, global = true)]
    pub plugin_state_dir: Option<PathBuf>,

    /// Watch every plugin for changes
    #[arg(long, short = 'd', global = true)]
    pub develop: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create a configuration directory with default settings
    Init,

    /// Load all plugins and reload them as their files change
    Run {
        /// Stop after this many watch ticks
        #[arg(long)]
        ticks: Option<u64>,
    },

    /// Show configured plugins and their status
    List,

    /// Show the persisted state of a plugin
    State {
        /// Plugin ID (module path)
        id: String,
    },

    /// Show files watched for hot reload
    WatchFiles,
}

/// Main entry point for the CLI
pub fn run() -> Result<()> {
    let cli = Cli::parse();
    logging::init(cli.verbose)?;

    let output = Output::new(cli.format);
    let options = HostOptions {
        config_dir: cli.config_dir,
        state_dir: cli.plugin_state_dir,
        develop: cli.develop,
    };

    match cli.command {
        Commands::Init => {
            let dir = options
                .config_dir
                .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_DIR));
            config_cmd::init(&output, &dir)?
        }
        Commands::Run { ticks } => {
            let mut host = Host::open(options)?;
            run_cmd::run(&mut host, &output, ticks)?
        }
        Commands::List => {
            let mut host = Host::open(options)?;
            plugin_cmd::list(&mut host, &output)?
        }
        Commands::State { id } => {
            let host = Host::open(options)?;
            plugin_cmd::state(&host, &output, &id)?
        }
        Commands::WatchFiles => {
            let mut host = Host::open(options)?;
            plugin_cmd::watch_files(&mut host, &output)?
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn verify_cli() {
        Cli::command().debug_assert();
    }

    #[test]
    fn verbosity_counts() {
        let cli = Cli::parse_from(["caster-host", "-vv", "list"]);
        assert_eq!(cli.verbose, 2);
        assert!(matches!(cli.command, Commands::List));
    }

    #[test]
    fn global_flags_after_subcommand() {
        let cli = Cli::parse_from([
            "caster-host",
            "run",
            "--ticks",
            "3",
            "-d",
            "-c",
            "/tmp/caster",
        ]);
        assert!(cli.develop);
        assert_eq!(cli.config_dir, Some(PathBuf::from("/tmp/caster")));
        assert!(matches!(cli.command, Commands::Run { ticks: Some(3) }));
    }
}
