//! # Command-Line Interface
//!
//! User-facing commands for running and inspecting the plugin host.
//!
//! ## Commands
//!
//! | Command | Purpose |
//! |---------|---------|
//! | `init` | Create a configuration directory |
//! | `run` | Load plugins, then hot-reload dev plugins on change |
//! | `list` | Show plugins with status and context |
//! | `state <id>` | Show a plugin's persisted state |
//! | `watch-files` | Show files watched for hot reload |
//!
//! ## Output Formats
//!
//! All commands support `--format` flag:
//! - `text` (default) - Human-readable output
//! - `json` - Machine-parseable JSON
//!
//! ## Logging
//!
//! Logs go to stderr. `-v` enables info, `-vv` debug; `RUST_LOG` overrides
//! both:
//! ```bash
//! caster-host -vv run
//! ```
//!
//! ## Entry Point
//!
//! Call [`run()`] to parse arguments and execute the appropriate command.

mod app;
mod config_cmd;
mod host;
mod logging;
mod output;
mod plugin_cmd;
mod run_cmd;

pub use app::{run, Cli, Commands};
pub use host::{Host, HostOptions};
pub use output::{Output, OutputFormat};
