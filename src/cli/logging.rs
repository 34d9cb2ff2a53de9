//! Log subscriber setup for the binary

use anyhow::Result;
use tracing_subscriber::EnvFilter;

/// Highest supported `-v` count
pub const MAX_VERBOSITY: u8 = 2;

/// Filter directive for a `-v` count: none = warn, `-v` = info, `-vv` = debug
pub fn level_for(verbosity: u8) -> Result<&'static str> {
    match verbosity {
        0 => Ok("warn"),
        1 => Ok("info"),
        2 => Ok("debug"),
        _ => anyhow::bail!("Maximum verbosity level is: -{}", "v".repeat(MAX_VERBOSITY as usize)),
    }
}

/// Installs the stderr subscriber; `RUST_LOG` overrides the `-v` level
pub fn init(verbosity: u8) -> Result<()> {
    let level = level_for(verbosity)?;
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    // A subscriber may already be set (e.g. by a test harness)
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();

    Ok(())
}
