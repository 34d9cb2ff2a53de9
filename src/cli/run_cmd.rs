//! The `run` command: load plugins and drive the watch timer

use std::thread;
use std::time::Instant;

use anyhow::{Context as _, Result};
use tracing::info;

use super::host::Host;
use super::output::Output;
use crate::plugin::WatchReport;

pub fn run(host: &mut Host, output: &Output, ticks: Option<u64>) -> Result<()> {
    host.start()?;
    info!(plugins = host.manager.len(), "Plugins loaded");

    if host.timers.is_empty() {
        output.success(&format!(
            "Loaded {} plugin(s), no files to watch",
            host.manager.len()
        ));
        return shutdown(host);
    }

    output.success(&format!(
        "Loaded {} plugin(s), watching {} file(s)",
        host.manager.len(),
        host.manager.watched_files().count()
    ));

    let mut fired: u64 = 0;
    while ticks.map_or(true, |max| fired < max) {
        let Some(deadline) = host.timers.next_deadline() else {
            break;
        };

        let now = Instant::now();
        if deadline > now {
            thread::sleep(deadline - now);
        }

        for timer in host.timers.due(Instant::now()) {
            let report = host.manager.fire(timer);
            print_report(output, &report);

            fired += 1;
            if ticks.is_some_and(|max| fired >= max) {
                break;
            }
        }
    }

    shutdown(host)
}

fn shutdown(host: &mut Host) -> Result<()> {
    host.manager
        .unload_plugins()
        .context("Failed to unload plugins")
}

fn print_report(output: &Output, report: &WatchReport) {
    if output.is_json() {
        let failed: Vec<_> = report
            .failed
            .iter()
            .map(|(trigger, err)| {
                serde_json::json!({
                    "file": trigger.file.display().to_string(),
                    "plugin": trigger.plugin,
                    "error": err.to_string(),
                })
            })
            .collect();
        output.data(&serde_json::json!({
            "reloaded": report.reloaded,
            "failed": failed,
        }));
        return;
    }

    for trigger in &report.reloaded {
        println!("Reloaded {} ({})", trigger.plugin, trigger.file.display());
    }
    for (trigger, err) in &report.failed {
        eprintln!("Failed to reload {}: {}", trigger.plugin, err);
    }
}
