//! Caster host - plugin lifecycle and hot reload for voice commands

use std::process::ExitCode;

fn main() -> ExitCode {
    if let Err(e) = caster_host::cli::run() {
        eprintln!("Error: {:#}", e);
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}
