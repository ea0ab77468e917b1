//! CLI smoke entry point.
//!
//! # Responsibility
//! - Start file logging when `SUGAR_LOG_DIR` is set (`SUGAR_LOG_LEVEL`
//!   overrides the build's default level).
//! - Boot an application from this file and apply the process run flags.
//! - Print the resulting launch configuration as JSON.

use std::process::ExitCode;
use sugar_core::{default_log_level, init_logging, Application, RootAccess};

const LOG_DIR_ENV: &str = "SUGAR_LOG_DIR";
const LOG_LEVEL_ENV: &str = "SUGAR_LOG_LEVEL";

fn start_logging() -> Result<(), String> {
    let Some(dir) = std::env::var_os(LOG_DIR_ENV) else {
        return Ok(());
    };
    let dir = std::path::absolute(&dir).map_err(|err| format!("bad {LOG_DIR_ENV}: {err}"))?;
    let level = std::env::var(LOG_LEVEL_ENV).unwrap_or_else(|_| default_log_level().to_string());
    init_logging(&level, &dir.to_string_lossy()).map_err(|err| err.to_string())
}

fn main() -> ExitCode {
    if let Err(err) = start_logging() {
        eprintln!("logging disabled: {err}");
    }

    let mut app = match Application::boot_in("sugar_cli", env!("CARGO_MANIFEST_DIR")) {
        Ok(app) => app,
        Err(err) => {
            eprintln!("boot failed: {err}");
            return ExitCode::FAILURE;
        }
    };

    let launch = match app.run(std::env::args_os().skip(1)) {
        Ok(launch) => launch,
        Err(err) => {
            eprintln!("{err}");
            return ExitCode::from(2);
        }
    };

    println!("sugar_core version={}", sugar_core::core_version());
    if let Ok(root) = app.root() {
        println!("root={}", root.display());
    }
    match serde_json::to_string(&launch) {
        Ok(json) => println!("launch={json}"),
        Err(err) => {
            eprintln!("cannot encode launch config: {err}");
            return ExitCode::FAILURE;
        }
    }
    ExitCode::SUCCESS
}
