//! CLI entry point and dispatch logic
//!
//! This module owns the `run()` function which:
//! - Parses CLI arguments
//! - Builds CliOverrides and discovers Settings
//! - Installs the tracing subscriber
//! - Dispatches to command handlers
//! - Handles all error output

use clap::Parser;
use tracing::debug;
use wslkit_config::{CliOverrides, Settings};
use wslkit_distro::{Wsl, WslError, WslExe};

use super::args::{Cli, Commands};
use super::commands;
use crate::exit_codes::ExitCode;
use crate::logging;

/// Main CLI execution function.
///
/// Handles ALL output including errors and returns the exit code to use
/// on failure. main.rs only calls `std::process::exit(code.as_i32())`.
pub fn run() -> Result<(), ExitCode> {
    run_with(Cli::parse())
}

/// [`run`] for an already parsed command line.
pub fn run_with(cli: Cli) -> Result<(), ExitCode> {
    let overrides = overrides_from(&cli);

    let settings = match Settings::discover(&overrides) {
        Ok(settings) => settings,
        Err(err) => {
            eprintln!("✗ Configuration error: {err:#}");
            return Err(ExitCode::CLI_ARGS);
        }
    };

    install_tracing(settings.verbose);
    debug!(?settings, "effective settings");

    let wsl_exe = match &settings.wsl_exe {
        Some(path) => WslExe::new(path),
        None => WslExe::locate(),
    };
    let wsl = Wsl::new()
        .settle_delay(settings.settle_delay)
        .wsl_exe(wsl_exe);

    let mut stdout = std::io::stdout().lock();
    match commands::execute(cli.command, &wsl, &settings, &mut stdout) {
        Ok(()) => Ok(()),
        Err(err) => {
            let code = ExitCode::from(&err);
            report(&err);
            Err(code)
        }
    }
}

/// Install the subscriber; returns false if one was already in place.
fn install_tracing(verbose: bool) -> bool {
    match logging::init_tracing(verbose) {
        Ok(()) => true,
        Err(e) => {
            // A subscriber may already be installed when embedded; that is fine.
            debug!(error = %e, "keeping existing tracing subscriber");
            false
        }
    }
}

fn overrides_from(cli: &Cli) -> CliOverrides {
    let (use_cwd, deadline_secs) = match &cli.command {
        Commands::Run { cwd, timeout, .. } => (cwd.then_some(true), *timeout),
        Commands::Shell { cwd, .. } => (cwd.then_some(true), None),
        _ => (None, None),
    };
    CliOverrides {
        config_path: cli.config.clone(),
        distro: cli.distro.clone(),
        verbose: cli.verbose.then_some(true),
        use_cwd,
        deadline_secs,
        settle_delay_ms: cli.settle_delay_ms,
        wsl_exe: cli.wsl_exe.clone(),
    }
}

fn report(err: &anyhow::Error) {
    match err.downcast_ref::<WslError>() {
        // The command already spoke for itself; only its exit code is forwarded.
        Some(WslError::Exit(exit)) => debug!(code = exit.code, "command exited non-zero"),
        Some(wsl_err) => {
            eprintln!("✗ {wsl_err}");
            let suggestions = wsl_err.suggestions();
            if !suggestions.is_empty() {
                eprintln!("\n  Suggestions:");
                for (i, suggestion) in suggestions.iter().enumerate() {
                    eprintln!("    {}. {}", i + 1, suggestion);
                }
            }
        }
        None => eprintln!("✗ {err:#}"),
    }
}
