//! wslkit - manage and drive Windows Subsystem for Linux distributions
//!
//! wslkit can be used in two ways:
//! - **CLI**: run `wslkit --help`
//! - **Library**: depend on the crate and use [`Wsl`], [`Distro`] and [`Command`]
//!
//! # Quick Start (Library)
//!
//! ```no_run
//! use std::time::Duration;
//! use wslkit::{Wsl, run_with_deadline};
//!
//! # async fn demo() -> Result<(), wslkit::WslError> {
//! let wsl = Wsl::new();
//! let ubuntu = wsl.distro("Ubuntu");
//!
//! let config = ubuntu.configuration()?;
//! println!("default uid: {}", config.default_uid);
//!
//! let mut build = ubuntu.command("make -j8");
//! build.use_cwd = true;
//! run_with_deadline(&mut build, Duration::from_secs(600)).await?;
//! # Ok(())
//! # }
//! ```
//!
//! # Crates
//!
//! - [`wslkit_native`]: the native WSL API seam and environment-block decoding
//! - [`wslkit_distro`]: distros, commands, process handles and cancellation
//! - [`wslkit_config`]: layered settings for the CLI

pub mod cli;
pub mod exit_codes;
pub mod logging;

pub use exit_codes::ExitCode;

pub use wslkit_config::{CliOverrides, ConfigSource, Settings};
pub use wslkit_distro::{
    CancelReason, CancellationToken, Command, CommandState, Configuration, Distro, ErrorCategory,
    ExitError, LaunchMode, ProcessHandle, ShellOptions, Wsl, WslError, WslExe, run_until,
    run_with_deadline, run_with_token,
};
pub use wslkit_native::{DistroFlags, NativeCall, NativeError, WslApi};

#[cfg(feature = "test-utils")]
pub use wslkit_distro::test_support;

#[doc(hidden)]
pub use {wslkit_config, wslkit_distro, wslkit_native};
