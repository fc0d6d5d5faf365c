//! Managing WSL distros: registration, configuration and running commands
//!
//! Everything starts from a [`Wsl`] context, which carries the native API
//! implementation. There is no process-wide state; tests build a context
//! over `wslkit_native::test_support::FakeWslApi`.
//!
//! ```rust,no_run
//! use std::time::Duration;
//! use wslkit_distro::{Wsl, run_with_deadline};
//!
//! # async fn example() -> Result<(), wslkit_distro::WslError> {
//! let wsl = Wsl::new();
//! let distro = wsl.distro("Ubuntu");
//!
//! distro.set_default_uid(1000)?;
//! distro.command("apt-get update").run()?;
//!
//! let mut cmd = distro.command("sleep 60");
//! let outcome = run_with_deadline(&mut cmd, Duration::from_secs(1)).await;
//! assert!(outcome.unwrap_err().is_cancelled());
//! # Ok(())
//! # }
//! ```

pub mod cancel;
pub mod command;
pub mod command_spec;
pub mod configuration;
pub mod context;
pub mod distro;
pub mod error;
pub mod process;
pub mod registration;
pub mod shell;
pub mod wslexe;

pub use cancel::{CancellationToken, run_until, run_with_deadline, run_with_token};
pub use command::{Command, CommandState, LaunchMode};
pub use command_spec::CommandSpec;
pub use configuration::Configuration;
pub use context::{DEFAULT_SETTLE_DELAY, Wsl};
pub use distro::Distro;
pub use error::{CancelReason, ErrorCategory, ExitError, WslError};
pub use process::ProcessHandle;
pub use shell::ShellOptions;
pub use wslexe::{WslExe, normalize_wsl_output, parse_distro_list};

/// In-memory WSL for tests of code built on this crate.
#[cfg(feature = "test-utils")]
pub use wslkit_native::test_support;
