//! Exit codes for the `wslkit` binary.
//!
//! | Code | Constant | Description |
//! |------|----------|-------------|
//! | 0 | `SUCCESS` | Operation completed successfully |
//! | 1 | `INTERNAL` | General/internal failure |
//! | 2 | `CLI_ARGS` | Invalid CLI arguments or configuration |
//! | 3 | `PRECONDITION` | Distro not registered, already registered, or archive missing |
//! | 10 | `DEADLINE` | Command stopped by its deadline or by Ctrl-C |
//! | 70 | `NATIVE_FAILURE` | A WSL API call failed |
//!
//! When a command run inside a distro exits non-zero, its exit code is
//! passed through unchanged.

use wslkit_distro::{ErrorCategory, WslError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExitCode(i32);

impl ExitCode {
    pub const SUCCESS: ExitCode = ExitCode(0);

    pub const INTERNAL: ExitCode = ExitCode(1);

    /// Invalid or missing command-line arguments, or a bad config file
    pub const CLI_ARGS: ExitCode = ExitCode(2);

    /// The distro was not in the state the operation requires
    pub const PRECONDITION: ExitCode = ExitCode(3);

    /// A deadline or cancellation stopped the command
    pub const DEADLINE: ExitCode = ExitCode(10);

    /// The platform's WSL API reported a failure
    pub const NATIVE_FAILURE: ExitCode = ExitCode(70);

    #[must_use]
    pub const fn as_i32(self) -> i32 {
        self.0
    }

    #[must_use]
    pub const fn from_i32(code: i32) -> Self {
        ExitCode(code)
    }
}

impl From<&WslError> for ExitCode {
    fn from(err: &WslError) -> Self {
        match err.category() {
            // Windows exit codes are DWORDs; the process API takes them as i32.
            ErrorCategory::Exit => ExitCode(err.exit_code().map_or(1, |code| code as i32)),
            ErrorCategory::Native => ExitCode::NATIVE_FAILURE,
            ErrorCategory::Precondition => ExitCode::PRECONDITION,
            ErrorCategory::Usage => ExitCode::CLI_ARGS,
            ErrorCategory::Cancelled => ExitCode::DEADLINE,
            ErrorCategory::Internal => ExitCode::INTERNAL,
        }
    }
}

impl From<&anyhow::Error> for ExitCode {
    fn from(err: &anyhow::Error) -> Self {
        err.downcast_ref::<WslError>()
            .map_or(ExitCode::INTERNAL, ExitCode::from)
    }
}
