//! Error types for distro operations

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;
use wslkit_native::{EnvBlockError, NATIVE_ERROR_EXIT, NativeCall, NativeError};

use crate::command::CommandState;

/// A launched command finished with a non-zero exit code.
///
/// This is an ordinary outcome of the command, not a fault of the system,
/// and is kept as its own type so callers can match on it.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("exit error: {code}")]
pub struct ExitError {
    pub code: u32,
}

/// Why a running command was stopped from outside.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelReason {
    /// The deadline passed before the command finished.
    Deadline(Duration),
    /// An external cancellation signal fired.
    Signal,
}

impl fmt::Display for CancelReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Deadline(limit) => write!(f, "deadline of {limit:?} exceeded"),
            Self::Signal => f.write_str("cancelled"),
        }
    }
}

/// Errors from distro operations and the command lifecycle
#[derive(Error, Debug)]
pub enum WslError {
    #[error("{call} failed for distro {distro:?}: {source}")]
    Native {
        distro: String,
        call: NativeCall,
        #[source]
        source: NativeError,
    },

    #[error("{call} returned an invalid handle for distro {distro:?}")]
    InvalidHandle { distro: String, call: NativeCall },

    #[error(transparent)]
    Exit(#[from] ExitError),

    #[error("malformed default environment of distro {distro:?}: {source}")]
    MalformedEnvironment {
        distro: String,
        #[source]
        source: EnvBlockError,
    },

    #[error("unknown WSL version {version}")]
    InvalidConfiguration { version: u8 },

    #[error("distro {distro:?} is not registered")]
    NotRegistered { distro: String },

    #[error("distro {distro:?} is already registered")]
    AlreadyRegistered { distro: String },

    #[error("file {} does not exist", path.display())]
    ArchiveNotFound { path: PathBuf },

    #[error("invalid argument for distro {distro:?}: {reason}")]
    InvalidArgument { distro: String, reason: String },

    #[error("cannot {operation} a command that is {state}")]
    InvalidState {
        operation: &'static str,
        state: CommandState,
    },

    #[error("command {command:?} in distro {distro:?} was stopped: {reason}")]
    Cancelled {
        distro: String,
        command: String,
        reason: CancelReason,
    },

    #[error("background task failed: {reason}")]
    BackgroundTask { reason: String },

    #[error("wsl.exe failed: {reason}")]
    WslExe { reason: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Coarse grouping of [`WslError`] variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// The platform call failed or handed back something unusable.
    Native,
    /// The launched command exited non-zero.
    Exit,
    /// The distro was not in the state the operation requires.
    Precondition,
    /// Caller input or API misuse.
    Usage,
    /// Stopped by a deadline or cancellation signal.
    Cancelled,
    Internal,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Native => write!(f, "Native"),
            Self::Exit => write!(f, "Exit"),
            Self::Precondition => write!(f, "Precondition"),
            Self::Usage => write!(f, "Usage"),
            Self::Cancelled => write!(f, "Cancelled"),
            Self::Internal => write!(f, "Internal"),
        }
    }
}

impl WslError {
    /// Attribute a native failure to `distro` and `call`.
    ///
    /// Null handles, decoder failures and string conversion failures get
    /// their own variants; everything else stays a [`WslError::Native`].
    pub fn native(distro: &str, call: NativeCall, source: NativeError) -> Self {
        match source {
            NativeError::NullHandle { call } => Self::InvalidHandle {
                distro: distro.to_string(),
                call,
            },
            NativeError::EnvBlock(source) => Self::MalformedEnvironment {
                distro: distro.to_string(),
                source,
            },
            NativeError::Conversion { what, reason } => Self::InvalidArgument {
                distro: distro.to_string(),
                reason: format!("{what}: {reason}"),
            },
            source => Self::Native {
                distro: distro.to_string(),
                call,
                source,
            },
        }
    }

    /// The command's own exit code, for [`WslError::Exit`].
    #[must_use]
    pub fn exit_code(&self) -> Option<u32> {
        match self {
            Self::Exit(e) => Some(e.code),
            _ => None,
        }
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled { .. })
    }

    /// True when the native layer reported its internal error sentinel.
    #[must_use]
    pub fn is_native_internal_error(&self) -> bool {
        matches!(
            self,
            Self::Native {
                source: NativeError::InternalError { .. },
                ..
            }
        )
    }

    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Native { .. } | Self::InvalidHandle { .. } | Self::MalformedEnvironment { .. } => {
                ErrorCategory::Native
            }
            Self::Exit(_) => ErrorCategory::Exit,
            Self::NotRegistered { .. } | Self::AlreadyRegistered { .. } | Self::ArchiveNotFound { .. } => {
                ErrorCategory::Precondition
            }
            Self::InvalidConfiguration { .. } | Self::InvalidArgument { .. } | Self::InvalidState { .. } => {
                ErrorCategory::Usage
            }
            Self::Cancelled { .. } => ErrorCategory::Cancelled,
            Self::BackgroundTask { .. } | Self::WslExe { .. } | Self::Io(_) => ErrorCategory::Internal,
        }
    }

    /// Suggested actions for the user, shown by the CLI under the error.
    #[must_use]
    pub fn suggestions(&self) -> Vec<String> {
        match self {
            Self::NotRegistered { distro } => vec![
                format!("Run `wslkit register {distro} <archive>` to create it"),
                "Run `wslkit list` to see registered distros".to_string(),
            ],
            Self::AlreadyRegistered { distro } => {
                vec![format!("Run `wslkit unregister {distro}` first to replace it")]
            }
            Self::ArchiveNotFound { .. } => {
                vec!["Check the path to the root filesystem tarball".to_string()]
            }
            Self::Native {
                source: NativeError::Unsupported { .. },
                ..
            } => vec!["WSL management is only available on Windows hosts".to_string()],
            Self::Native { .. } | Self::InvalidHandle { .. } => vec![
                "Make sure the Windows Subsystem for Linux feature is enabled".to_string(),
                "Try `wsl --shutdown` and run the command again".to_string(),
            ],
            _ => Vec::new(),
        }
    }
}

/// Interpret a raw process exit status.
pub(crate) fn exit_status(distro: &str, call: NativeCall, code: u32) -> Result<(), WslError> {
    match code {
        0 => Ok(()),
        NATIVE_ERROR_EXIT => Err(WslError::native(
            distro,
            call,
            NativeError::InternalError { call },
        )),
        code => Err(ExitError { code }.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_error_is_distinguished() {
        let err: WslError = ExitError { code: 7 }.into();
        assert_eq!(err.exit_code(), Some(7));
        assert_eq!(err.category(), ErrorCategory::Exit);
        assert_eq!(err.to_string(), "exit error: 7");
    }

    #[test]
    fn test_native_null_handle_maps_to_invalid_handle() {
        let err = WslError::native(
            "Ubuntu",
            NativeCall::Launch,
            NativeError::NullHandle {
                call: NativeCall::Launch,
            },
        );
        assert!(matches!(err, WslError::InvalidHandle { ref distro, .. } if distro == "Ubuntu"));
        assert_eq!(err.category(), ErrorCategory::Native);
    }

    #[test]
    fn test_native_conversion_is_caller_input_error() {
        let err = WslError::native(
            "Ubuntu",
            NativeCall::Launch,
            NativeError::Conversion {
                what: "command".to_string(),
                reason: "contains a NUL character".to_string(),
            },
        );
        assert!(matches!(err, WslError::InvalidArgument { .. }));
        assert_eq!(err.category(), ErrorCategory::Usage);
    }

    #[test]
    fn test_env_block_failure_maps_to_malformed_environment() {
        let err = WslError::native(
            "Ubuntu",
            NativeCall::GetDistributionConfiguration,
            EnvBlockError::NullEntry { index: 1 }.into(),
        );
        assert!(matches!(err, WslError::MalformedEnvironment { .. }));
    }

    #[test]
    fn test_exit_status_interpretation() {
        assert!(exit_status("d", NativeCall::GetExitCode, 0).is_ok());
        assert_eq!(
            exit_status("d", NativeCall::GetExitCode, 7).unwrap_err().exit_code(),
            Some(7)
        );

        let err = exit_status("d", NativeCall::GetExitCode, NATIVE_ERROR_EXIT).unwrap_err();
        assert!(err.is_native_internal_error());
        assert_eq!(err.exit_code(), None);
    }

    #[test]
    fn test_cancelled_message() {
        let err = WslError::Cancelled {
            distro: "Ubuntu".to_string(),
            command: "sleep 5".to_string(),
            reason: CancelReason::Deadline(Duration::from_secs(1)),
        };
        assert!(err.is_cancelled());
        assert_eq!(err.category(), ErrorCategory::Cancelled);
        assert!(err.to_string().contains("deadline of 1s exceeded"));
    }

    #[test]
    fn test_suggestions_for_preconditions() {
        let err = WslError::NotRegistered {
            distro: "Ubuntu".to_string(),
        };
        assert!(err.suggestions()[0].contains("wslkit register Ubuntu"));
        assert!(WslError::BackgroundTask { reason: "x".into() }.suggestions().is_empty());
    }
}
