//! Error types for native WSL API calls

use std::fmt;
use thiserror::Error;

/// Native entry points, used to attribute failures to the call that produced them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NativeCall {
    ConfigureDistribution,
    GetDistributionConfiguration,
    IsDistributionRegistered,
    Launch,
    LaunchInteractive,
    RegisterDistribution,
    UnregisterDistribution,
    WaitForProcess,
    GetExitCode,
    TerminateProcess,
    CloseHandle,
}

impl NativeCall {
    /// Name of the underlying Win32 function.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::ConfigureDistribution => "WslConfigureDistribution",
            Self::GetDistributionConfiguration => "WslGetDistributionConfiguration",
            Self::IsDistributionRegistered => "WslIsDistributionRegistered",
            Self::Launch => "WslLaunch",
            Self::LaunchInteractive => "WslLaunchInteractive",
            Self::RegisterDistribution => "WslRegisterDistribution",
            Self::UnregisterDistribution => "WslUnregisterDistribution",
            Self::WaitForProcess => "WaitForSingleObject",
            Self::GetExitCode => "GetExitCodeProcess",
            Self::TerminateProcess => "TerminateProcess",
            Self::CloseHandle => "CloseHandle",
        }
    }
}

impl fmt::Display for NativeCall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors reported by the native layer or by the marshalling around it.
#[derive(Error, Debug)]
pub enum NativeError {
    #[error("failed syscall to {call}: {reason}")]
    CallFailed {
        call: NativeCall,
        /// HRESULT or Win32 error code when the platform reported one
        code: Option<i32>,
        reason: String,
    },

    #[error("syscall to {call} returned a null handle")]
    NullHandle { call: NativeCall },

    #[error("error on windows' side on {call}")]
    InternalError { call: NativeCall },

    #[error("failed to convert {what} to UTF-16: {reason}")]
    Conversion { what: String, reason: String },

    #[error("malformed environment block: {0}")]
    EnvBlock(#[from] EnvBlockError),

    #[error("WSL API not available: {reason}")]
    Unsupported { reason: String },
}

impl NativeError {
    /// Shorthand for a `CallFailed` without a platform error code.
    #[must_use]
    pub fn call_failed(call: NativeCall, reason: impl Into<String>) -> Self {
        Self::CallFailed {
            call,
            code: None,
            reason: reason.into(),
        }
    }

    /// The native call this error is attributed to, if any.
    #[must_use]
    pub const fn call(&self) -> Option<NativeCall> {
        match self {
            Self::CallFailed { call, .. }
            | Self::NullHandle { call }
            | Self::InternalError { call } => Some(*call),
            Self::Conversion { .. } | Self::EnvBlock(_) | Self::Unsupported { .. } => None,
        }
    }
}

/// Errors decoding a native environment block.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EnvBlockError {
    #[error("entry {index} is not of the form KEY=VALUE: {entry:?}")]
    MalformedEntry { index: usize, entry: String },

    #[error("entry {index} is a null pointer")]
    NullEntry { index: usize },

    #[error("decoder worker panicked")]
    WorkerPanicked,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_native_call_names() {
        assert_eq!(NativeCall::Launch.as_str(), "WslLaunch");
        assert_eq!(
            NativeCall::GetDistributionConfiguration.to_string(),
            "WslGetDistributionConfiguration"
        );
        assert_eq!(NativeCall::CloseHandle.to_string(), "CloseHandle");
    }

    #[test]
    fn test_error_messages_name_the_call() {
        let err = NativeError::call_failed(NativeCall::RegisterDistribution, "access denied");
        assert_eq!(
            err.to_string(),
            "failed syscall to WslRegisterDistribution: access denied"
        );

        let err = NativeError::NullHandle {
            call: NativeCall::Launch,
        };
        assert_eq!(err.to_string(), "syscall to WslLaunch returned a null handle");
        assert_eq!(err.call(), Some(NativeCall::Launch));
    }

    #[test]
    fn test_env_block_error_converts() {
        let err: NativeError = EnvBlockError::NullEntry { index: 3 }.into();
        assert!(matches!(err, NativeError::EnvBlock(EnvBlockError::NullEntry { index: 3 })));
        assert_eq!(err.call(), None);
    }
}
