//! The native call surface.

use std::collections::BTreeMap;
use std::path::Path;

use crate::error::NativeError;
use crate::flags::DistroFlags;
use crate::handle::{RawHandle, StdioHandles};
use crate::wide::WideString;

/// Configuration as reported by `WslGetDistributionConfiguration`.
///
/// The environment has already been decoded and its native memory released.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RawConfiguration {
    /// Filesystem version tag (lxfs vs. wslfs, only relevant to WSL 1)
    pub version: u32,
    pub default_uid: u32,
    pub flags: DistroFlags,
    pub environment: BTreeMap<String, String>,
}

/// Blocking calls into the platform's WSL management API.
///
/// Every method maps to one native call (or one process-handle primitive) and
/// performs no precondition checks of its own; those belong to the caller.
/// Implementations must be callable from any thread, but each process handle
/// is only ever used by its owner.
pub trait WslApi: Send + Sync {
    /// `WslConfigureDistribution`
    fn configure_distribution(
        &self,
        name: &WideString,
        default_uid: u32,
        flags: DistroFlags,
    ) -> Result<(), NativeError>;

    /// `WslGetDistributionConfiguration`
    fn get_distribution_configuration(
        &self,
        name: &WideString,
    ) -> Result<RawConfiguration, NativeError>;

    /// `WslIsDistributionRegistered`
    fn is_distribution_registered(&self, name: &WideString) -> Result<bool, NativeError>;

    /// `WslLaunch`. A null process handle is reported as [`NativeError::NullHandle`].
    fn launch(
        &self,
        name: &WideString,
        command: &WideString,
        use_cwd: bool,
        stdio: StdioHandles,
    ) -> Result<RawHandle, NativeError>;

    /// `WslLaunchInteractive`. Blocks until the command exits and returns its exit code.
    fn launch_interactive(
        &self,
        name: &WideString,
        command: &WideString,
        use_cwd: bool,
    ) -> Result<u32, NativeError>;

    /// `WslRegisterDistribution`
    fn register_distribution(&self, name: &WideString, archive: &Path) -> Result<(), NativeError>;

    /// `WslUnregisterDistribution`
    fn unregister_distribution(&self, name: &WideString) -> Result<(), NativeError>;

    /// Block until the process signals completion.
    fn wait_for_process(&self, process: RawHandle) -> Result<(), NativeError>;

    /// Exit code of the process, [`STILL_ACTIVE`](crate::STILL_ACTIVE) if it is still running.
    fn process_exit_code(&self, process: RawHandle) -> Result<u32, NativeError>;

    /// Force the process to stop with `exit_code`.
    fn terminate_process(&self, process: RawHandle, exit_code: u32) -> Result<(), NativeError>;

    /// Release the handle. Calling this twice for the same handle is a bug.
    fn close_handle(&self, process: RawHandle) -> Result<(), NativeError>;
}
