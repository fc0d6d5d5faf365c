use std::path::Path;

use crate::api::{RawConfiguration, WslApi};
use crate::error::NativeError;
use crate::flags::DistroFlags;
use crate::handle::{RawHandle, StdioHandles};
use crate::wide::WideString;

/// Stand-in for platforms without `wslapi.dll`: every call fails.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnsupportedWslApi;

impl UnsupportedWslApi {
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    fn unsupported<T>() -> Result<T, NativeError> {
        Err(NativeError::Unsupported {
            reason: "WSL is only available on Windows".to_string(),
        })
    }
}

impl WslApi for UnsupportedWslApi {
    fn configure_distribution(
        &self,
        _name: &WideString,
        _default_uid: u32,
        _flags: DistroFlags,
    ) -> Result<(), NativeError> {
        Self::unsupported()
    }

    fn get_distribution_configuration(
        &self,
        _name: &WideString,
    ) -> Result<RawConfiguration, NativeError> {
        Self::unsupported()
    }

    fn is_distribution_registered(&self, _name: &WideString) -> Result<bool, NativeError> {
        Self::unsupported()
    }

    fn launch(
        &self,
        _name: &WideString,
        _command: &WideString,
        _use_cwd: bool,
        _stdio: StdioHandles,
    ) -> Result<RawHandle, NativeError> {
        Self::unsupported()
    }

    fn launch_interactive(
        &self,
        _name: &WideString,
        _command: &WideString,
        _use_cwd: bool,
    ) -> Result<u32, NativeError> {
        Self::unsupported()
    }

    fn register_distribution(&self, _name: &WideString, _archive: &Path) -> Result<(), NativeError> {
        Self::unsupported()
    }

    fn unregister_distribution(&self, _name: &WideString) -> Result<(), NativeError> {
        Self::unsupported()
    }

    fn wait_for_process(&self, _process: RawHandle) -> Result<(), NativeError> {
        Self::unsupported()
    }

    fn process_exit_code(&self, _process: RawHandle) -> Result<u32, NativeError> {
        Self::unsupported()
    }

    fn terminate_process(&self, _process: RawHandle, _exit_code: u32) -> Result<(), NativeError> {
        Self::unsupported()
    }

    fn close_handle(&self, _process: RawHandle) -> Result<(), NativeError> {
        Self::unsupported()
    }
}
