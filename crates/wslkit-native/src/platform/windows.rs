use std::ffi::c_void;
use std::os::windows::ffi::OsStrExt;
use std::path::Path;

use tracing::debug;
use windows::Win32::Foundation::{CloseHandle, HANDLE, WAIT_OBJECT_0};
use windows::Win32::System::Com::CoTaskMemFree;
use windows::Win32::System::SubsystemForLinux::{
    WSL_DISTRIBUTION_FLAGS, WslConfigureDistribution, WslGetDistributionConfiguration,
    WslIsDistributionRegistered, WslLaunch, WslLaunchInteractive, WslRegisterDistribution,
    WslUnregisterDistribution,
};
use windows::Win32::System::Threading::{
    GetExitCodeProcess, INFINITE, TerminateProcess, WaitForSingleObject,
};
use windows::core::{PCWSTR, PSTR};

use crate::api::{RawConfiguration, WslApi};
use crate::env_block::{NativeAllocator, decode_env_block};
use crate::error::{NativeCall, NativeError};
use crate::flags::DistroFlags;
use crate::handle::{NATIVE_ERROR_EXIT, RawHandle, StdioHandles};
use crate::wide::WideString;

/// Releases memory handed over by `wslapi.dll`.
#[derive(Debug, Clone, Copy, Default)]
pub struct CoTaskMemAllocator;

impl NativeAllocator for CoTaskMemAllocator {
    unsafe fn release(&self, ptr: *mut c_void) {
        // SAFETY: forwarded from the trait contract.
        unsafe { CoTaskMemFree(Some(ptr.cast_const())) };
    }
}

/// [`WslApi`] over `wslapi.dll`.
#[derive(Debug, Clone, Copy, Default)]
pub struct WindowsWslApi;

impl WindowsWslApi {
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

fn pcwstr(s: &WideString) -> PCWSTR {
    PCWSTR(s.as_ptr())
}

fn handle(raw: RawHandle) -> HANDLE {
    HANDLE(raw.as_raw() as *mut c_void)
}

fn failed(call: NativeCall) -> impl FnOnce(windows::core::Error) -> NativeError {
    move |e| NativeError::CallFailed {
        call,
        code: Some(e.code().0),
        reason: e.message(),
    }
}

fn wide_path(path: &Path) -> Result<Vec<u16>, NativeError> {
    let mut units: Vec<u16> = path.as_os_str().encode_wide().collect();
    if units.contains(&0) {
        return Err(NativeError::Conversion {
            what: format!("archive path {}", path.display()),
            reason: "contains a NUL character".to_string(),
        });
    }
    units.push(0);
    Ok(units)
}

impl WslApi for WindowsWslApi {
    fn configure_distribution(
        &self,
        name: &WideString,
        default_uid: u32,
        flags: DistroFlags,
    ) -> Result<(), NativeError> {
        debug!(distro = %name, default_uid, flags = flags.bits(), "WslConfigureDistribution");
        // SAFETY: `name` is NUL-terminated and outlives the call.
        unsafe {
            WslConfigureDistribution(pcwstr(name), default_uid, WSL_DISTRIBUTION_FLAGS(flags.bits() as i32))
        }
        .map_err(failed(NativeCall::ConfigureDistribution))
    }

    fn get_distribution_configuration(
        &self,
        name: &WideString,
    ) -> Result<RawConfiguration, NativeError> {
        debug!(distro = %name, "WslGetDistributionConfiguration");

        let mut version = 0u32;
        let mut default_uid = 0u32;
        let mut flags = WSL_DISTRIBUTION_FLAGS(0);
        let mut env_block: *mut PSTR = std::ptr::null_mut();
        let mut env_count = 0u32;

        // SAFETY: every out-parameter points to a live local.
        unsafe {
            WslGetDistributionConfiguration(
                pcwstr(name),
                &mut version,
                &mut default_uid,
                &mut flags,
                &mut env_block,
                &mut env_count,
            )
        }
        .map_err(failed(NativeCall::GetDistributionConfiguration))?;

        // SAFETY: on success the block and its strings are CoTaskMem allocations
        // owned by us; `PSTR` is a transparent wrapper over `*mut u8`.
        let environment = unsafe {
            decode_env_block(env_block.cast::<*mut u8>(), env_count as usize, &CoTaskMemAllocator)
        }?;

        Ok(RawConfiguration {
            version,
            default_uid,
            flags: DistroFlags::from_bits_retain(flags.0 as u32),
            environment,
        })
    }

    fn is_distribution_registered(&self, name: &WideString) -> Result<bool, NativeError> {
        // SAFETY: `name` is NUL-terminated and outlives the call.
        let registered = unsafe { WslIsDistributionRegistered(pcwstr(name)) };
        Ok(registered.as_bool())
    }

    fn launch(
        &self,
        name: &WideString,
        command: &WideString,
        use_cwd: bool,
        stdio: StdioHandles,
    ) -> Result<RawHandle, NativeError> {
        debug!(distro = %name, command = %command, use_cwd, "WslLaunch");
        // SAFETY: strings are NUL-terminated; stream handles are owned by the caller.
        let process = unsafe {
            WslLaunch(
                pcwstr(name),
                pcwstr(command),
                use_cwd,
                handle(stdio.stdin),
                handle(stdio.stdout),
                handle(stdio.stderr),
            )
        }
        .map_err(failed(NativeCall::Launch))?;

        let raw = RawHandle::from_raw(process.0 as isize);
        if raw.is_null() {
            return Err(NativeError::NullHandle {
                call: NativeCall::Launch,
            });
        }
        Ok(raw)
    }

    fn launch_interactive(
        &self,
        name: &WideString,
        command: &WideString,
        use_cwd: bool,
    ) -> Result<u32, NativeError> {
        debug!(distro = %name, command = %command, use_cwd, "WslLaunchInteractive");
        // SAFETY: strings are NUL-terminated and outlive the call.
        let exit_code = unsafe { WslLaunchInteractive(pcwstr(name), pcwstr(command), use_cwd) }
            .map_err(failed(NativeCall::LaunchInteractive))?;

        if exit_code == NATIVE_ERROR_EXIT {
            return Err(NativeError::InternalError {
                call: NativeCall::LaunchInteractive,
            });
        }
        Ok(exit_code)
    }

    fn register_distribution(&self, name: &WideString, archive: &Path) -> Result<(), NativeError> {
        debug!(distro = %name, archive = %archive.display(), "WslRegisterDistribution");
        let archive = wide_path(archive)?;
        // SAFETY: both strings are NUL-terminated and outlive the call.
        unsafe { WslRegisterDistribution(pcwstr(name), PCWSTR(archive.as_ptr())) }
            .map_err(failed(NativeCall::RegisterDistribution))
    }

    fn unregister_distribution(&self, name: &WideString) -> Result<(), NativeError> {
        debug!(distro = %name, "WslUnregisterDistribution");
        // SAFETY: `name` is NUL-terminated and outlives the call.
        unsafe { WslUnregisterDistribution(pcwstr(name)) }
            .map_err(failed(NativeCall::UnregisterDistribution))
    }

    fn wait_for_process(&self, process: RawHandle) -> Result<(), NativeError> {
        // SAFETY: the owner keeps the handle open for the duration of the wait.
        let event = unsafe { WaitForSingleObject(handle(process), INFINITE) };
        if event != WAIT_OBJECT_0 {
            let e = windows::core::Error::from_win32();
            return Err(NativeError::CallFailed {
                call: NativeCall::WaitForProcess,
                code: Some(e.code().0),
                reason: format!("unexpected wait result {}: {}", event.0, e.message()),
            });
        }
        Ok(())
    }

    fn process_exit_code(&self, process: RawHandle) -> Result<u32, NativeError> {
        let mut exit_code = 0u32;
        // SAFETY: the handle is open and `exit_code` is a live local.
        unsafe { GetExitCodeProcess(handle(process), &mut exit_code) }
            .map_err(failed(NativeCall::GetExitCode))?;
        Ok(exit_code)
    }

    fn terminate_process(&self, process: RawHandle, exit_code: u32) -> Result<(), NativeError> {
        // SAFETY: the handle is open.
        unsafe { TerminateProcess(handle(process), exit_code) }
            .map_err(failed(NativeCall::TerminateProcess))
    }

    fn close_handle(&self, process: RawHandle) -> Result<(), NativeError> {
        // SAFETY: the owner guarantees this is the only close of the handle.
        unsafe { CloseHandle(handle(process)) }.map_err(failed(NativeCall::CloseHandle))
    }
}
