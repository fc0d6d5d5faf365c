//! Test doubles for the native layer.
//!
//! Available with the `test-utils` feature. [`FakeWslApi`] simulates distros
//! and processes in memory so the lifecycle can be exercised on any platform;
//! [`TrackingAllocator`] stands in for `CoTaskMemAlloc`/`CoTaskMemFree` and
//! catches leaks and double frees in the environment block decoder.

use std::alloc::{Layout, alloc, dealloc, handle_alloc_error};
use std::collections::{BTreeMap, HashMap};
use std::ffi::c_void;
use std::path::{Path, PathBuf};
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use crate::api::{RawConfiguration, WslApi};
use crate::env_block::{NativeAllocator, decode_env_block};
use crate::error::{NativeCall, NativeError};
use crate::flags::DistroFlags;
use crate::handle::{NATIVE_ERROR_EXIT, RawHandle, STILL_ACTIVE, StdioHandles};

/// Win32 `ERROR_ACCESS_DENIED`, returned when terminating an exited process.
pub const ERROR_ACCESS_DENIED: i32 = 5;
use crate::wide::WideString;

// ============================================================================
// TrackingAllocator
// ============================================================================

#[derive(Default)]
struct Allocations {
    live: HashMap<usize, Layout>,
    released: Vec<usize>,
    double_frees: usize,
}

/// An allocator that records every release.
///
/// Memory still live when the allocator is dropped is freed then, so tests
/// that deliberately leak do not leak the test process.
#[derive(Default)]
pub struct TrackingAllocator {
    allocations: Mutex<Allocations>,
}

impl TrackingAllocator {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn allocations(&self) -> MutexGuard<'_, Allocations> {
        self.allocations.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn allocate(&self, layout: Layout) -> *mut u8 {
        // SAFETY: `layout` always has a non-zero size here.
        let ptr = unsafe { alloc(layout) };
        if ptr.is_null() {
            handle_alloc_error(layout);
        }
        self.allocations().live.insert(ptr as usize, layout);
        ptr
    }

    /// Copy `bytes` into a fresh allocation, optionally NUL-terminated.
    pub fn alloc_bytes(&self, bytes: &[u8], terminate: bool) -> *mut u8 {
        let len = bytes.len() + usize::from(terminate);
        let layout = Layout::array::<u8>(len.max(1)).expect("layout overflow");
        let ptr = self.allocate(layout);
        // SAFETY: `ptr` has room for `len` bytes.
        unsafe {
            std::ptr::copy_nonoverlapping(bytes.as_ptr(), ptr, bytes.len());
            if terminate {
                *ptr.add(bytes.len()) = 0;
            }
        }
        ptr
    }

    /// Allocate a pointer array holding `entries`.
    pub fn alloc_block(&self, entries: &[*mut u8]) -> *mut *mut u8 {
        let layout = Layout::array::<*mut u8>(entries.len().max(1)).expect("layout overflow");
        let ptr = self.allocate(layout).cast::<*mut u8>();
        // SAFETY: `ptr` has room for `entries.len()` pointers.
        unsafe { std::ptr::copy_nonoverlapping(entries.as_ptr(), ptr, entries.len()) };
        ptr
    }

    /// Build a complete native environment block from NUL-free byte strings.
    pub fn alloc_env_block<'a, I>(&self, entries: I) -> (*mut *mut u8, usize)
    where
        I: IntoIterator<Item = &'a [u8]>,
    {
        let ptrs: Vec<*mut u8> = entries
            .into_iter()
            .map(|entry| self.alloc_bytes(entry, true))
            .collect();
        (self.alloc_block(&ptrs), ptrs.len())
    }

    /// Allocations not released yet.
    #[must_use]
    pub fn live_allocations(&self) -> usize {
        self.allocations().live.len()
    }

    /// Successful releases so far.
    #[must_use]
    pub fn release_count(&self) -> usize {
        self.allocations().released.len()
    }

    /// Addresses in the order they were released.
    #[must_use]
    pub fn release_order(&self) -> Vec<usize> {
        self.allocations().released.clone()
    }

    /// Releases of pointers that were not live.
    #[must_use]
    pub fn double_frees(&self) -> usize {
        self.allocations().double_frees
    }
}

impl NativeAllocator for TrackingAllocator {
    unsafe fn release(&self, ptr: *mut c_void) {
        let mut allocations = self.allocations();
        let addr = ptr as usize;
        match allocations.live.remove(&addr) {
            Some(layout) => {
                // SAFETY: `addr` was allocated with `layout` and is released once.
                unsafe { dealloc(ptr.cast(), layout) };
                allocations.released.push(addr);
            }
            None => allocations.double_frees += 1,
        }
    }
}

impl Drop for TrackingAllocator {
    fn drop(&mut self) {
        let allocations = self.allocations.get_mut().unwrap_or_else(PoisonError::into_inner);
        for (addr, layout) in allocations.live.drain() {
            // SAFETY: still live, so never released.
            unsafe { dealloc(addr as *mut u8, layout) };
        }
    }
}

// ============================================================================
// FakeWslApi
// ============================================================================

/// Behaviour of a command launched in the fake.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FakeScript {
    pub exit_code: u32,
    pub duration: Duration,
}

impl Default for FakeScript {
    fn default() -> Self {
        Self {
            exit_code: 0,
            duration: Duration::ZERO,
        }
    }
}

/// A distro known to the fake.
#[derive(Debug, Clone)]
pub struct FakeDistro {
    pub version: u32,
    pub default_uid: u32,
    pub flags: DistroFlags,
    /// Raw `KEY=VALUE` entries handed out as a native block.
    pub environment: Vec<Vec<u8>>,
    pub archive: Option<PathBuf>,
}

impl Default for FakeDistro {
    fn default() -> Self {
        Self {
            version: 2,
            default_uid: 0,
            flags: DistroFlags::DEFAULT | DistroFlags::WSL_VERSION_2,
            environment: vec![
                b"HOSTTYPE=x86_64".to_vec(),
                b"LANG=en_US.UTF-8".to_vec(),
                b"PATH=/usr/local/sbin:/usr/local/bin:/usr/sbin:/usr/bin:/sbin:/bin".to_vec(),
                b"TERM=xterm-256color".to_vec(),
            ],
            archive: None,
        }
    }
}

/// One `WslLaunch`/`WslLaunchInteractive` call as seen by the fake.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FakeLaunch {
    pub distro: String,
    pub command: String,
    pub use_cwd: bool,
    pub interactive: bool,
}

#[derive(Debug)]
struct FakeProcess {
    script: FakeScript,
    started: Instant,
    terminated: Option<u32>,
    close_count: u32,
}

impl FakeProcess {
    fn finished(&self) -> bool {
        self.terminated.is_some() || self.started.elapsed() >= self.script.duration
    }
}

#[derive(Default)]
struct FakeState {
    distros: BTreeMap<String, FakeDistro>,
    scripts: HashMap<String, FakeScript>,
    processes: HashMap<isize, FakeProcess>,
    next_handle: isize,
    fail_next: Vec<NativeCall>,
    null_handles: bool,
    calls: Vec<NativeCall>,
    launches: Vec<FakeLaunch>,
}

/// In-memory [`WslApi`].
///
/// Processes "run" for their scripted duration; `wait_for_process` blocks on
/// a condition variable until then or until the process is terminated.
#[derive(Default)]
pub struct FakeWslApi {
    state: Mutex<FakeState>,
    changed: Condvar,
    allocator: TrackingAllocator,
}

impl FakeWslApi {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style variant of [`add_distro`](Self::add_distro).
    #[must_use]
    pub fn with_distro(self, name: &str) -> Self {
        self.add_distro(name, FakeDistro::default());
        self
    }

    fn state(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn add_distro(&self, name: &str, distro: FakeDistro) {
        self.state().distros.insert(name.to_string(), distro);
    }

    /// Replace a distro's raw environment entries.
    pub fn set_environment(&self, name: &str, entries: Vec<Vec<u8>>) {
        if let Some(distro) = self.state().distros.get_mut(name) {
            distro.environment = entries;
        }
    }

    /// Make `command` exit with `exit_code` after running for `duration`.
    pub fn script(&self, command: &str, exit_code: u32, duration: Duration) {
        self.state()
            .scripts
            .insert(command.to_string(), FakeScript { exit_code, duration });
    }

    /// Make the next call to `call` fail.
    pub fn fail_next(&self, call: NativeCall) {
        self.state().fail_next.push(call);
    }

    /// Make `WslLaunch` report a null process handle.
    pub fn launch_null_handles(&self, enabled: bool) {
        self.state().null_handles = enabled;
    }

    #[must_use]
    pub fn distro(&self, name: &str) -> Option<FakeDistro> {
        self.state().distros.get(name).cloned()
    }

    /// Every native call made so far, in order.
    #[must_use]
    pub fn calls(&self) -> Vec<NativeCall> {
        self.state().calls.clone()
    }

    #[must_use]
    pub fn call_count(&self, call: NativeCall) -> usize {
        self.state().calls.iter().filter(|c| **c == call).count()
    }

    #[must_use]
    pub fn launches(&self) -> Vec<FakeLaunch> {
        self.state().launches.clone()
    }

    /// Handles handed out by `launch`, oldest first.
    #[must_use]
    pub fn handles(&self) -> Vec<RawHandle> {
        let mut handles: Vec<isize> = self.state().processes.keys().copied().collect();
        handles.sort_unstable();
        handles.into_iter().map(RawHandle::from_raw).collect()
    }

    /// How many times `close_handle` was called for `handle`.
    #[must_use]
    pub fn close_count(&self, handle: RawHandle) -> u32 {
        self.state()
            .processes
            .get(&handle.as_raw())
            .map_or(0, |p| p.close_count)
    }

    #[must_use]
    pub fn was_terminated(&self, handle: RawHandle) -> bool {
        self.state()
            .processes
            .get(&handle.as_raw())
            .is_some_and(|p| p.terminated.is_some())
    }

    /// The allocator backing the fake's environment blocks.
    #[must_use]
    pub fn allocator(&self) -> &TrackingAllocator {
        &self.allocator
    }

    fn record(&self, call: NativeCall) -> Result<MutexGuard<'_, FakeState>, NativeError> {
        let mut state = self.state();
        state.calls.push(call);
        if let Some(pos) = state.fail_next.iter().position(|c| *c == call) {
            state.fail_next.remove(pos);
            return Err(NativeError::CallFailed {
                call,
                code: Some(-2147467259), // E_FAIL
                reason: "injected failure".to_string(),
            });
        }
        Ok(state)
    }

    fn not_registered(call: NativeCall, name: &WideString) -> NativeError {
        NativeError::call_failed(call, format!("distribution {name} is not registered"))
    }

    fn invalid_handle(call: NativeCall, handle: RawHandle) -> NativeError {
        NativeError::call_failed(call, format!("invalid handle {}", handle.as_raw()))
    }
}

impl WslApi for FakeWslApi {
    fn configure_distribution(
        &self,
        name: &WideString,
        default_uid: u32,
        flags: DistroFlags,
    ) -> Result<(), NativeError> {
        let call = NativeCall::ConfigureDistribution;
        let mut state = self.record(call)?;
        let distro = state
            .distros
            .get_mut(name.as_str())
            .ok_or_else(|| Self::not_registered(call, name))?;
        distro.default_uid = default_uid;
        distro.flags = flags;
        Ok(())
    }

    fn get_distribution_configuration(
        &self,
        name: &WideString,
    ) -> Result<RawConfiguration, NativeError> {
        let call = NativeCall::GetDistributionConfiguration;
        let distro = self
            .record(call)?
            .distros
            .get(name.as_str())
            .cloned()
            .ok_or_else(|| Self::not_registered(call, name))?;

        let (block, count) = self
            .allocator
            .alloc_env_block(distro.environment.iter().map(Vec::as_slice));
        // SAFETY: the block was just built by our own allocator and is handed over.
        let environment = unsafe { decode_env_block(block, count, &self.allocator) }?;

        Ok(RawConfiguration {
            version: distro.version,
            default_uid: distro.default_uid,
            flags: distro.flags,
            environment,
        })
    }

    fn is_distribution_registered(&self, name: &WideString) -> Result<bool, NativeError> {
        let state = self.record(NativeCall::IsDistributionRegistered)?;
        Ok(state.distros.contains_key(name.as_str()))
    }

    fn launch(
        &self,
        name: &WideString,
        command: &WideString,
        use_cwd: bool,
        _stdio: StdioHandles,
    ) -> Result<RawHandle, NativeError> {
        let call = NativeCall::Launch;
        let mut state = self.record(call)?;
        if !state.distros.contains_key(name.as_str()) {
            return Err(Self::not_registered(call, name));
        }
        state.launches.push(FakeLaunch {
            distro: name.to_string(),
            command: command.to_string(),
            use_cwd,
            interactive: false,
        });
        if state.null_handles {
            return Err(NativeError::NullHandle { call });
        }

        let script = state.scripts.get(command.as_str()).copied().unwrap_or_default();
        state.next_handle += 4;
        let raw = state.next_handle;
        state.processes.insert(
            raw,
            FakeProcess {
                script,
                started: Instant::now(),
                terminated: None,
                close_count: 0,
            },
        );
        Ok(RawHandle::from_raw(raw))
    }

    fn launch_interactive(
        &self,
        name: &WideString,
        command: &WideString,
        use_cwd: bool,
    ) -> Result<u32, NativeError> {
        let call = NativeCall::LaunchInteractive;
        let script = {
            let mut state = self.record(call)?;
            if !state.distros.contains_key(name.as_str()) {
                return Err(Self::not_registered(call, name));
            }
            state.launches.push(FakeLaunch {
                distro: name.to_string(),
                command: command.to_string(),
                use_cwd,
                interactive: true,
            });
            state.scripts.get(command.as_str()).copied().unwrap_or_default()
        };

        std::thread::sleep(script.duration);
        if script.exit_code == NATIVE_ERROR_EXIT {
            return Err(NativeError::InternalError { call });
        }
        Ok(script.exit_code)
    }

    fn register_distribution(&self, name: &WideString, archive: &Path) -> Result<(), NativeError> {
        let call = NativeCall::RegisterDistribution;
        let mut state = self.record(call)?;
        if state.distros.contains_key(name.as_str()) {
            return Err(NativeError::call_failed(
                call,
                format!("distribution {name} already exists"),
            ));
        }
        state.distros.insert(
            name.to_string(),
            FakeDistro {
                archive: Some(archive.to_path_buf()),
                ..FakeDistro::default()
            },
        );
        Ok(())
    }

    fn unregister_distribution(&self, name: &WideString) -> Result<(), NativeError> {
        let call = NativeCall::UnregisterDistribution;
        let mut state = self.record(call)?;
        state
            .distros
            .remove(name.as_str())
            .map(|_| ())
            .ok_or_else(|| Self::not_registered(call, name))
    }

    fn wait_for_process(&self, process: RawHandle) -> Result<(), NativeError> {
        let call = NativeCall::WaitForProcess;
        let mut state = self.record(call)?;
        loop {
            let remaining = match state.processes.get(&process.as_raw()) {
                Some(p) if p.close_count == 0 => {
                    if p.finished() {
                        return Ok(());
                    }
                    p.script.duration.saturating_sub(p.started.elapsed())
                }
                _ => return Err(Self::invalid_handle(call, process)),
            };
            state = self
                .changed
                .wait_timeout(state, remaining)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
    }

    fn process_exit_code(&self, process: RawHandle) -> Result<u32, NativeError> {
        let call = NativeCall::GetExitCode;
        let state = self.record(call)?;
        match state.processes.get(&process.as_raw()) {
            Some(p) if p.close_count == 0 => Ok(match p.terminated {
                Some(code) => code,
                None if p.finished() => p.script.exit_code,
                None => STILL_ACTIVE,
            }),
            _ => Err(Self::invalid_handle(call, process)),
        }
    }

    fn terminate_process(&self, process: RawHandle, exit_code: u32) -> Result<(), NativeError> {
        let call = NativeCall::TerminateProcess;
        let mut state = self.record(call)?;
        match state.processes.get_mut(&process.as_raw()) {
            // Like Windows, an exited process cannot be terminated.
            Some(p) if p.close_count == 0 && p.finished() => {
                return Err(NativeError::CallFailed {
                    call,
                    code: Some(ERROR_ACCESS_DENIED),
                    reason: "Access is denied.".to_string(),
                });
            }
            Some(p) if p.close_count == 0 => p.terminated = Some(exit_code),
            _ => return Err(Self::invalid_handle(call, process)),
        }
        drop(state);
        self.changed.notify_all();
        Ok(())
    }

    fn close_handle(&self, process: RawHandle) -> Result<(), NativeError> {
        let call = NativeCall::CloseHandle;
        let mut state = self.record(call)?;
        let p = state
            .processes
            .get_mut(&process.as_raw())
            .ok_or_else(|| Self::invalid_handle(call, process))?;
        p.close_count += 1;
        if p.close_count > 1 {
            return Err(Self::invalid_handle(call, process));
        }
        drop(state);
        self.changed.notify_all();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wide(s: &str) -> WideString {
        WideString::new(s, "test").unwrap()
    }

    #[test]
    fn test_tracking_allocator_detects_double_free() {
        let alloc = TrackingAllocator::new();
        let ptr = alloc.alloc_bytes(b"x", true);
        unsafe {
            alloc.release(ptr.cast());
            alloc.release(ptr.cast());
        }
        assert_eq!(alloc.release_count(), 1);
        assert_eq!(alloc.double_frees(), 1);
    }

    #[test]
    fn test_fake_process_runs_for_scripted_duration() {
        let api = FakeWslApi::new().with_distro("Ubuntu");
        api.script("sleep 0.05", 3, Duration::from_millis(50));

        let handle = api
            .launch(&wide("Ubuntu"), &wide("sleep 0.05"), false, StdioHandles::inherit())
            .unwrap();
        assert_eq!(api.process_exit_code(handle).unwrap(), STILL_ACTIVE);

        api.wait_for_process(handle).unwrap();
        assert_eq!(api.process_exit_code(handle).unwrap(), 3);

        api.close_handle(handle).unwrap();
        assert!(api.close_handle(handle).is_err());
        assert_eq!(api.close_count(handle), 2);
    }

    #[test]
    fn test_fake_terminate_wakes_waiter() {
        let api = std::sync::Arc::new(FakeWslApi::new().with_distro("Ubuntu"));
        api.script("sleep 60", 0, Duration::from_secs(60));
        let handle = api
            .launch(&wide("Ubuntu"), &wide("sleep 60"), false, StdioHandles::inherit())
            .unwrap();

        let waiter = {
            let api = api.clone();
            std::thread::spawn(move || api.wait_for_process(handle))
        };
        std::thread::sleep(Duration::from_millis(20));
        api.terminate_process(handle, STILL_ACTIVE).unwrap();

        waiter.join().unwrap().unwrap();
        assert!(api.was_terminated(handle));
        assert_eq!(api.process_exit_code(handle).unwrap(), STILL_ACTIVE);
    }

    #[test]
    fn test_fake_terminate_after_exit_is_access_denied() {
        let api = FakeWslApi::new().with_distro("Ubuntu");
        let handle = api
            .launch(&wide("Ubuntu"), &wide("true"), false, StdioHandles::inherit())
            .unwrap();
        api.wait_for_process(handle).unwrap();

        let err = api.terminate_process(handle, STILL_ACTIVE).unwrap_err();
        assert!(matches!(
            err,
            NativeError::CallFailed {
                call: NativeCall::TerminateProcess,
                code: Some(ERROR_ACCESS_DENIED),
                ..
            }
        ));
        assert!(!api.was_terminated(handle));
        assert_eq!(api.process_exit_code(handle).unwrap(), 0);
    }

    #[test]
    fn test_fake_configuration_goes_through_decoder() {
        let api = FakeWslApi::new().with_distro("Ubuntu");
        let config = api.get_distribution_configuration(&wide("Ubuntu")).unwrap();

        assert_eq!(config.environment["LANG"], "en_US.UTF-8");
        assert_eq!(api.allocator().live_allocations(), 0);
        assert_eq!(api.allocator().double_frees(), 0);
    }

    #[test]
    fn test_fake_injected_failure_is_one_shot() {
        let api = FakeWslApi::new().with_distro("Ubuntu");
        api.fail_next(NativeCall::IsDistributionRegistered);

        assert!(api.is_distribution_registered(&wide("Ubuntu")).is_err());
        assert!(api.is_distribution_registered(&wide("Ubuntu")).unwrap());
    }
}
