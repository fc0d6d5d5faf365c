use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tracing::{debug, warn};
use wslkit_native::{NativeCall, RawHandle, STILL_ACTIVE, WslApi};

use crate::command::CommandState;
use crate::error::WslError;

// ============================================================================
// ProcessHandle - owner of one native process handle
// ============================================================================

struct Inner {
    api: Arc<dyn WslApi>,
    distro: String,
    raw: RawHandle,
    exit_status: Mutex<Option<u32>>,
    /// Set by the first release; the handle is unusable from then on.
    released: AtomicBool,
    /// Set once the native handle has actually been closed.
    closed: AtomicBool,
    /// Blocking waits currently using the native handle.
    waiters: AtomicUsize,
}

impl Inner {
    /// Mark the handle released and close it unless a wait is in flight.
    ///
    /// With waits in flight the native close happens when the last one
    /// returns.
    fn release(&self) -> Result<(), WslError> {
        if self.released.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        let waiters = self.waiters.load(Ordering::SeqCst);
        if waiters > 0 {
            debug!(
                distro = %self.distro,
                handle = self.raw.as_raw(),
                waiters,
                "deferring handle release until the wait returns"
            );
            return Ok(());
        }
        self.close_native()
    }

    fn close_native(&self) -> Result<(), WslError> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        debug!(distro = %self.distro, handle = self.raw.as_raw(), "releasing process handle");
        self.api
            .close_handle(self.raw)
            .map_err(|e| WslError::native(&self.distro, NativeCall::CloseHandle, e))
    }

    fn begin_wait(&self) -> WaitGuard<'_> {
        self.waiters.fetch_add(1, Ordering::SeqCst);
        WaitGuard { inner: self }
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        self.released.store(true, Ordering::SeqCst);
        if let Err(e) = self.close_native() {
            warn!(distro = %self.distro, error = %e, "failed to release process handle on drop");
        }
    }
}

/// Keeps the native handle open for the duration of a blocking wait.
struct WaitGuard<'a> {
    inner: &'a Inner,
}

impl Drop for WaitGuard<'_> {
    fn drop(&mut self) {
        let last = self.inner.waiters.fetch_sub(1, Ordering::SeqCst) == 1;
        if last && self.inner.released.load(Ordering::SeqCst) {
            if let Err(e) = self.inner.close_native() {
                warn!(distro = %self.inner.distro, error = %e, "deferred handle release failed");
            }
        }
    }
}

/// A launched process.
///
/// Clones share the same native handle; it is released exactly once, either
/// by the first [`release`](Self::release) or when the last clone is dropped.
#[derive(Clone)]
pub struct ProcessHandle {
    inner: Arc<Inner>,
}

impl fmt::Debug for ProcessHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProcessHandle")
            .field("distro", &self.inner.distro)
            .field("raw", &self.inner.raw)
            .field("exit_status", &self.cached_status())
            .field("released", &self.is_released())
            .finish()
    }
}

impl ProcessHandle {
    pub(crate) fn new(api: Arc<dyn WslApi>, distro: &str, raw: RawHandle) -> Self {
        Self {
            inner: Arc::new(Inner {
                api,
                distro: distro.to_string(),
                raw,
                exit_status: Mutex::new(None),
                released: AtomicBool::new(false),
                closed: AtomicBool::new(false),
                waiters: AtomicUsize::new(0),
            }),
        }
    }

    #[must_use]
    pub fn raw(&self) -> RawHandle {
        self.inner.raw
    }

    #[must_use]
    pub fn is_released(&self) -> bool {
        self.inner.released.load(Ordering::SeqCst)
    }

    /// The exit status seen so far, without asking the native layer.
    #[must_use]
    pub fn cached_status(&self) -> Option<u32> {
        *self.exit_slot()
    }

    fn exit_slot(&self) -> std::sync::MutexGuard<'_, Option<u32>> {
        self.inner.exit_status.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn ensure_open(&self, operation: &'static str) -> Result<(), WslError> {
        if self.is_released() {
            return Err(WslError::InvalidState {
                operation,
                state: CommandState::Closed,
            });
        }
        Ok(())
    }

    fn query_status(&self) -> Result<u32, WslError> {
        self.ensure_open("query")?;
        self.native_status()
    }

    fn native_status(&self) -> Result<u32, WslError> {
        self.inner
            .api
            .process_exit_code(self.inner.raw)
            .map_err(|e| WslError::native(&self.inner.distro, NativeCall::GetExitCode, e))
    }

    /// Exit status of the process; [`STILL_ACTIVE`] while it runs.
    ///
    /// A final status is cached and returned on later calls, including after
    /// the handle has been released.
    pub fn status(&self) -> Result<u32, WslError> {
        if let Some(status) = self.cached_status() {
            return Ok(status);
        }
        let status = self.query_status()?;
        if status != STILL_ACTIVE {
            *self.exit_slot() = Some(status);
        }
        Ok(status)
    }

    /// Force the process to stop.
    ///
    /// Whatever status the native layer reports right before termination is
    /// cached, even `STILL_ACTIVE`. A process that has already exited is not
    /// terminated and keeps its real exit code. The handle stays open.
    pub fn terminate(&self) -> Result<(), WslError> {
        self.ensure_open("kill")?;
        match self.query_status() {
            Ok(status) => {
                *self.exit_slot() = Some(status);
                if status != STILL_ACTIVE {
                    debug!(distro = %self.inner.distro, status, "process already exited, not terminating");
                    return Ok(());
                }
            }
            Err(e) => debug!(distro = %self.inner.distro, error = %e, "no status before terminate"),
        }
        self.inner
            .api
            .terminate_process(self.inner.raw, STILL_ACTIVE)
            .map_err(|e| WslError::native(&self.inner.distro, NativeCall::TerminateProcess, e))
    }

    /// Release the native handle. Later calls are no-ops.
    ///
    /// While another thread is blocked in [`wait_for_exit`](Self::wait_for_exit)
    /// the handle is only marked released; the native close happens when
    /// that wait returns.
    pub fn release(&self) -> Result<(), WslError> {
        self.inner.release()
    }

    /// Block until the process finishes, then read its status.
    ///
    /// The process may not be fully gone when the wait returns, so the
    /// status is only read after `settle_delay`.
    pub fn wait_for_exit(&self, settle_delay: Duration) -> Result<u32, WslError> {
        let _wait = self.inner.begin_wait();
        self.ensure_open("wait")?;
        self.inner
            .api
            .wait_for_process(self.inner.raw)
            .map_err(|e| WslError::native(&self.inner.distro, NativeCall::WaitForProcess, e))?;
        std::thread::sleep(settle_delay);

        // The handle is still open here even if it was released meanwhile.
        if let Some(status) = self.cached_status() {
            return Ok(status);
        }
        let status = self.native_status()?;
        if status != STILL_ACTIVE {
            *self.exit_slot() = Some(status);
        }
        Ok(status)
    }
}
