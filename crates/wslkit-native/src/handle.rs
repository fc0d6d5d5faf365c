//! Raw native handles and the standard stream triple passed to `WslLaunch`.

/// Exit code of a process that has not finished yet (`STILL_ACTIVE`).
///
/// Also used as the exit code handed to `TerminateProcess`.
pub const STILL_ACTIVE: u32 = 259;

/// Exit code the native layer uses to report an internal error (underflowed -1).
pub const NATIVE_ERROR_EXIT: u32 = u32::MAX;

/// An opaque native handle value.
///
/// This is a plain value: it does not own anything. Ownership of process
/// handles lives in the distro layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct RawHandle(isize);

impl RawHandle {
    pub const NULL: RawHandle = RawHandle(0);

    #[must_use]
    pub const fn from_raw(value: isize) -> Self {
        Self(value)
    }

    #[must_use]
    pub const fn as_raw(self) -> isize {
        self.0
    }

    #[must_use]
    pub const fn is_null(self) -> bool {
        self.0 == 0
    }

    /// The host process' standard input handle.
    #[must_use]
    pub fn stdin() -> Self {
        platform_std_handle(StdStream::Input)
    }

    /// The host process' standard output handle.
    #[must_use]
    pub fn stdout() -> Self {
        platform_std_handle(StdStream::Output)
    }

    /// The host process' standard error handle.
    #[must_use]
    pub fn stderr() -> Self {
        platform_std_handle(StdStream::Error)
    }
}

#[cfg(windows)]
impl<T: std::os::windows::io::AsRawHandle> From<&T> for RawHandle {
    fn from(value: &T) -> Self {
        Self(value.as_raw_handle() as isize)
    }
}

#[derive(Clone, Copy)]
enum StdStream {
    Input,
    Output,
    Error,
}

#[cfg(windows)]
fn platform_std_handle(stream: StdStream) -> RawHandle {
    use std::os::windows::io::AsRawHandle;

    let raw = match stream {
        StdStream::Input => std::io::stdin().as_raw_handle(),
        StdStream::Output => std::io::stdout().as_raw_handle(),
        StdStream::Error => std::io::stderr().as_raw_handle(),
    };
    RawHandle(raw as isize)
}

#[cfg(not(windows))]
fn platform_std_handle(stream: StdStream) -> RawHandle {
    // Mirror the POSIX descriptor numbers; only meaningful to test doubles.
    match stream {
        StdStream::Input => RawHandle(0),
        StdStream::Output => RawHandle(1),
        StdStream::Error => RawHandle(2),
    }
}

/// The three stream handles a launched process inherits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StdioHandles {
    pub stdin: RawHandle,
    pub stdout: RawHandle,
    pub stderr: RawHandle,
}

impl StdioHandles {
    /// The host process' own standard streams.
    #[must_use]
    pub fn inherit() -> Self {
        Self {
            stdin: RawHandle::stdin(),
            stdout: RawHandle::stdout(),
            stderr: RawHandle::stderr(),
        }
    }
}

impl Default for StdioHandles {
    fn default() -> Self {
        Self::inherit()
    }
}
