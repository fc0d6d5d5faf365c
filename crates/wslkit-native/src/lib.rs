//! Bindings to the Windows Subsystem for Linux management API (`wslapi.dll`)
//!
//! Everything that touches native memory or handles lives here: NUL-terminated
//! wide strings, the distribution flag set, raw process handles, and the
//! decoder for the environment block returned by
//! `WslGetDistributionConfiguration`.
//!
//! The native calls sit behind the [`WslApi`] trait so the distro layer can be
//! driven by [`WindowsWslApi`] on Windows, and by an in-memory fake
//! (`test_support::FakeWslApi`, behind the `test-utils` feature) everywhere
//! else. On non-Windows builds [`default_api`] returns an implementation that
//! fails every call with [`NativeError::Unsupported`].
//!
//! # Memory ownership
//!
//! Memory handed over by the native side is released exactly once through a
//! [`NativeAllocator`], even when decoding fails partway through.

pub mod api;
pub mod env_block;
pub mod error;
pub mod flags;
pub mod handle;
pub mod platform;
pub mod wide;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_support;

pub use api::{RawConfiguration, WslApi};
pub use env_block::{MAX_ENV_ENTRY_LEN, NativeAllocator, decode_env_block};
pub use error::{EnvBlockError, NativeCall, NativeError};
pub use flags::DistroFlags;
pub use handle::{NATIVE_ERROR_EXIT, RawHandle, STILL_ACTIVE, StdioHandles};
pub use platform::default_api;
#[cfg(not(windows))]
pub use platform::UnsupportedWslApi;
#[cfg(windows)]
pub use platform::{CoTaskMemAllocator, WindowsWslApi};
pub use wide::WideString;
