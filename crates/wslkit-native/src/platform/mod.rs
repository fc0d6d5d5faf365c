//! Platform implementations of [`WslApi`](crate::WslApi).

use std::sync::Arc;

use crate::api::WslApi;

#[cfg(not(windows))]
mod unsupported;
#[cfg(windows)]
mod windows;

#[cfg(not(windows))]
pub use unsupported::UnsupportedWslApi;
#[cfg(windows)]
pub use windows::{CoTaskMemAllocator, WindowsWslApi};

/// The API implementation for the platform this crate was built for.
#[must_use]
pub fn default_api() -> Arc<dyn WslApi> {
    #[cfg(windows)]
    {
        Arc::new(WindowsWslApi::new())
    }

    #[cfg(not(windows))]
    {
        Arc::new(UnsupportedWslApi::new())
    }
}
