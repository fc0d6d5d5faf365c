use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use wslkit_native::{WslApi, default_api};

use crate::distro::Distro;
use crate::error::WslError;
use crate::wslexe::WslExe;

/// Default pause between a process signalling completion and reading its status.
pub const DEFAULT_SETTLE_DELAY: Duration = Duration::from_millis(5);

/// Entry point to the subsystem.
///
/// Holds the native API, the post-wait settle delay and the `wsl.exe`
/// helper. Cloning is cheap; every [`Distro`] keeps its own clone.
#[derive(Clone)]
pub struct Wsl {
    api: Arc<dyn WslApi>,
    settle_delay: Duration,
    wsl_exe: WslExe,
}

impl fmt::Debug for Wsl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Wsl")
            .field("settle_delay", &self.settle_delay)
            .field("wsl_exe", &self.wsl_exe)
            .finish_non_exhaustive()
    }
}

impl Default for Wsl {
    fn default() -> Self {
        Self::with_api(default_api())
    }
}

impl Wsl {
    /// Context backed by the platform's native API.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_api(api: Arc<dyn WslApi>) -> Self {
        Self {
            api,
            settle_delay: DEFAULT_SETTLE_DELAY,
            wsl_exe: WslExe::default(),
        }
    }

    #[must_use]
    pub fn settle_delay(mut self, delay: Duration) -> Self {
        self.settle_delay = delay;
        self
    }

    #[must_use]
    pub fn wsl_exe(mut self, wsl_exe: WslExe) -> Self {
        self.wsl_exe = wsl_exe;
        self
    }

    pub(crate) fn api(&self) -> &Arc<dyn WslApi> {
        &self.api
    }

    pub(crate) fn get_settle_delay(&self) -> Duration {
        self.settle_delay
    }

    pub(crate) fn get_wsl_exe(&self) -> &WslExe {
        &self.wsl_exe
    }

    /// A handle to the distro called `name`. Nothing is checked yet.
    #[must_use]
    pub fn distro(&self, name: impl Into<String>) -> Distro {
        Distro::new(self.clone(), name.into())
    }

    /// Power off every distro (`wsl --shutdown`).
    pub fn shutdown(&self) -> Result<(), WslError> {
        self.wsl_exe.shutdown()
    }

    /// Registered distros, default first.
    pub fn registered_distros(&self) -> Result<Vec<Distro>, WslError> {
        Ok(self
            .wsl_exe
            .list()?
            .into_iter()
            .map(|name| self.distro(name))
            .collect())
    }

    /// The default distro, if any is registered.
    pub fn default_distro(&self) -> Result<Option<Distro>, WslError> {
        Ok(self.registered_distros()?.into_iter().next())
    }
}
