//! Layered configuration for wslkit
//!
//! Settings are resolved with precedence CLI > environment > config file >
//! defaults, and every effective value remembers where it came from so
//! `wslkit config` can show it.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

mod discovery;
mod model;
mod sources;

pub use discovery::{
    CONFIG_FILE, ENV_DEADLINE_SECS, ENV_DISTRO, ENV_SETTLE_DELAY_MS, PROJECT_DIR,
    discover_config_file_from,
};
pub use model::CliOverrides;
pub use sources::ConfigSource;

/// Upper bound for the post-wait settle delay.
pub const MAX_SETTLE_DELAY_MS: u64 = 1000;

/// Effective settings after layering.
#[derive(Debug, Clone)]
pub struct Settings {
    pub distro: Option<String>,
    pub verbose: bool,
    pub use_cwd: bool,
    /// Deadline for `run`; `None` waits indefinitely
    pub deadline: Option<Duration>,
    pub settle_delay: Duration,
    /// `wsl.exe` override; `None` searches `PATH`
    pub wsl_exe: Option<PathBuf>,
    /// The config file that was loaded, if any
    pub config_path: Option<PathBuf>,
    source_attribution: BTreeMap<&'static str, ConfigSource>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            distro: None,
            verbose: false,
            use_cwd: false,
            deadline: None,
            settle_delay: Duration::from_millis(5),
            wsl_exe: None,
            config_path: None,
            source_attribution: BTreeMap::new(),
        }
    }
}

impl Settings {
    /// Where the effective value of `key` came from.
    #[must_use]
    pub fn source_of(&self, key: &str) -> Option<&ConfigSource> {
        self.source_attribution.get(key)
    }
}
