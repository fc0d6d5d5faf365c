use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use crate::Settings;

/// Where an effective setting came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    Cli,
    /// Environment variable, with its name
    Env(&'static str),
    ConfigFile(PathBuf),
    Defaults,
}

impl ConfigSource {
    /// Short label used in `wslkit config` output.
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::Cli => "cli",
            Self::Env(_) => "env",
            Self::ConfigFile(_) => "config",
            Self::Defaults => "default",
        }
    }
}

impl fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cli => write!(f, "CLI"),
            Self::Env(var) => write!(f, "environment ({var})"),
            Self::ConfigFile(path) => write!(f, "config file ({})", path.display()),
            Self::Defaults => write!(f, "defaults"),
        }
    }
}

impl Settings {
    /// Effective settings as `key -> (value, source label)`.
    ///
    /// Unset optional values are omitted.
    #[must_use]
    pub fn effective_config(&self) -> BTreeMap<String, (String, String)> {
        let mut config = BTreeMap::new();

        let mut add = |key: &str, value: Option<String>| {
            if let Some(value) = value {
                let source = self.source_of(key).map_or("default", ConfigSource::label);
                config.insert(key.to_string(), (value, source.to_string()));
            }
        };

        add("distro", self.distro.clone());
        add("verbose", Some(self.verbose.to_string()));
        add("use_cwd", Some(self.use_cwd.to_string()));
        add("deadline_secs", self.deadline.map(|d| d.as_secs().to_string()));
        add(
            "settle_delay_ms",
            Some(self.settle_delay.as_millis().to_string()),
        );
        add(
            "wsl_exe",
            self.wsl_exe.as_ref().map(|p| p.display().to_string()),
        );

        config
    }
}
