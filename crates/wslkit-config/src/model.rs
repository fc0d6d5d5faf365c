use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// `config.toml` as written by the user. Every field is optional.
#[derive(Debug, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct FileConfig {
    pub defaults: Option<DefaultsSection>,
    pub launch: Option<LaunchSection>,
    pub process: Option<ProcessSection>,
    pub wslexe: Option<WslExeSection>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct DefaultsSection {
    /// Distro used when a command does not name one
    pub distro: Option<String>,
    pub verbose: Option<bool>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct LaunchSection {
    /// Start commands in the host's working directory
    pub use_cwd: Option<bool>,
    /// Kill `run` commands after this many seconds
    pub deadline_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct ProcessSection {
    /// Pause between process completion and reading its exit code
    pub settle_delay_ms: Option<u64>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct WslExeSection {
    pub path: Option<PathBuf>,
}

/// Values given on the command line. `None` leaves lower layers in charge.
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    /// Explicit config file; disables discovery
    pub config_path: Option<PathBuf>,
    pub distro: Option<String>,
    pub verbose: Option<bool>,
    pub use_cwd: Option<bool>,
    pub deadline_secs: Option<u64>,
    pub settle_delay_ms: Option<u64>,
    pub wsl_exe: Option<PathBuf>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_file_parses() {
        let config: FileConfig = toml::from_str(
            r#"
            [defaults]
            distro = "Ubuntu-22.04"
            verbose = true

            [launch]
            use_cwd = true
            deadline_secs = 30

            [process]
            settle_delay_ms = 10

            [wslexe]
            path = 'C:\Windows\System32\wsl.exe'
            "#,
        )
        .unwrap();

        let defaults = config.defaults.unwrap();
        assert_eq!(defaults.distro.as_deref(), Some("Ubuntu-22.04"));
        assert_eq!(defaults.verbose, Some(true));
        assert_eq!(config.launch.unwrap().deadline_secs, Some(30));
        assert_eq!(config.process.unwrap().settle_delay_ms, Some(10));
        assert!(config.wslexe.unwrap().path.is_some());
    }

    #[test]
    fn test_empty_file_parses() {
        let config: FileConfig = toml::from_str("").unwrap();
        assert!(config.defaults.is_none());
        assert!(config.launch.is_none());
    }

    #[test]
    fn test_unknown_keys_are_rejected() {
        let result: Result<FileConfig, _> = toml::from_str("[defaults]\ndistor = \"typo\"\n");
        assert!(result.is_err());

        let result: Result<FileConfig, _> = toml::from_str("[runner]\nmode = \"wsl\"\n");
        assert!(result.is_err());
    }
}
