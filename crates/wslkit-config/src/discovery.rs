use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use tracing::debug;

use crate::model::{CliOverrides, FileConfig};
use crate::sources::ConfigSource;
use crate::{MAX_SETTLE_DELAY_MS, Settings};

pub const ENV_DISTRO: &str = "WSLKIT_DISTRO";
pub const ENV_SETTLE_DELAY_MS: &str = "WSLKIT_SETTLE_DELAY_MS";
pub const ENV_DEADLINE_SECS: &str = "WSLKIT_DEADLINE_SECS";

/// Directory holding a project-local `config.toml`.
pub const PROJECT_DIR: &str = ".wslkit";
pub const CONFIG_FILE: &str = "config.toml";

impl Settings {
    /// Load settings with precedence: CLI > environment > config file > defaults
    ///
    /// The config file is `--config` if given, else the nearest
    /// `.wslkit/config.toml` above the working directory, else
    /// `<user config dir>/wslkit/config.toml`.
    pub fn discover(cli: &CliOverrides) -> Result<Self> {
        let start_dir = std::env::current_dir().context("Failed to get current directory")?;
        Self::load(cli, &start_dir, dirs::config_dir().as_deref(), |key| {
            std::env::var(key).ok()
        })
    }

    /// Path- and environment-driven variant of [`discover`](Self::discover).
    pub fn load(
        cli: &CliOverrides,
        start_dir: &Path,
        user_config_dir: Option<&Path>,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self> {
        let mut settings = Settings::default();
        let mut sources: BTreeMap<&'static str, ConfigSource> = ["verbose", "use_cwd", "settle_delay_ms"]
            .into_iter()
            .map(|key| (key, ConfigSource::Defaults))
            .collect();

        // Config file
        let config_path = match &cli.config_path {
            Some(explicit) => Some(explicit.clone()),
            None => discover_config_file_from(start_dir)
                .or_else(|| user_config_file(user_config_dir)),
        };

        if let Some(path) = &config_path {
            debug!(path = %path.display(), "loading config file");
            let file = load_config_file(path)?;
            let source = ConfigSource::ConfigFile(path.clone());

            if let Some(defaults) = file.defaults {
                if let Some(distro) = defaults.distro {
                    settings.distro = Some(distro);
                    sources.insert("distro", source.clone());
                }
                if let Some(verbose) = defaults.verbose {
                    settings.verbose = verbose;
                    sources.insert("verbose", source.clone());
                }
            }
            if let Some(launch) = file.launch {
                if let Some(use_cwd) = launch.use_cwd {
                    settings.use_cwd = use_cwd;
                    sources.insert("use_cwd", source.clone());
                }
                if let Some(secs) = launch.deadline_secs {
                    settings.deadline = Some(deadline(secs, "launch.deadline_secs")?);
                    sources.insert("deadline_secs", source.clone());
                }
            }
            if let Some(process) = file.process
                && let Some(ms) = process.settle_delay_ms
            {
                settings.settle_delay = settle_delay(ms, "process.settle_delay_ms")?;
                sources.insert("settle_delay_ms", source.clone());
            }
            if let Some(wslexe) = file.wslexe
                && let Some(path) = wslexe.path
            {
                settings.wsl_exe = Some(path);
                sources.insert("wsl_exe", source.clone());
            }
        }

        // Environment
        if let Some(distro) = env(ENV_DISTRO).filter(|d| !d.trim().is_empty()) {
            settings.distro = Some(distro);
            sources.insert("distro", ConfigSource::Env(ENV_DISTRO));
        }
        if let Some(raw) = env(ENV_SETTLE_DELAY_MS) {
            let ms = parse_number(&raw, ENV_SETTLE_DELAY_MS)?;
            settings.settle_delay = settle_delay(ms, ENV_SETTLE_DELAY_MS)?;
            sources.insert("settle_delay_ms", ConfigSource::Env(ENV_SETTLE_DELAY_MS));
        }
        if let Some(raw) = env(ENV_DEADLINE_SECS) {
            let secs = parse_number(&raw, ENV_DEADLINE_SECS)?;
            settings.deadline = Some(deadline(secs, ENV_DEADLINE_SECS)?);
            sources.insert("deadline_secs", ConfigSource::Env(ENV_DEADLINE_SECS));
        }

        // CLI
        if let Some(distro) = &cli.distro {
            settings.distro = Some(distro.clone());
            sources.insert("distro", ConfigSource::Cli);
        }
        if let Some(verbose) = cli.verbose {
            settings.verbose = verbose;
            sources.insert("verbose", ConfigSource::Cli);
        }
        if let Some(use_cwd) = cli.use_cwd {
            settings.use_cwd = use_cwd;
            sources.insert("use_cwd", ConfigSource::Cli);
        }
        if let Some(secs) = cli.deadline_secs {
            settings.deadline = Some(deadline(secs, "--timeout")?);
            sources.insert("deadline_secs", ConfigSource::Cli);
        }
        if let Some(ms) = cli.settle_delay_ms {
            settings.settle_delay = settle_delay(ms, "--settle-delay-ms")?;
            sources.insert("settle_delay_ms", ConfigSource::Cli);
        }
        if let Some(path) = &cli.wsl_exe {
            settings.wsl_exe = Some(path.clone());
            sources.insert("wsl_exe", ConfigSource::Cli);
        }

        settings.config_path = config_path;
        settings.source_attribution = sources;
        Ok(settings)
    }
}

/// Search upward from `start_dir` for `.wslkit/config.toml`.
///
/// Stops at the first repository root (`.git`, `.hg`, `.svn`).
#[must_use]
pub fn discover_config_file_from(start_dir: &Path) -> Option<PathBuf> {
    for dir in start_dir.ancestors() {
        let candidate = dir.join(PROJECT_DIR).join(CONFIG_FILE);
        if candidate.is_file() {
            return Some(candidate);
        }
        if [".git", ".hg", ".svn"].iter().any(|m| dir.join(m).exists()) {
            break;
        }
    }
    None
}

fn user_config_file(user_config_dir: Option<&Path>) -> Option<PathBuf> {
    let candidate = user_config_dir?.join("wslkit").join(CONFIG_FILE);
    candidate.is_file().then_some(candidate)
}

fn load_config_file(path: &Path) -> Result<FileConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    toml::from_str(&content)
        .with_context(|| format!("Failed to parse TOML config file: {}", path.display()))
}

fn parse_number(raw: &str, key: &str) -> Result<u64> {
    raw.trim()
        .parse()
        .with_context(|| format!("{key} must be a non-negative integer, got {raw:?}"))
}

fn settle_delay(ms: u64, key: &str) -> Result<Duration> {
    if ms > MAX_SETTLE_DELAY_MS {
        bail!("{key} must be at most {MAX_SETTLE_DELAY_MS} ms, got {ms}");
    }
    Ok(Duration::from_millis(ms))
}

fn deadline(secs: u64, key: &str) -> Result<Duration> {
    if secs == 0 {
        bail!("{key} must be at least 1 second");
    }
    Ok(Duration::from_secs(secs))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    fn write_project_config(root: &Path, content: &str) -> PathBuf {
        let dir = root.join(PROJECT_DIR);
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join(CONFIG_FILE);
        fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_defaults_without_any_source() {
        let temp = TempDir::new().unwrap();
        fs::create_dir(temp.path().join(".git")).unwrap();

        let settings = Settings::load(&CliOverrides::default(), temp.path(), None, no_env).unwrap();
        assert_eq!(settings.distro, None);
        assert_eq!(settings.settle_delay, Duration::from_millis(5));
        assert_eq!(settings.deadline, None);
        assert!(settings.config_path.is_none());
        assert_eq!(settings.source_of("settle_delay_ms"), Some(&ConfigSource::Defaults));
        assert_eq!(settings.source_of("distro"), None);
    }

    #[test]
    fn test_upward_discovery() {
        let temp = TempDir::new().unwrap();
        fs::create_dir(temp.path().join(".git")).unwrap();
        let path = write_project_config(temp.path(), "[defaults]\ndistro = \"Debian\"\n");
        let nested = temp.path().join("a").join("b");
        fs::create_dir_all(&nested).unwrap();

        assert_eq!(discover_config_file_from(&nested), Some(path.clone()));

        let settings = Settings::load(&CliOverrides::default(), &nested, None, no_env).unwrap();
        assert_eq!(settings.distro.as_deref(), Some("Debian"));
        assert_eq!(
            settings.source_of("distro"),
            Some(&ConfigSource::ConfigFile(path))
        );
    }

    #[test]
    fn test_discovery_stops_at_repository_root() {
        let temp = TempDir::new().unwrap();
        write_project_config(temp.path(), "[defaults]\ndistro = \"Outside\"\n");
        let repo = temp.path().join("repo");
        fs::create_dir_all(repo.join(".git")).unwrap();

        assert_eq!(discover_config_file_from(&repo), None);
    }

    #[test]
    fn test_user_config_dir_fallback() {
        let temp = TempDir::new().unwrap();
        let project = temp.path().join("project");
        fs::create_dir_all(project.join(".git")).unwrap();
        let user_dir = temp.path().join("user");
        fs::create_dir_all(user_dir.join("wslkit")).unwrap();
        fs::write(
            user_dir.join("wslkit").join(CONFIG_FILE),
            "[process]\nsettle_delay_ms = 20\n",
        )
        .unwrap();

        let settings =
            Settings::load(&CliOverrides::default(), &project, Some(&user_dir), no_env).unwrap();
        assert_eq!(settings.settle_delay, Duration::from_millis(20));
    }

    #[test]
    fn test_precedence_cli_over_env_over_file() {
        let temp = TempDir::new().unwrap();
        fs::create_dir(temp.path().join(".git")).unwrap();
        write_project_config(
            temp.path(),
            "[defaults]\ndistro = \"FromFile\"\n[launch]\ndeadline_secs = 60\nuse_cwd = true\n",
        );

        let env = |key: &str| match key {
            ENV_DISTRO => Some("FromEnv".to_string()),
            ENV_DEADLINE_SECS => Some("30".to_string()),
            _ => None,
        };
        let cli = CliOverrides {
            distro: Some("FromCli".to_string()),
            ..CliOverrides::default()
        };

        let settings = Settings::load(&cli, temp.path(), None, env).unwrap();
        assert_eq!(settings.distro.as_deref(), Some("FromCli"));
        assert_eq!(settings.source_of("distro"), Some(&ConfigSource::Cli));
        assert_eq!(settings.deadline, Some(Duration::from_secs(30)));
        assert_eq!(
            settings.source_of("deadline_secs"),
            Some(&ConfigSource::Env(ENV_DEADLINE_SECS))
        );
        assert!(settings.use_cwd);
        assert_eq!(settings.source_of("use_cwd").map(ConfigSource::label), Some("config"));
    }

    #[test]
    fn test_explicit_config_path_wins_over_discovery() {
        let temp = TempDir::new().unwrap();
        fs::create_dir(temp.path().join(".git")).unwrap();
        write_project_config(temp.path(), "[defaults]\ndistro = \"Discovered\"\n");
        let explicit = temp.path().join("other.toml");
        fs::write(&explicit, "[defaults]\ndistro = \"Explicit\"\n").unwrap();

        let cli = CliOverrides {
            config_path: Some(explicit.clone()),
            ..CliOverrides::default()
        };
        let settings = Settings::load(&cli, temp.path(), None, no_env).unwrap();
        assert_eq!(settings.distro.as_deref(), Some("Explicit"));
        assert_eq!(settings.config_path, Some(explicit));
    }

    #[test]
    fn test_missing_explicit_config_is_an_error() {
        let temp = TempDir::new().unwrap();
        let cli = CliOverrides {
            config_path: Some(temp.path().join("missing.toml")),
            ..CliOverrides::default()
        };
        let err = Settings::load(&cli, temp.path(), None, no_env).unwrap_err();
        assert!(err.to_string().contains("Failed to read config file"));
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        let temp = TempDir::new().unwrap();
        fs::create_dir(temp.path().join(".git")).unwrap();

        let env = |key: &str| (key == ENV_SETTLE_DELAY_MS).then(|| "soon".to_string());
        let err = Settings::load(&CliOverrides::default(), temp.path(), None, env).unwrap_err();
        assert!(err.to_string().contains(ENV_SETTLE_DELAY_MS));

        let cli = CliOverrides {
            deadline_secs: Some(0),
            ..CliOverrides::default()
        };
        assert!(Settings::load(&cli, temp.path(), None, no_env).is_err());

        let cli = CliOverrides {
            settle_delay_ms: Some(MAX_SETTLE_DELAY_MS + 1),
            ..CliOverrides::default()
        };
        assert!(Settings::load(&cli, temp.path(), None, no_env).is_err());
    }

    #[test]
    fn test_malformed_toml_names_the_file() {
        let temp = TempDir::new().unwrap();
        fs::create_dir(temp.path().join(".git")).unwrap();
        let path = write_project_config(temp.path(), "[defaults\ndistro = ");

        let err = Settings::load(&CliOverrides::default(), temp.path(), None, no_env).unwrap_err();
        assert!(format!("{err:#}").contains(&path.display().to_string()));
    }

    #[test]
    fn test_blank_env_distro_is_ignored() {
        let temp = TempDir::new().unwrap();
        fs::create_dir(temp.path().join(".git")).unwrap();
        let env = |key: &str| (key == ENV_DISTRO).then(|| "  ".to_string());

        let settings = Settings::load(&CliOverrides::default(), temp.path(), None, env).unwrap();
        assert_eq!(settings.distro, None);
    }
}
