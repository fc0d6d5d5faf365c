//! CLI argument definitions and parsing structures

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// wslkit - manage and drive WSL distributions
#[derive(Parser, Debug)]
#[command(name = "wslkit")]
#[command(about = "Register, configure and run commands in WSL distributions")]
#[command(long_about = r#"
wslkit drives Windows Subsystem for Linux distributions through the native
WSL API: register and unregister distros, read and change their
configuration, and run commands or interactive shells inside them.

EXAMPLES:
  # Register a distro from a root filesystem archive
  wslkit register Alpine ./alpine-minirootfs.tar.gz

  # Show a distro's configuration as YAML
  wslkit --distro Alpine show

  # Disable Windows interop and set the default user
  wslkit --distro Alpine set --interop false --default-uid 1000

  # Run a command, killing it after 30 seconds
  wslkit --distro Alpine run --timeout 30 -- make -j8

  # Open a shell in the current directory
  wslkit shell --cwd

CONFIGURATION:
  Configuration is loaded with precedence: CLI flags > environment > config file > defaults
  Config file is discovered by searching upward from CWD for .wslkit/config.toml
  Environment: WSLKIT_DISTRO, WSLKIT_SETTLE_DELAY_MS, WSLKIT_DEADLINE_SECS
  Use --config to specify an explicit config file path

EXIT CODES:
  0 success, 1 internal, 2 usage/config, 3 precondition, 10 deadline,
  70 WSL API failure; a failing command's own exit code is passed through
"#)]
#[command(version)]
pub struct Cli {
    /// Path to configuration file (overrides discovery)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Distro to operate on (defaults to the configured or WSL default distro)
    #[arg(short = 'd', long, global = true)]
    pub distro: Option<String>,

    /// Delay after a process exits before its exit code is read, in milliseconds
    #[arg(long, global = true)]
    pub settle_delay_ms: Option<u64>,

    /// Path to wsl.exe (overrides PATH lookup)
    #[arg(long, global = true)]
    pub wsl_exe: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Register a new distro from a tar archive
    Register {
        /// Name of the new distro
        name: String,

        /// Root filesystem archive (.tar or .tar.gz)
        archive: PathBuf,
    },

    /// Unregister a distro and delete its filesystem
    Unregister {
        /// Name of the distro to remove
        name: String,
    },

    /// Show a distro's configuration
    Show {
        /// Emit JSON instead of YAML
        #[arg(long)]
        json: bool,
    },

    /// Change a distro's configuration
    Set(SetArgs),

    /// Run a command inside a distro and wait for it
    Run {
        /// Start in the current directory instead of $HOME
        #[arg(long)]
        cwd: bool,

        /// Kill the command after this many seconds
        #[arg(long, value_name = "SECONDS")]
        timeout: Option<u64>,

        /// Command line to run
        #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
        command: Vec<String>,
    },

    /// Open an interactive shell inside a distro
    Shell {
        /// Start in the current directory instead of $HOME
        #[arg(long)]
        cwd: bool,

        /// Run this command instead of the default shell
        #[arg(long, short)]
        command: Option<String>,
    },

    /// List registered distros, default first
    List,

    /// Stop all processes of a distro
    Terminate,

    /// Make a distro the WSL default
    SetDefault,

    /// Power off all distros
    Shutdown,

    /// Show effective configuration and where each value came from
    Config,
}

#[derive(Args, Debug, Default)]
pub struct SetArgs {
    /// UID of the default user
    #[arg(long)]
    pub default_uid: Option<u32>,

    /// Allow launching Windows programs from inside the distro
    #[arg(long, value_name = "BOOL")]
    pub interop: Option<bool>,

    /// Append the Windows PATH to $PATH
    #[arg(long, value_name = "BOOL")]
    pub append_path: Option<bool>,

    /// Mount Windows drives under /mnt
    #[arg(long, value_name = "BOOL")]
    pub mount_drives: Option<bool>,
}

impl SetArgs {
    pub fn is_empty(&self) -> bool {
        self.default_uid.is_none()
            && self.interop.is_none()
            && self.append_path.is_none()
            && self.mount_drives.is_none()
    }
}
