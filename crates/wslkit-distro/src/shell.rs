//! Interactive sessions.

use crate::command::{Command, LaunchMode};
use crate::distro::Distro;
use crate::error::WslError;

/// Options for [`Distro::shell`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShellOptions {
    command: String,
    use_cwd: bool,
}

impl ShellOptions {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Start in the host's working directory instead of the user's `$HOME`.
    #[must_use]
    pub fn use_cwd(mut self) -> Self {
        self.use_cwd = true;
        self
    }

    /// Run `command` instead of the user's default shell.
    #[must_use]
    pub fn with_command(mut self, command: impl Into<String>) -> Self {
        self.command = command.into();
        self
    }
}

impl Distro {
    /// An interactive command; see [`shell`](Self::shell).
    #[must_use]
    pub fn interactive_command(&self, options: ShellOptions) -> Command {
        let mut cmd = Command::new(self.clone(), options.command, LaunchMode::Interactive);
        cmd.use_cwd = options.use_cwd;
        cmd
    }

    /// Open an interactive session on the host console and block until it ends.
    ///
    /// Without [`ShellOptions::with_command`] the user's default shell is
    /// started. A non-zero exit code is returned as [`WslError::Exit`].
    pub fn shell(&self, options: ShellOptions) -> Result<(), WslError> {
        self.interactive_command(options).run()
    }
}
