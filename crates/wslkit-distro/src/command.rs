//! The command lifecycle.
//!
//! A [`Command`] is created by [`Distro::command`] (attached: the process
//! runs in the background behind a [`ProcessHandle`]) or by
//! [`Distro::shell`](crate::Distro::shell) (interactive: one blocking native
//! call that launches and waits). Both share this state machine:
//!
//! ```text
//! Unstarted --start--> Running --wait--> Completed
//!     |                   |
//!     |                   +--close--> Closed
//!     +--(start fails)--> StartFailed
//! ```
//!
//! `kill` keeps the command `Running`: the caller still releases the handle
//! through `wait` or `close`. Misuse returns [`WslError::InvalidState`].

use std::fmt;
use std::time::Duration;

use tracing::{debug, info, warn};
use wslkit_native::{NativeCall, RawHandle, StdioHandles};

use crate::distro::Distro;
use crate::error::{WslError, exit_status};
use crate::process::ProcessHandle;

/// Where a command is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandState {
    Unstarted,
    Running,
    Completed,
    Closed,
    StartFailed,
}

impl fmt::Display for CommandState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unstarted => write!(f, "unstarted"),
            Self::Running => write!(f, "running"),
            Self::Completed => write!(f, "completed"),
            Self::Closed => write!(f, "closed"),
            Self::StartFailed => write!(f, "start-failed"),
        }
    }
}

/// How the command is launched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LaunchMode {
    /// `WslLaunch`: runs in the background with the given stream handles.
    Attached,
    /// `WslLaunchInteractive`: blocks on the console until the command exits.
    Interactive,
}

enum Lifecycle {
    Unstarted,
    Running(ProcessHandle),
    Completed,
    Closed,
    StartFailed,
}

impl Lifecycle {
    fn state(&self) -> CommandState {
        match self {
            Self::Unstarted => CommandState::Unstarted,
            Self::Running(_) => CommandState::Running,
            Self::Completed => CommandState::Completed,
            Self::Closed => CommandState::Closed,
            Self::StartFailed => CommandState::StartFailed,
        }
    }
}

/// A command to be run inside a distro.
pub struct Command {
    pub stdin: RawHandle,
    pub stdout: RawHandle,
    pub stderr: RawHandle,
    /// Start in the host's working directory instead of the user's home.
    pub use_cwd: bool,

    distro: Distro,
    command_line: String,
    mode: LaunchMode,
    lifecycle: Lifecycle,
}

impl fmt::Debug for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Command")
            .field("distro", &self.distro.name())
            .field("command_line", &self.command_line)
            .field("mode", &self.mode)
            .field("use_cwd", &self.use_cwd)
            .field("state", &self.state())
            .finish()
    }
}

impl Command {
    pub(crate) fn new(distro: Distro, command_line: String, mode: LaunchMode) -> Self {
        let stdio = StdioHandles::inherit();
        Self {
            stdin: stdio.stdin,
            stdout: stdio.stdout,
            stderr: stdio.stderr,
            use_cwd: false,
            distro,
            command_line,
            mode,
            lifecycle: Lifecycle::Unstarted,
        }
    }

    #[must_use]
    pub fn distro(&self) -> &Distro {
        &self.distro
    }

    #[must_use]
    pub fn command_line(&self) -> &str {
        &self.command_line
    }

    #[must_use]
    pub fn mode(&self) -> LaunchMode {
        self.mode
    }

    #[must_use]
    pub fn state(&self) -> CommandState {
        self.lifecycle.state()
    }

    /// The running process, while there is one.
    #[must_use]
    pub fn process(&self) -> Option<&ProcessHandle> {
        match &self.lifecycle {
            Lifecycle::Running(handle) => Some(handle),
            _ => None,
        }
    }

    pub(crate) fn settle_delay(&self) -> Duration {
        self.distro.context().get_settle_delay()
    }

    fn invalid(&self, operation: &'static str) -> WslError {
        WslError::InvalidState {
            operation,
            state: self.state(),
        }
    }

    fn stdio(&self) -> StdioHandles {
        StdioHandles {
            stdin: self.stdin,
            stdout: self.stdout,
            stderr: self.stderr,
        }
    }

    pub(crate) fn running_handle(&self, operation: &'static str) -> Result<ProcessHandle, WslError> {
        self.process().cloned().ok_or_else(|| self.invalid(operation))
    }

    /// Launch the command without waiting for it.
    pub fn start(&mut self) -> Result<(), WslError> {
        if !matches!(self.lifecycle, Lifecycle::Unstarted) {
            return Err(self.invalid("start"));
        }
        if self.mode == LaunchMode::Interactive {
            return Err(WslError::InvalidArgument {
                distro: self.distro.name().to_string(),
                reason: "interactive commands can only be run to completion".to_string(),
            });
        }

        match self.launch() {
            Ok(handle) => {
                debug!(
                    distro = %self.distro.name(),
                    command = %self.command_line,
                    handle = handle.raw().as_raw(),
                    "command started"
                );
                self.lifecycle = Lifecycle::Running(handle);
                Ok(())
            }
            Err(e) => {
                self.lifecycle = Lifecycle::StartFailed;
                Err(e)
            }
        }
    }

    fn launch(&self) -> Result<ProcessHandle, WslError> {
        self.distro.ensure_registered()?;

        let command = self
            .distro
            .wide(NativeCall::Launch, &self.command_line, "command")?;
        let (use_cwd, stdio) = (self.use_cwd, self.stdio());
        let raw = self.distro.native(NativeCall::Launch, |api, name| {
            api.launch(name, &command, use_cwd, stdio)
        })?;

        Ok(ProcessHandle::new(
            self.distro.context().api().clone(),
            self.distro.name(),
            raw,
        ))
    }

    /// Block until the command finishes, then release its handle.
    ///
    /// A non-zero exit code is returned as [`WslError::Exit`].
    pub fn wait(&mut self) -> Result<(), WslError> {
        let handle = self.running_handle("wait")?;
        let status = handle.wait_for_exit(self.settle_delay());
        self.finish(status)
    }

    /// [`wait`](Self::wait) without blocking the async runtime.
    ///
    /// The blocking wait runs on tokio's blocking pool.
    pub async fn wait_async(&mut self) -> Result<(), WslError> {
        let handle = self.running_handle("wait")?;
        let settle_delay = self.settle_delay();
        let status = tokio::task::spawn_blocking(move || handle.wait_for_exit(settle_delay))
            .await
            .unwrap_or_else(|e| {
                Err(WslError::BackgroundTask {
                    reason: e.to_string(),
                })
            });
        self.finish(status)
    }

    /// Release the handle and turn the raw status into the command's outcome.
    pub(crate) fn finish(&mut self, status: Result<u32, WslError>) -> Result<(), WslError> {
        let released = match std::mem::replace(&mut self.lifecycle, Lifecycle::Completed) {
            Lifecycle::Running(handle) => handle.release(),
            other => {
                self.lifecycle = other;
                Ok(())
            }
        };

        let outcome = status.and_then(|code| {
            debug!(distro = %self.distro.name(), command = %self.command_line, code, "command finished");
            exit_status(self.distro.name(), NativeCall::GetExitCode, code)
        });
        match (outcome, released) {
            (Ok(()), Err(e)) => Err(e),
            (outcome, Err(e)) => {
                warn!(distro = %self.distro.name(), error = %e, "failed to release process handle");
                outcome
            }
            (outcome, Ok(())) => outcome,
        }
    }

    /// Start the command and wait for it.
    ///
    /// Interactive commands make a single blocking call that does both.
    pub fn run(&mut self) -> Result<(), WslError> {
        if self.mode == LaunchMode::Interactive {
            return self.run_interactive();
        }
        self.start()?;
        self.wait()
    }

    /// [`run`](Self::run) without blocking the async runtime.
    pub async fn run_async(&mut self) -> Result<(), WslError> {
        if self.mode == LaunchMode::Interactive {
            return Err(WslError::InvalidArgument {
                distro: self.distro.name().to_string(),
                reason: "interactive commands hold the console and cannot run in the background"
                    .to_string(),
            });
        }
        self.start()?;
        self.wait_async().await
    }

    fn run_interactive(&mut self) -> Result<(), WslError> {
        if !matches!(self.lifecycle, Lifecycle::Unstarted) {
            return Err(self.invalid("run"));
        }

        let launched = self.distro.ensure_registered().and_then(|()| {
            let command = self
                .distro
                .wide(NativeCall::LaunchInteractive, &self.command_line, "command")?;
            let use_cwd = self.use_cwd;
            self.distro.native(NativeCall::LaunchInteractive, |api, name| {
                api.launch_interactive(name, &command, use_cwd)
            })
        });

        match launched {
            Ok(code) => {
                self.lifecycle = Lifecycle::Completed;
                exit_status(self.distro.name(), NativeCall::LaunchInteractive, code)
            }
            Err(e) => {
                self.lifecycle = Lifecycle::StartFailed;
                Err(e)
            }
        }
    }

    /// Force the running process to stop.
    ///
    /// The handle is not released; follow up with [`wait`](Self::wait) or
    /// [`close`](Self::close).
    pub fn kill(&mut self) -> Result<(), WslError> {
        let handle = self.running_handle("kill")?;
        info!(distro = %self.distro.name(), command = %self.command_line, "killing command");
        handle.terminate()
    }

    /// Release the process handle. Safe to call in any state, any number of times.
    pub fn close(&mut self) -> Result<(), WslError> {
        match std::mem::replace(&mut self.lifecycle, Lifecycle::Closed) {
            Lifecycle::Running(handle) => handle.release(),
            other => {
                self.lifecycle = other;
                Ok(())
            }
        }
    }

    /// Give up the process without releasing it here.
    ///
    /// Other clones of the handle keep it alive; the last one to drop
    /// releases it.
    pub(crate) fn abandon(&mut self) {
        if matches!(self.lifecycle, Lifecycle::Running(_)) {
            self.lifecycle = Lifecycle::Closed;
        }
    }
}
