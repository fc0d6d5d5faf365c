//! Stopping a running command from outside.
//!
//! The blocking native wait cannot be interrupted directly. Instead the
//! command is killed, which makes the wait return, and only then is the
//! handle released.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing::{info, warn};
use wslkit_native::STILL_ACTIVE;

use crate::command::Command;
use crate::error::{CancelReason, WslError};

/// A cloneable flag that can be raised once to cancel commands.
#[derive(Debug, Clone)]
pub struct CancellationToken {
    tx: Arc<watch::Sender<bool>>,
    rx: watch::Receiver<bool>,
}

impl Default for CancellationToken {
    fn default() -> Self {
        let (tx, rx) = watch::channel(false);
        Self { tx: Arc::new(tx), rx }
    }
}

impl CancellationToken {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once [`cancel`](Self::cancel) has been called on any clone.
    pub async fn cancelled(&self) {
        let mut rx = self.rx.clone();
        // The sender lives as long as `self`, so this only returns once cancelled.
        let _ = rx.wait_for(|cancelled| *cancelled).await;
    }
}

/// Run `cmd`, killing it if it is still running after `deadline`.
///
/// Returns [`WslError::Cancelled`] when the deadline wins. A command that
/// finishes right at the deadline reports its real outcome.
pub async fn run_with_deadline(cmd: &mut Command, deadline: Duration) -> Result<(), WslError> {
    race(cmd, tokio::time::sleep(deadline), CancelReason::Deadline(deadline)).await
}

/// Run `cmd`, killing it if `signal` resolves first.
pub async fn run_until<F>(cmd: &mut Command, signal: F) -> Result<(), WslError>
where
    F: Future<Output = ()>,
{
    race(cmd, signal, CancelReason::Signal).await
}

/// Run `cmd`, killing it if `token` is cancelled first.
pub async fn run_with_token(cmd: &mut Command, token: &CancellationToken) -> Result<(), WslError> {
    run_until(cmd, token.cancelled()).await
}

async fn race<F>(cmd: &mut Command, signal: F, reason: CancelReason) -> Result<(), WslError>
where
    F: Future<Output = ()>,
{
    cmd.start()?;

    let handle = cmd.running_handle("wait")?;
    let settle_delay = cmd.settle_delay();
    let mut waiter = tokio::task::spawn_blocking(move || handle.wait_for_exit(settle_delay));
    tokio::pin!(signal);

    tokio::select! {
        biased;

        joined = &mut waiter => {
            let status = joined.unwrap_or_else(|e| {
                Err(WslError::BackgroundTask { reason: e.to_string() })
            });
            cmd.finish(status)
        }

        () = &mut signal => {
            info!(
                distro = %cmd.distro().name(),
                command = %cmd.command_line(),
                %reason,
                "stopping command"
            );

            let process = cmd.running_handle("kill")?;
            if let Err(e) = cmd.kill() {
                // The waiter may block for as long as the process lives. Leave the
                // handle to it; the last clone releases it.
                warn!(distro = %cmd.distro().name(), error = %e, "kill failed, detaching waiter");
                cmd.abandon();
                return Err(e);
            }

            // Let the waiter return before the handle goes away under it.
            let status = waiter.await.unwrap_or_else(|e| {
                warn!(error = %e, "waiter task failed after kill");
                Err(WslError::BackgroundTask { reason: e.to_string() })
            });

            // Exited on its own before the kill landed; that outcome stands.
            if process.cached_status().is_some_and(|code| code != STILL_ACTIVE) {
                return cmd.finish(status);
            }
            cmd.close()?;

            Err(WslError::Cancelled {
                distro: cmd.distro().name().to_string(),
                command: cmd.command_line().to_string(),
                reason,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::CommandState;
    use crate::context::Wsl;
    use std::time::Instant;
    use wslkit_native::NativeCall;
    use wslkit_native::test_support::FakeWslApi;

    fn setup() -> (Arc<FakeWslApi>, Wsl) {
        let api = Arc::new(FakeWslApi::new().with_distro("Ubuntu"));
        let wsl = Wsl::with_api(api.clone());
        (api, wsl)
    }

    #[tokio::test]
    async fn test_deadline_kills_long_command() {
        let (api, wsl) = setup();
        api.script("sleep 5", 0, Duration::from_secs(5));
        let mut cmd = wsl.distro("Ubuntu").command("sleep 5");

        let started = Instant::now();
        let err = run_with_deadline(&mut cmd, Duration::from_millis(100))
            .await
            .unwrap_err();

        assert!(err.is_cancelled(), "got {err:?}");
        assert_eq!(err.exit_code(), None);
        assert!(started.elapsed() < Duration::from_secs(2));
        assert_eq!(cmd.state(), CommandState::Closed);

        let raw = api.handles()[0];
        assert!(api.was_terminated(raw));
        assert_eq!(api.close_count(raw), 1);
    }

    #[tokio::test]
    async fn test_completion_before_deadline_disarms() {
        let (api, wsl) = setup();
        api.script("exit 7", 7, Duration::from_millis(10));
        let mut cmd = wsl.distro("Ubuntu").command("exit 7");

        let err = run_with_deadline(&mut cmd, Duration::from_secs(5))
            .await
            .unwrap_err();

        assert_eq!(err.exit_code(), Some(7));
        assert_eq!(cmd.state(), CommandState::Completed);

        let raw = api.handles()[0];
        assert!(!api.was_terminated(raw));
        assert_eq!(api.close_count(raw), 1);
    }

    #[tokio::test]
    async fn test_token_cancels_command() {
        let (api, wsl) = setup();
        api.script("sleep 60", 0, Duration::from_secs(60));
        let mut cmd = wsl.distro("Ubuntu").command("sleep 60");
        let token = CancellationToken::new();

        let canceller = {
            let token = token.clone();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(50)).await;
                token.cancel();
            })
        };

        let err = run_with_token(&mut cmd, &token).await.unwrap_err();
        canceller.await.unwrap();

        assert!(matches!(
            err,
            WslError::Cancelled {
                reason: CancelReason::Signal,
                ..
            }
        ));
        assert!(token.is_cancelled());
        assert_eq!(api.close_count(api.handles()[0]), 1);
    }

    #[tokio::test]
    async fn test_deadline_after_natural_exit_keeps_outcome() {
        let (api, wsl) = setup();
        // The process is gone at once; the waiter is still settling when the
        // deadline fires.
        let wsl = wsl.settle_delay(Duration::from_millis(400));
        api.script("exit 3", 3, Duration::ZERO);
        let mut cmd = wsl.distro("Ubuntu").command("exit 3");

        let err = run_with_deadline(&mut cmd, Duration::from_millis(50))
            .await
            .unwrap_err();
        assert_eq!(err.exit_code(), Some(3), "{err}");
        assert_eq!(cmd.state(), CommandState::Completed);

        let handle = api.handles()[0];
        assert!(!api.was_terminated(handle));
        assert_eq!(api.call_count(NativeCall::TerminateProcess), 0);
        assert_eq!(api.close_count(handle), 1);
    }

    #[tokio::test]
    async fn test_start_failure_skips_race() {
        let (api, wsl) = setup();
        let mut cmd = wsl.distro("Nope").command("true");

        let err = run_until(&mut cmd, std::future::pending()).await.unwrap_err();
        assert!(matches!(err, WslError::NotRegistered { .. }));
        assert_eq!(api.call_count(NativeCall::WaitForProcess), 0);
    }

    #[tokio::test]
    async fn test_kill_failure_never_double_releases() {
        let (api, wsl) = setup();
        api.script("sleep 0.2", 0, Duration::from_millis(200));
        api.fail_next(NativeCall::TerminateProcess);
        let mut cmd = wsl.distro("Ubuntu").command("sleep 0.2");

        let err = run_until(&mut cmd, std::future::ready(())).await.unwrap_err();
        assert!(matches!(err, WslError::Native { call: NativeCall::TerminateProcess, .. }));
        assert_eq!(cmd.state(), CommandState::Closed);

        // The detached waiter finishes with the process and drops the last clone.
        let raw = api.handles()[0];
        let deadline = Instant::now() + Duration::from_secs(5);
        while api.close_count(raw) == 0 && Instant::now() < deadline {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(api.close_count(raw), 1);
    }

    #[tokio::test]
    async fn test_already_cancelled_token() {
        let (api, wsl) = setup();
        api.script("sleep 60", 0, Duration::from_secs(60));
        let token = CancellationToken::new();
        token.cancel();

        let mut cmd = wsl.distro("Ubuntu").command("sleep 60");
        let err = run_with_token(&mut cmd, &token).await.unwrap_err();
        assert!(err.is_cancelled());
        assert_eq!(api.close_count(api.handles()[0]), 1);
    }
}
