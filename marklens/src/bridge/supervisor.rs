//! Language-server process supervision.
//!
//! Owns the child process exclusively. The I/O loop takes the stdio pipes
//! once at startup; everything else (liveness checks, termination) goes
//! through this handle, re-checking liveness rather than assuming it.

use std::process::Stdio;
use std::time::Duration;

use tokio::process::{Child, ChildStdin, ChildStdout, Command};

use super::error::BridgeError;
use crate::config::BridgeConfig;

#[derive(Debug)]
pub struct ServerProcess {
    child: Child,
}

impl ServerProcess {
    /// Spawn the server and confirm it survives a short grace period.
    ///
    /// A process that exits within the grace window (missing workspace, bad
    /// subcommand, broken install) is reported as a spawn failure rather than
    /// left to die during the handshake.
    pub async fn spawn(config: &BridgeConfig) -> Result<Self, BridgeError> {
        tracing::info!(
            server = %config.server_path,
            args = ?config.args,
            cwd = %config.workspace_root.display(),
            "Spawning language server"
        );

        let mut child = Command::new(&config.server_path)
            .args(&config.args)
            .current_dir(&config.workspace_root)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                BridgeError::Spawn(format!("failed to launch {:?}: {e}", config.server_path))
            })?;

        tokio::time::sleep(config.spawn_grace).await;

        match child.try_wait() {
            Ok(None) => {
                tracing::debug!(pid = ?child.id(), "Language server alive past grace period");
                Ok(Self { child })
            }
            Ok(Some(status)) => Err(BridgeError::Spawn(format!(
                "server exited immediately with {status}"
            ))),
            Err(e) => Err(BridgeError::Spawn(format!("failed to poll server: {e}"))),
        }
    }

    pub fn id(&self) -> Option<u32> {
        self.child.id()
    }

    /// Take the write end of the server's stdin. Yields once.
    pub fn take_stdin(&mut self) -> Option<ChildStdin> {
        self.child.stdin.take()
    }

    /// Take the read end of the server's stdout. Yields once.
    pub fn take_stdout(&mut self) -> Option<ChildStdout> {
        self.child.stdout.take()
    }

    pub fn is_alive(&mut self) -> bool {
        matches!(self.child.try_wait(), Ok(None))
    }

    /// Exit status if the process has already terminated.
    pub fn poll_exit(&mut self) -> Option<std::process::ExitStatus> {
        self.child.try_wait().ok().flatten()
    }

    /// Wait up to `grace` for a voluntary exit. Returns true if the process
    /// exited within the window.
    pub async fn wait_exit(&mut self, grace: Duration) -> bool {
        tokio::time::timeout(grace, self.child.wait()).await.is_ok()
    }

    /// Graceful stop: SIGTERM, wait up to `grace`, then force-kill.
    /// Returns true if the force-kill path was taken.
    pub async fn terminate(&mut self, grace: Duration) -> bool {
        if !self.is_alive() {
            return false;
        }

        #[cfg(unix)]
        if let Some(pid) = self.child.id() {
            use nix::sys::signal::{Signal, kill};
            use nix::unistd::Pid;
            if let Err(e) = kill(Pid::from_raw(pid as i32), Signal::SIGTERM) {
                tracing::warn!(pid, error = %e, "Failed to send SIGTERM");
            }
        }
        #[cfg(not(unix))]
        {
            let _ = self.child.start_kill();
        }

        match tokio::time::timeout(grace, self.child.wait()).await {
            Ok(status) => {
                tracing::debug!(?status, "Language server exited after stop signal");
                false
            }
            Err(_) => {
                tracing::warn!("Language server ignored stop signal, force-killing");
                if let Err(e) = self.child.kill().await {
                    tracing::error!(error = %e, "Failed to kill language server");
                }
                true
            }
        }
    }
}
