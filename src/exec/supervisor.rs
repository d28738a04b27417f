// src/exec/supervisor.rs

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::errors::{Result, RespawnerError};
use crate::exec::handle::{ExitReport, ProcessHandle};
use crate::exec::launcher::ProcessLauncher;
use crate::fs::FileSystem;
use crate::timeouts::bounded;
use crate::types::StepKind;

/// Extra time on top of the launcher's grace period for the force kill to
/// land before termination is reported as stuck.
const FORCE_KILL_MARGIN: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RespawnOutcome {
    Respawned { old_pid: u32, new_pid: u32 },
    /// There was no container to replace; nothing was started.
    NoContainer,
}

/// Owns the (single) container process handle.
pub struct ProcessSupervisor<L: ProcessLauncher> {
    launcher: L,
    fs: Arc<dyn FileSystem>,
    stop_timeout: Duration,
    current: Option<ProcessHandle>,
}

impl<L: ProcessLauncher> ProcessSupervisor<L> {
    /// `stop_timeout` should match the grace period the launcher applies
    /// before force-killing.
    pub fn new(launcher: L, fs: Arc<dyn FileSystem>, stop_timeout: Duration) -> Self {
        Self {
            launcher,
            fs,
            stop_timeout,
            current: None,
        }
    }

    pub fn current(&self) -> Option<&ProcessHandle> {
        self.current.as_ref()
    }

    pub fn current_pid(&self) -> Option<u32> {
        self.current.as_ref().map(ProcessHandle::pid)
    }

    /// Start the container at `path`.
    ///
    /// Refuses to start a second container while one is still running; use
    /// [`respawn`](Self::respawn) to replace it.
    pub fn spawn(&mut self, path: &Path) -> Result<u32> {
        info!(path = ?path, "spawning new container");

        if let Some(existing) = &self.current {
            if !existing.has_exited() {
                return Err(RespawnerError::Process(format!(
                    "container pid {} is still running",
                    existing.pid()
                )));
            }
            debug!(pid = existing.pid(), "discarding handle of exited container");
            self.current = None;
        }

        if !self.fs.exists(path) {
            return Err(RespawnerError::ExecutableNotFound(path.to_path_buf()));
        }
        if !self.fs.is_executable(path) {
            return Err(RespawnerError::Process(format!("{:?} is not executable", path)));
        }

        let handle = self.launcher.launch(path)?;
        let pid = handle.pid();
        info!(pid, "container started");

        self.current = Some(handle);
        Ok(pid)
    }

    /// Replace the running container with a fresh process from `path`.
    ///
    /// Only an existing container is ever replaced: without a current handle
    /// this logs a warning and returns [`RespawnOutcome::NoContainer`]. The
    /// old process is confirmed gone before the new one is started.
    pub async fn respawn(&mut self, path: &Path) -> Result<RespawnOutcome> {
        let Some(old_pid) = self.current_pid() else {
            warn!(path = ?path, "respawn requested but no container is running; ignoring");
            return Ok(RespawnOutcome::NoContainer);
        };

        info!(old_pid, "respawning container");
        self.terminate_current().await?;

        let new_pid = self.spawn(path)?;
        info!(old_pid, new_pid, "respawn complete");

        Ok(RespawnOutcome::Respawned { old_pid, new_pid })
    }

    /// Terminate the container (if any) and release its handle.
    pub async fn shutdown(&mut self) -> Result<Option<ExitReport>> {
        if self.current.is_none() {
            debug!("no container to stop");
            return Ok(None);
        }
        self.terminate_current().await
    }

    /// Gracefully terminate the current container and wait for it to exit.
    ///
    /// On failure the handle is kept so a later call can retry.
    async fn terminate_current(&mut self) -> Result<Option<ExitReport>> {
        let budget = self.stop_timeout + FORCE_KILL_MARGIN;
        let Some(handle) = self.current.as_mut() else {
            return Ok(None);
        };
        let pid = handle.pid();

        handle.kill()?;
        let report = bounded(StepKind::Stop, budget, handle.wait_exit()).await?;
        info!(pid, status = %report, "previous container stopped");

        self.current = None;
        Ok(Some(report))
    }
}
