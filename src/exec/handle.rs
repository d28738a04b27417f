// src/exec/handle.rs

use std::fmt;

use tokio::sync::{oneshot, watch};
use tracing::debug;

use crate::errors::{Result, RespawnerError};

/// How a container process ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExitReport {
    /// The process exited; `code` is `None` when it was ended by a signal.
    Exited { code: Option<i32> },
    /// Waiting on the process failed.
    Failed { error: String },
}

impl ExitReport {
    pub fn success(&self) -> bool {
        matches!(self, ExitReport::Exited { code: Some(0) })
    }
}

impl fmt::Display for ExitReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExitReport::Exited { code: Some(code) } => write!(f, "exited with code {code}"),
            ExitReport::Exited { code: None } => write!(f, "terminated by signal"),
            ExitReport::Failed { error } => write!(f, "failed: {error}"),
        }
    }
}

/// Supervisor-side handle to one running container process.
///
/// The process itself is owned by a monitor task (see
/// [`super::launcher::TokioLauncher`]); the handle can only request
/// termination and observe the exit. Dropping the handle asks the monitor to
/// terminate the process.
pub struct ProcessHandle {
    pid: u32,
    terminate_tx: Option<oneshot::Sender<()>>,
    exit_rx: watch::Receiver<Option<ExitReport>>,
}

/// Monitor-side counterpart of a [`ProcessHandle`].
pub struct ProcessControl {
    /// Resolves when termination is requested (`Ok`) or the handle was
    /// dropped (`Err`).
    pub terminate_rx: oneshot::Receiver<()>,
    exit_tx: watch::Sender<Option<ExitReport>>,
}

impl ProcessControl {
    /// Publish the final state of the process. Later calls are ignored.
    pub fn report_exit(&self, report: ExitReport) {
        self.exit_tx.send_if_modified(|slot| {
            if slot.is_none() {
                *slot = Some(report);
                true
            } else {
                false
            }
        });
    }
}

impl ProcessHandle {
    /// Create a handle for `pid` together with the monitor-side control.
    pub fn new(pid: u32) -> (Self, ProcessControl) {
        let (terminate_tx, terminate_rx) = oneshot::channel();
        let (exit_tx, exit_rx) = watch::channel(None);
        (
            Self {
                pid,
                terminate_tx: Some(terminate_tx),
                exit_rx,
            },
            ProcessControl {
                terminate_rx,
                exit_tx,
            },
        )
    }

    pub fn pid(&self) -> u32 {
        self.pid
    }

    pub fn exit_status(&self) -> Option<ExitReport> {
        self.exit_rx.borrow().clone()
    }

    pub fn has_exited(&self) -> bool {
        self.exit_rx.borrow().is_some()
    }

    /// Whether termination was already requested through this handle.
    pub fn kill_requested(&self) -> bool {
        self.terminate_tx.is_none()
    }

    /// Request graceful termination.
    ///
    /// Idempotent, and a no-op for a process that already exited.
    pub fn kill(&mut self) -> Result<()> {
        if self.has_exited() {
            debug!(pid = self.pid, "kill requested but process already exited");
            return Ok(());
        }

        let Some(tx) = self.terminate_tx.take() else {
            debug!(pid = self.pid, "termination already requested");
            return Ok(());
        };

        if tx.send(()).is_err() && !self.has_exited() {
            return Err(RespawnerError::Process(format!(
                "monitor for pid {} is gone but no exit was reported",
                self.pid
            )));
        }

        Ok(())
    }

    /// Wait until the process has exited.
    pub async fn wait_exit(&mut self) -> Result<ExitReport> {
        let pid = self.pid;
        let report = self
            .exit_rx
            .wait_for(|slot| slot.is_some())
            .await
            .map_err(|_| {
                RespawnerError::Process(format!(
                    "monitor for pid {pid} stopped without reporting an exit"
                ))
            })?
            .clone();

        report.ok_or_else(|| RespawnerError::Process(format!("no exit report for pid {pid}")))
    }
}

impl fmt::Debug for ProcessHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProcessHandle")
            .field("pid", &self.pid)
            .field("exit", &*self.exit_rx.borrow())
            .field("kill_requested", &self.kill_requested())
            .finish()
    }
}
