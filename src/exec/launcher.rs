// src/exec/launcher.rs

//! Pluggable process launcher.
//!
//! The supervisor talks to a `ProcessLauncher` instead of `tokio::process`
//! directly, so tests can hand out fake handles while production uses
//! [`TokioLauncher`].

use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::sync::Arc;
use std::time::Duration;

use tokio::process::{Child, Command};
use tracing::{error, info, warn};

use crate::errors::{Result, RespawnerError};
use crate::exec::handle::{ExitReport, ProcessControl, ProcessHandle};
use crate::exec::output::{forward_lines, LineSink, OutputStream};

pub trait ProcessLauncher: Send {
    /// Start the executable at `path` and return its handle.
    fn launch(&mut self, path: &Path) -> Result<ProcessHandle>;
}

/// Launches real OS processes with `tokio::process`.
///
/// Each launched process gets three background tasks: two line forwarders for
/// stdout/stderr and a monitor that owns the `Child`, reports its exit, and
/// carries out termination requests (graceful signal first, force kill after
/// `grace`).
pub struct TokioLauncher {
    sink: Arc<dyn LineSink>,
    grace: Duration,
}

impl TokioLauncher {
    pub fn new(sink: Arc<dyn LineSink>, grace: Duration) -> Self {
        Self { sink, grace }
    }
}

impl ProcessLauncher for TokioLauncher {
    fn launch(&mut self, path: &Path) -> Result<ProcessHandle> {
        let program = program_path(path);

        let mut child = Command::new(&program)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| RespawnerError::Process(format!("spawning {:?}: {e}", program)))?;

        let pid = child
            .id()
            .ok_or_else(|| RespawnerError::Process(format!("{:?} exited before reporting a pid", program)))?;

        if let Some(stdout) = child.stdout.take() {
            forward_lines(stdout, pid, OutputStream::Stdout, Arc::clone(&self.sink));
        }
        if let Some(stderr) = child.stderr.take() {
            forward_lines(stderr, pid, OutputStream::Stderr, Arc::clone(&self.sink));
        }

        let (handle, control) = ProcessHandle::new(pid);
        let grace = self.grace;
        tokio::spawn(monitor(child, pid, control, grace));

        Ok(handle)
    }
}

/// Relative paths are resolved against the working directory rather than
/// `PATH`.
fn program_path(path: &Path) -> PathBuf {
    if path.is_relative() {
        Path::new(".").join(path)
    } else {
        path.to_path_buf()
    }
}

async fn monitor(mut child: Child, pid: u32, mut control: ProcessControl, grace: Duration) {
    let report = tokio::select! {
        status = child.wait() => report_from(status),
        request = &mut control.terminate_rx => {
            if request.is_err() {
                warn!(pid, "container handle dropped; terminating process");
            } else {
                info!(pid, "termination requested");
            }
            terminate(&mut child, pid, grace).await
        }
    };

    match &report {
        ExitReport::Exited { .. } => info!(pid, status = %report, "child process exited"),
        ExitReport::Failed { error } => error!(pid, %error, "container process error"),
    }

    control.report_exit(report);
}

async fn terminate(child: &mut Child, pid: u32, grace: Duration) -> ExitReport {
    if let Err(e) = signal_terminate(child, pid) {
        warn!(pid, error = %e, "failed to send termination signal");
    }

    match tokio::time::timeout(grace, child.wait()).await {
        Ok(status) => report_from(status),
        Err(_) => {
            warn!(pid, ?grace, "container did not stop gracefully; killing");
            if let Err(e) = child.kill().await {
                return ExitReport::Failed {
                    error: format!("force kill failed: {e}"),
                };
            }
            report_from(child.wait().await)
        }
    }
}

#[cfg(unix)]
fn signal_terminate(_child: &mut Child, pid: u32) -> std::io::Result<()> {
    use nix::sys::signal::{kill, Signal};
    use nix::unistd::Pid;

    kill(Pid::from_raw(pid as i32), Signal::SIGTERM).map_err(std::io::Error::from)
}

#[cfg(not(unix))]
fn signal_terminate(child: &mut Child, _pid: u32) -> std::io::Result<()> {
    child.start_kill()
}

fn report_from(status: std::io::Result<ExitStatus>) -> ExitReport {
    match status {
        Ok(status) => ExitReport::Exited {
            code: status.code(),
        },
        Err(e) => ExitReport::Failed {
            error: e.to_string(),
        },
    }
}
