#![allow(dead_code)]

//! Scripted stand-ins for the git, compiler and process collaborators.
//!
//! Every fake records what it was asked to do in a shared [`CallLog`], so a
//! test can assert on the exact order of clone/pull/compile/launch/terminate
//! calls after the fakes have been moved into the scheduler.

use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::bail;
use tokio::sync::oneshot;

use respawner::build::Compiler;
use respawner::errors::{Result, RespawnerError};
use respawner::exec::{ExitReport, ProcessHandle, ProcessLauncher};
use respawner::fs::mock::MockFileSystem;
use respawner::repo::{DiffStat, PullSummary, VcsClient};
use respawner::types::BoxFuture;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Clone { remote_url: String, path: PathBuf },
    Pull { path: PathBuf },
    Compile { entry: PathBuf, output: PathBuf },
    Launch { pid: u32, path: PathBuf },
    Terminate { pid: u32 },
    Exit { pid: u32 },
}

/// Ordered record of collaborator calls, shared between fakes.
#[derive(Debug, Clone, Default)]
pub struct CallLog(Arc<Mutex<Vec<Call>>>);

impl CallLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, call: Call) {
        self.0.lock().unwrap().push(call);
    }

    pub fn snapshot(&self) -> Vec<Call> {
        self.0.lock().unwrap().clone()
    }

    pub fn clear(&self) {
        self.0.lock().unwrap().clear();
    }

    pub fn count(&self, pred: impl Fn(&Call) -> bool) -> usize {
        self.0.lock().unwrap().iter().filter(|c| pred(c)).count()
    }

    pub fn clones(&self) -> usize {
        self.count(|c| matches!(c, Call::Clone { .. }))
    }

    pub fn pulls(&self) -> usize {
        self.count(|c| matches!(c, Call::Pull { .. }))
    }

    pub fn compiles(&self) -> usize {
        self.count(|c| matches!(c, Call::Compile { .. }))
    }

    pub fn launches(&self) -> usize {
        self.count(|c| matches!(c, Call::Launch { .. }))
    }

    pub fn terminations(&self) -> usize {
        self.count(|c| matches!(c, Call::Terminate { .. }))
    }
}

/// FIFO of scripted results that can still be extended after the owning
/// fake has been moved away.
#[derive(Debug)]
pub struct Script<T>(Arc<Mutex<VecDeque<T>>>);

impl<T> Clone for Script<T> {
    fn clone(&self) -> Self {
        Script(Arc::clone(&self.0))
    }
}

impl<T> Default for Script<T> {
    fn default() -> Self {
        Script(Arc::new(Mutex::new(VecDeque::new())))
    }
}

impl<T> Script<T> {
    pub fn push(&self, step: T) {
        self.0.lock().unwrap().push_back(step);
    }

    pub fn extend(&self, steps: impl IntoIterator<Item = T>) {
        self.0.lock().unwrap().extend(steps);
    }

    pub fn next(&self) -> Option<T> {
        self.0.lock().unwrap().pop_front()
    }

    pub fn remaining(&self) -> usize {
        self.0.lock().unwrap().len()
    }
}

// ---------------------------------------------------------------------
// git
// ---------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PullStep {
    Unchanged,
    /// Move `HEAD` to a new revision touching `files` files.
    Changed { files: u64 },
    Fail(String),
    /// Never completes; used to exercise the repository timeout.
    Hang,
}

/// Counts concurrent pulls so tests can assert ticks never overlap.
#[derive(Debug, Clone, Default)]
pub struct InFlight {
    current: Arc<AtomicUsize>,
    max: Arc<AtomicUsize>,
}

impl InFlight {
    fn enter(&self) {
        let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.max.fetch_max(now, Ordering::SeqCst);
    }

    fn exit(&self) {
        self.current.fetch_sub(1, Ordering::SeqCst);
    }

    pub fn max(&self) -> usize {
        self.max.load(Ordering::SeqCst)
    }
}

/// `VcsClient` that materialises clones in a [`MockFileSystem`] and replays
/// a [`Script`] of pull results. An empty script means "unchanged".
pub struct FakeVcs {
    fs: MockFileSystem,
    log: CallLog,
    pulls: Script<PullStep>,
    clone_failures: Arc<AtomicUsize>,
    stalled_clones: Arc<AtomicUsize>,
    in_flight: InFlight,
    pull_delay: Duration,
    revision: u64,
}

impl FakeVcs {
    pub fn new(fs: MockFileSystem, log: CallLog) -> Self {
        Self {
            fs,
            log,
            pulls: Script::default(),
            clone_failures: Arc::new(AtomicUsize::new(0)),
            stalled_clones: Arc::new(AtomicUsize::new(0)),
            in_flight: InFlight::default(),
            pull_delay: Duration::ZERO,
            revision: 1,
        }
    }

    pub fn with_script(mut self, pulls: Script<PullStep>) -> Self {
        self.pulls = pulls;
        self
    }

    /// The next `n` clone attempts fail.
    pub fn with_clone_failures(mut self, failures: Arc<AtomicUsize>) -> Self {
        self.clone_failures = failures;
        self
    }

    /// The next `n` clone attempts write a half-finished `.git` directory
    /// and then never return.
    pub fn with_stalled_clones(mut self, stalled: Arc<AtomicUsize>) -> Self {
        self.stalled_clones = stalled;
        self
    }

    pub fn with_in_flight(mut self, in_flight: InFlight) -> Self {
        self.in_flight = in_flight;
        self
    }

    /// Every pull takes `delay` (virtual time under paused tests).
    pub fn with_pull_delay(mut self, delay: Duration) -> Self {
        self.pull_delay = delay;
        self
    }

    fn rev(&self) -> String {
        format!("{:040x}", self.revision)
    }
}

impl VcsClient for FakeVcs {
    fn clone_repo<'a>(
        &'a mut self,
        remote_url: &'a str,
        path: &'a Path,
    ) -> BoxFuture<'a, anyhow::Result<()>> {
        Box::pin(async move {
            self.log.push(Call::Clone {
                remote_url: remote_url.to_string(),
                path: path.to_path_buf(),
            });

            let failing = self
                .clone_failures
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok();
            if failing {
                bail!("fatal: unable to access '{remote_url}': Could not resolve host");
            }

            let stalled = self
                .stalled_clones
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok();
            if stalled {
                self.fs.add_dir(path.join(".git"));
                std::future::pending::<()>().await;
            }

            self.fs.add_dir(path);
            Ok(())
        })
    }

    fn pull<'a>(
        &'a mut self,
        path: &'a Path,
        _remote: &'a str,
        _branch: &'a str,
    ) -> BoxFuture<'a, anyhow::Result<PullSummary>> {
        Box::pin(async move {
            self.log.push(Call::Pull {
                path: path.to_path_buf(),
            });

            self.in_flight.enter();
            if !self.pull_delay.is_zero() {
                tokio::time::sleep(self.pull_delay).await;
            }
            let step = self.pulls.next().unwrap_or(PullStep::Unchanged);
            self.in_flight.exit();

            match step {
                PullStep::Unchanged => Ok(PullSummary::unchanged(self.rev())),
                PullStep::Changed { files } => {
                    let before = self.rev();
                    self.revision += 1;
                    Ok(PullSummary {
                        before,
                        after: self.rev(),
                        stat: DiffStat {
                            files_changed: files,
                            insertions: files * 3,
                            deletions: files,
                        },
                    })
                }
                PullStep::Fail(msg) => bail!("{msg}"),
                PullStep::Hang => std::future::pending().await,
            }
        })
    }
}

// ---------------------------------------------------------------------
// compiler
// ---------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompileStep {
    /// Write a fresh executable to the output path.
    Succeed,
    Fail(String),
    /// Report success without producing the output.
    SucceedWithoutOutput,
    Hang,
}

/// `Compiler` that writes numbered fake executables into a
/// [`MockFileSystem`]. An empty script means "succeed".
pub struct FakeCompiler {
    fs: MockFileSystem,
    log: CallLog,
    script: Script<CompileStep>,
    builds: u64,
}

impl FakeCompiler {
    pub fn new(fs: MockFileSystem, log: CallLog) -> Self {
        Self {
            fs,
            log,
            script: Script::default(),
            builds: 0,
        }
    }

    pub fn with_script(mut self, script: Script<CompileStep>) -> Self {
        self.script = script;
        self
    }
}

impl Compiler for FakeCompiler {
    fn compile<'a>(
        &'a mut self,
        entry: &'a Path,
        output: &'a Path,
    ) -> BoxFuture<'a, anyhow::Result<()>> {
        Box::pin(async move {
            self.log.push(Call::Compile {
                entry: entry.to_path_buf(),
                output: output.to_path_buf(),
            });

            match self.script.next().unwrap_or(CompileStep::Succeed) {
                CompileStep::Succeed => {
                    self.builds += 1;
                    let contents = format!("#!fake executable build {}\n", self.builds);
                    self.fs.add_executable(output, contents.into_bytes());
                    Ok(())
                }
                CompileStep::Fail(msg) => bail!("{msg}"),
                CompileStep::SucceedWithoutOutput => Ok(()),
                CompileStep::Hang => std::future::pending().await,
            }
        })
    }
}

// ---------------------------------------------------------------------
// processes
// ---------------------------------------------------------------------

/// Lets a test end a fake container on its own, as if it crashed.
#[derive(Debug, Clone, Default)]
pub struct Crasher(Arc<Mutex<HashMap<u32, oneshot::Sender<i32>>>>);

impl Crasher {
    /// Make `pid` exit with `code`. Returns false if `pid` is not running.
    pub fn crash(&self, pid: u32, code: i32) -> bool {
        match self.0.lock().unwrap().remove(&pid) {
            Some(tx) => tx.send(code).is_ok(),
            None => false,
        }
    }

    fn register(&self, pid: u32) -> oneshot::Receiver<i32> {
        let (tx, rx) = oneshot::channel();
        self.0.lock().unwrap().insert(pid, tx);
        rx
    }

    fn forget(&self, pid: u32) {
        self.0.lock().unwrap().remove(&pid);
    }
}

/// `ProcessLauncher` handing out handles backed by a small monitor task
/// instead of an OS process.
///
/// Pids start at 100 and increase with every launch. A terminate request is
/// honoured immediately unless the launcher was made stubborn.
pub struct FakeLauncher {
    log: CallLog,
    next_pid: u32,
    crasher: Crasher,
    stubborn: bool,
    fail_launch: Arc<AtomicBool>,
}

impl FakeLauncher {
    pub fn new(log: CallLog) -> Self {
        Self {
            log,
            next_pid: 100,
            crasher: Crasher::default(),
            stubborn: false,
            fail_launch: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn with_crasher(mut self, crasher: Crasher) -> Self {
        self.crasher = crasher;
        self
    }

    /// Ignore terminate requests, so the stop timeout has to fire.
    pub fn stubborn(mut self) -> Self {
        self.stubborn = true;
        self
    }

    /// While the flag is set every launch fails.
    pub fn with_launch_failure(mut self, flag: Arc<AtomicBool>) -> Self {
        self.fail_launch = flag;
        self
    }
}

impl ProcessLauncher for FakeLauncher {
    fn launch(&mut self, path: &Path) -> Result<ProcessHandle> {
        if self.fail_launch.load(Ordering::SeqCst) {
            return Err(RespawnerError::Process(format!(
                "spawning {:?}: permission denied",
                path
            )));
        }

        let pid = self.next_pid;
        self.next_pid += 1;
        self.log.push(Call::Launch {
            pid,
            path: path.to_path_buf(),
        });

        let (handle, mut control) = ProcessHandle::new(pid);
        let crash_rx = self.crasher.register(pid);
        let log = self.log.clone();
        let crasher = self.crasher.clone();
        let stubborn = self.stubborn;

        tokio::spawn(async move {
            let report = tokio::select! {
                request = &mut control.terminate_rx => {
                    if request.is_ok() {
                        log.push(Call::Terminate { pid });
                    }
                    if stubborn {
                        std::future::pending::<()>().await;
                    }
                    ExitReport::Exited { code: None }
                }
                code = crash_rx => ExitReport::Exited { code: code.ok() },
            };
            crasher.forget(pid);
            log.push(Call::Exit { pid });
            control.report_exit(report);
        });

        Ok(handle)
    }
}
