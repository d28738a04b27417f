#![allow(dead_code)]

//! An `UpdateScheduler` wired to the fakes, plus the knobs to steer them.

use std::sync::atomic::{AtomicBool, AtomicUsize};
use std::sync::Arc;

use tokio::sync::mpsc;

use respawner::build::Builder;
use respawner::config::ConfigFile;
use respawner::engine::{RuntimeEvent, SchedulerOptions, UpdateScheduler};
use respawner::exec::ProcessSupervisor;
use respawner::fs::mock::MockFileSystem;
use respawner::fs::FileSystem;
use respawner::repo::RepositoryGateway;
use respawner::types::Platform;

use crate::fakes::{
    CallLog, CompileStep, Crasher, FakeCompiler, FakeLauncher, FakeVcs, InFlight, PullStep,
    Script,
};

pub type FakeScheduler = UpdateScheduler<FakeVcs, FakeCompiler, FakeLauncher>;

/// Shared state of all fakes behind one scheduler.
#[derive(Clone)]
pub struct Harness {
    pub fs: MockFileSystem,
    pub log: CallLog,
    pub pulls: Script<PullStep>,
    pub compiles: Script<CompileStep>,
    pub clone_failures: Arc<AtomicUsize>,
    pub stalled_clones: Arc<AtomicUsize>,
    pub launch_failure: Arc<AtomicBool>,
    pub crasher: Crasher,
    pub in_flight: InFlight,
    pub host: Platform,
    pub stubborn: bool,
    pub pull_delay: std::time::Duration,
}

impl Harness {
    pub fn new() -> Self {
        Self {
            fs: MockFileSystem::new(),
            log: CallLog::new(),
            pulls: Script::default(),
            compiles: Script::default(),
            clone_failures: Arc::new(AtomicUsize::new(0)),
            stalled_clones: Arc::new(AtomicUsize::new(0)),
            launch_failure: Arc::new(AtomicBool::new(false)),
            crasher: Crasher::default(),
            in_flight: InFlight::default(),
            host: Platform::host(),
            stubborn: false,
            pull_delay: std::time::Duration::ZERO,
        }
    }

    /// Pretend the clone and the built executable from `cfg` already exist.
    pub fn with_existing_checkout(self, cfg: &ConfigFile) -> Self {
        self.fs.add_dir(&cfg.repository.local_path);
        self.fs
            .add_executable(&cfg.build.output, b"#!fake executable from an earlier run\n".to_vec());
        self
    }

    pub fn scheduler(
        &self,
        cfg: &ConfigFile,
        events: mpsc::Sender<RuntimeEvent>,
    ) -> FakeScheduler {
        self.scheduler_with_options(cfg, SchedulerOptions::from_config(cfg), events)
    }

    pub fn scheduler_with_options(
        &self,
        cfg: &ConfigFile,
        options: SchedulerOptions,
        events: mpsc::Sender<RuntimeEvent>,
    ) -> FakeScheduler {
        let fs: Arc<dyn FileSystem> = Arc::new(self.fs.clone());
        let sup = &cfg.supervisor;

        let vcs = FakeVcs::new(self.fs.clone(), self.log.clone())
            .with_script(self.pulls.clone())
            .with_clone_failures(Arc::clone(&self.clone_failures))
            .with_stalled_clones(Arc::clone(&self.stalled_clones))
            .with_in_flight(self.in_flight.clone())
            .with_pull_delay(self.pull_delay);
        let gateway = RepositoryGateway::new(
            cfg.repository_descriptor(),
            vcs,
            Arc::clone(&fs),
            sup.repository_timeout(),
        );

        let compiler =
            FakeCompiler::new(self.fs.clone(), self.log.clone()).with_script(self.compiles.clone());
        let builder = Builder::with_host(
            compiler,
            Arc::clone(&fs),
            sup.build_timeout(),
            self.host.clone(),
        );

        let mut launcher = FakeLauncher::new(self.log.clone())
            .with_crasher(self.crasher.clone())
            .with_launch_failure(Arc::clone(&self.launch_failure));
        if self.stubborn {
            launcher = launcher.stubborn();
        }
        let supervisor = ProcessSupervisor::new(launcher, fs, sup.stop_timeout());

        UpdateScheduler::new(
            gateway,
            builder,
            supervisor,
            cfg.build_descriptor(),
            options,
            events,
        )
    }
}

impl Default for Harness {
    fn default() -> Self {
        Self::new()
    }
}
