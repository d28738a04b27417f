// src/engine/scheduler.rs

use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::build::{BuildDescriptor, BuildOutcome, Builder, Compiler};
use crate::config::ConfigFile;
use crate::engine::state::{RebuildFlag, SchedulerPhase, SupervisorState};
use crate::engine::timer::PollTimer;
use crate::engine::{RetryPolicy, RuntimeEvent, TickOutcome};
use crate::errors::{Result, RespawnerError};
use crate::exec::{ProcessLauncher, ProcessSupervisor, RespawnOutcome};
use crate::repo::{RepositoryGateway, VcsClient};

#[derive(Debug, Clone, Copy)]
pub struct SchedulerOptions {
    /// Period `T` between the end of one tick and the start of the next.
    pub poll_interval: Duration,
    pub retry: RetryPolicy,
    /// Stop after this many ticks (used for `--once`).
    pub max_ticks: Option<u64>,
    /// Initial value of the rebuild flag.
    pub rebuild_on_start: bool,
}

impl SchedulerOptions {
    /// Options derived from the validated configuration, with no tick limit.
    pub fn from_config(cfg: &ConfigFile) -> Self {
        Self {
            poll_interval: cfg.supervisor.poll_interval(),
            retry: cfg.retry_policy(),
            max_ticks: None,
            rebuild_on_start: cfg.supervisor.rebuild_on_start,
        }
    }
}

impl Default for SchedulerOptions {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(10_000),
            retry: RetryPolicy::default(),
            max_ticks: None,
            rebuild_on_start: false,
        }
    }
}

/// Drives the update-build-respawn loop.
///
/// Bootstraps once (clone → build → spawn), then waits for the poll timer.
/// Each fire runs one tick to completion before the timer is armed again, so
/// ticks never overlap.
pub struct UpdateScheduler<V: VcsClient, C: Compiler, L: ProcessLauncher> {
    gateway: RepositoryGateway<V>,
    builder: Builder<C>,
    supervisor: ProcessSupervisor<L>,
    build: BuildDescriptor,
    options: SchedulerOptions,
    state: SupervisorState,
}

impl<V: VcsClient, C: Compiler, L: ProcessLauncher> UpdateScheduler<V, C, L> {
    /// `events` is the sender side of the channel later passed to
    /// [`run`](Self::run); the poll timer delivers its fires through it.
    pub fn new(
        gateway: RepositoryGateway<V>,
        builder: Builder<C>,
        supervisor: ProcessSupervisor<L>,
        build: BuildDescriptor,
        options: SchedulerOptions,
        events: mpsc::Sender<RuntimeEvent>,
    ) -> Self {
        let timer = PollTimer::new(options.poll_interval, events);
        let state = SupervisorState::new(RebuildFlag::new(options.rebuild_on_start), timer);
        Self {
            gateway,
            builder,
            supervisor,
            build,
            options,
            state,
        }
    }

    pub fn state(&self) -> &SupervisorState {
        &self.state
    }

    pub fn phase(&self) -> SchedulerPhase {
        self.state.phase()
    }

    pub fn rebuild_pending(&self) -> bool {
        self.state.rebuild.is_pending()
    }

    pub fn timer_armed(&self) -> bool {
        self.state.timer.is_armed()
    }

    pub fn container_pid(&self) -> Option<u32> {
        self.supervisor.current_pid()
    }

    /// One bootstrap attempt: ensure the clone, build if needed, spawn.
    ///
    /// Returns the container pid. Does not arm the timer.
    pub async fn bootstrap(&mut self) -> Result<u32> {
        self.state.transition(SchedulerPhase::Bootstrapping);

        let ensured = self.gateway.ensure_cloned(&mut self.state.rebuild).await?;
        debug!(cloned = ensured.cloned, "repository ready");

        if !self.state.rebuild.is_pending() && !self.builder.artifact_exists(&self.build) {
            info!(output = ?self.build.output, "container executable missing; scheduling build");
            self.state.rebuild.set();
        }

        match self
            .builder
            .build_if_needed(&self.build, &mut self.state.rebuild)
            .await?
        {
            BuildOutcome::Built(artifact) => {
                debug!(digest = %artifact.digest, "bootstrap build finished")
            }
            BuildOutcome::Skipped => debug!("bootstrap using existing executable"),
        }

        let pid = self.supervisor.spawn(&self.build.output)?;
        info!(pid, "container PID");
        Ok(pid)
    }

    /// Run [`bootstrap`](Self::bootstrap) until it succeeds or the retry
    /// policy gives up, then enter `Idle` with the timer armed.
    pub async fn bootstrap_with_retry(&mut self) -> Result<u32> {
        let policy = self.options.retry;
        let mut attempt = 0;

        loop {
            attempt += 1;
            match self.bootstrap().await {
                Ok(pid) => {
                    self.enter_idle();
                    info!(
                        interval_secs = self.options.poll_interval.as_secs_f64(),
                        "checking for updates on a fixed interval"
                    );
                    return Ok(pid);
                }
                Err(e) if attempt >= policy.max_attempts => {
                    error!(attempt, error = %e, "bootstrap failed; giving up");
                    return Err(RespawnerError::BootstrapExhausted {
                        attempts: attempt,
                        last: e.to_string(),
                    });
                }
                Err(e) => {
                    let delay = policy.backoff(attempt);
                    warn!(
                        attempt,
                        max_attempts = policy.max_attempts,
                        ?delay,
                        error = %e,
                        "bootstrap failed; retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }

    /// Run one full tick and re-arm the timer afterwards.
    pub async fn tick(&mut self) -> TickOutcome {
        let outcome = self.run_tick().await;
        self.enter_idle();
        outcome
    }

    /// check → (rebuild → respawn)? with the timer disarmed throughout.
    ///
    /// Every failure is logged and reported through the returned outcome;
    /// the caller is responsible for re-arming (see [`tick`](Self::tick)).
    pub async fn run_tick(&mut self) -> TickOutcome {
        self.state.timer.disarm();
        let tick = self.state.begin_tick();
        self.state.transition(SchedulerPhase::Checking);
        info!(tick, "check updates");

        let summary = match self.gateway.check_for_updates().await {
            Ok(summary) => summary,
            Err(e) => {
                error!(tick, error = %e, "update check failed");
                return TickOutcome::CheckFailed;
            }
        };

        if !summary.changed() {
            if self.state.rebuild.is_pending() {
                warn!(
                    tick,
                    "a previous rebuild is still pending; waiting for the next upstream change"
                );
            }
            info!(tick, "no updates");
            return TickOutcome::Unchanged;
        }

        self.state.rebuild.set();
        self.state.transition(SchedulerPhase::Rebuilding);

        match self
            .builder
            .build_if_needed(&self.build, &mut self.state.rebuild)
            .await
        {
            Ok(BuildOutcome::Built(artifact)) => {
                debug!(tick, digest = %artifact.digest, "rebuild finished")
            }
            Ok(BuildOutcome::Skipped) => debug!(tick, "rebuild skipped"),
            Err(e) => {
                error!(tick, error = %e, "rebuild on update failed");
                return TickOutcome::BuildFailed;
            }
        }

        self.state.transition(SchedulerPhase::Respawning);

        match self.supervisor.respawn(&self.build.output).await {
            Ok(RespawnOutcome::Respawned { old_pid, new_pid }) => {
                TickOutcome::Respawned { old_pid, new_pid }
            }
            Ok(RespawnOutcome::NoContainer) => TickOutcome::RespawnSkipped,
            Err(e) => {
                error!(tick, error = %e, "respawn error");
                TickOutcome::RespawnFailed
            }
        }
    }

    fn enter_idle(&mut self) {
        self.state.transition(SchedulerPhase::Idle);
        self.state.timer.arm();
    }

    /// Disarm the timer and stop the container.
    pub async fn shutdown(&mut self) -> Result<()> {
        if matches!(
            self.phase(),
            SchedulerPhase::ShuttingDown | SchedulerPhase::Stopped
        ) {
            return Ok(());
        }

        info!("shutting down");
        self.state.transition(SchedulerPhase::ShuttingDown);
        self.state.timer.disarm();

        let result = self.supervisor.shutdown().await;
        self.state.transition(SchedulerPhase::Stopped);

        match result {
            Ok(Some(report)) => {
                info!(status = %report, "container stopped");
                Ok(())
            }
            Ok(None) => Ok(()),
            Err(e) => {
                error!(error = %e, "failed to stop container");
                Err(e)
            }
        }
    }

    /// Main loop: bootstrap, then handle timer fires until shutdown.
    ///
    /// A shutdown request abandons an in-flight bootstrap or tick; external
    /// commands started by that step are killed when their futures drop.
    pub async fn run(mut self, mut events: mpsc::Receiver<RuntimeEvent>) -> Result<()> {
        info!("respawner scheduler started");

        let bootstrapped = {
            let bootstrap = self.bootstrap_with_retry();
            tokio::pin!(bootstrap);
            loop {
                tokio::select! {
                    res = &mut bootstrap => break Some(res),
                    event = events.recv() => match event {
                        Some(RuntimeEvent::PollTimerFired { generation }) => {
                            debug!(generation, "timer fire during bootstrap ignored");
                        }
                        Some(RuntimeEvent::ShutdownRequested) | None => break None,
                    }
                }
            }
        };

        match bootstrapped {
            Some(Ok(_pid)) => {}
            Some(Err(e)) => {
                let _ = self.shutdown().await;
                return Err(e);
            }
            None => {
                info!("shutdown requested during bootstrap");
                return self.shutdown().await;
            }
        }

        loop {
            let event = match events.recv().await {
                Some(e) => e,
                None => {
                    info!("runtime event channel closed; exiting");
                    break;
                }
            };

            let generation = match event {
                RuntimeEvent::PollTimerFired { generation } => generation,
                RuntimeEvent::ShutdownRequested => {
                    info!("shutdown requested");
                    break;
                }
            };

            if !self.state.timer.accept(generation) {
                continue;
            }

            let outcome = {
                let tick = self.run_tick();
                tokio::pin!(tick);
                loop {
                    tokio::select! {
                        outcome = &mut tick => break Some(outcome),
                        event = events.recv() => match event {
                            Some(RuntimeEvent::PollTimerFired { generation }) => {
                                debug!(generation, "timer fire during tick ignored");
                            }
                            Some(RuntimeEvent::ShutdownRequested) | None => break None,
                        }
                    }
                }
            };

            let Some(outcome) = outcome else {
                info!("shutdown requested during tick; abandoning it");
                break;
            };

            info!(?outcome, "check updates done");
            self.enter_idle();

            if let Some(max) = self.options.max_ticks {
                if self.state.ticks() >= max {
                    info!(ticks = max, "tick limit reached");
                    break;
                }
            }
        }

        self.shutdown().await
    }
}
