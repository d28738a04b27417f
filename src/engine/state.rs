// src/engine/state.rs

use std::fmt;

use tracing::{debug, warn};

use crate::engine::timer::PollTimer;

/// Whether the next build step must actually invoke the compiler.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RebuildFlag(bool);

impl RebuildFlag {
    pub fn new(pending: bool) -> Self {
        RebuildFlag(pending)
    }

    pub fn set(&mut self) {
        self.0 = true;
    }

    pub fn clear(&mut self) {
        self.0 = false;
    }

    pub fn is_pending(&self) -> bool {
        self.0
    }
}

/// Where the update scheduler is in its cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerPhase {
    /// Ensuring the clone, building and spawning the first container.
    Bootstrapping,
    /// Waiting for the poll timer.
    Idle,
    /// Pulling the remote.
    Checking,
    Rebuilding,
    Respawning,
    ShuttingDown,
    Stopped,
}

impl SchedulerPhase {
    /// Whether moving from `self` to `next` is part of the state machine.
    pub fn can_transition_to(self, next: SchedulerPhase) -> bool {
        use SchedulerPhase::*;

        if next == ShuttingDown {
            return !matches!(self, ShuttingDown | Stopped);
        }

        matches!(
            (self, next),
            (Bootstrapping, Bootstrapping)
                | (Bootstrapping, Idle)
                | (Idle, Checking)
                | (Checking, Idle)
                | (Checking, Rebuilding)
                | (Rebuilding, Idle)
                | (Rebuilding, Respawning)
                | (Respawning, Idle)
                | (ShuttingDown, Stopped)
        )
    }
}

impl fmt::Display for SchedulerPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SchedulerPhase::Bootstrapping => "bootstrapping",
            SchedulerPhase::Idle => "idle",
            SchedulerPhase::Checking => "checking",
            SchedulerPhase::Rebuilding => "rebuilding",
            SchedulerPhase::Respawning => "respawning",
            SchedulerPhase::ShuttingDown => "shutting-down",
            SchedulerPhase::Stopped => "stopped",
        };
        f.write_str(s)
    }
}

/// Mutable state of one supervisor instance.
///
/// Owned by the `UpdateScheduler` and only mutated from its control flow.
/// The container handle lives in the scheduler's `ProcessSupervisor`.
#[derive(Debug)]
pub struct SupervisorState {
    pub rebuild: RebuildFlag,
    pub timer: PollTimer,
    phase: SchedulerPhase,
    ticks: u64,
}

impl SupervisorState {
    pub fn new(rebuild: RebuildFlag, timer: PollTimer) -> Self {
        Self {
            rebuild,
            timer,
            phase: SchedulerPhase::Bootstrapping,
            ticks: 0,
        }
    }

    pub fn phase(&self) -> SchedulerPhase {
        self.phase
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Start a new tick and return its number.
    pub fn begin_tick(&mut self) -> u64 {
        self.ticks += 1;
        self.ticks
    }

    pub fn transition(&mut self, next: SchedulerPhase) {
        if !self.phase.can_transition_to(next) {
            warn!(from = %self.phase, to = %next, "unexpected scheduler transition");
        } else {
            debug!(from = %self.phase, to = %next, "scheduler transition");
        }
        self.phase = next;
    }
}
