// src/engine/mod.rs

//! Update scheduling for respawner.
//!
//! This module ties together:
//! - the supervisor state (rebuild flag, phase, tick counter),
//! - the single-slot poll timer,
//! - the bootstrap retry policy,
//! - the `UpdateScheduler` control loop that reacts to:
//!   - poll timer fires
//!   - shutdown signals
//!
//! Collaborators (repository, builder, process supervisor) are owned by the
//! scheduler and only ever driven from its single control flow.

/// Events flowing into the scheduler loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuntimeEvent {
    /// The poll timer armed with `generation` elapsed.
    PollTimerFired { generation: u64 },
    /// Graceful shutdown requested (e.g. Ctrl-C, SIGTERM).
    ShutdownRequested,
}

/// What a single tick did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Pull succeeded without changes; nothing was built or respawned.
    Unchanged,
    /// Pull failed (or timed out).
    CheckFailed,
    /// Changes arrived but the build failed; the container was left alone.
    BuildFailed,
    Respawned { old_pid: u32, new_pid: u32 },
    /// Build succeeded but there was no container to replace.
    RespawnSkipped,
    RespawnFailed,
}

pub mod retry;
pub mod scheduler;
pub mod state;
pub mod timer;

pub use retry::RetryPolicy;
pub use scheduler::{SchedulerOptions, UpdateScheduler};
pub use state::{RebuildFlag, SchedulerPhase, SupervisorState};
pub use timer::PollTimer;
