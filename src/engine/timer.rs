// src/engine/timer.rs

use std::fmt;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::engine::RuntimeEvent;

/// Single-slot, one-shot poll timer.
///
/// At most one fire is pending at any time. `arm` replaces a pending fire,
/// `disarm` cancels it, and every fire carries the generation it was armed
/// with so a fire that raced a `disarm` is recognised as stale by
/// [`accept`](Self::accept).
pub struct PollTimer {
    period: Duration,
    events: mpsc::Sender<RuntimeEvent>,
    generation: u64,
    pending: Option<JoinHandle<()>>,
}

impl PollTimer {
    pub fn new(period: Duration, events: mpsc::Sender<RuntimeEvent>) -> Self {
        Self {
            period,
            events,
            generation: 0,
            pending: None,
        }
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    pub fn is_armed(&self) -> bool {
        self.pending.is_some()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Schedule one fire `period` from now, replacing any pending fire.
    pub fn arm(&mut self) {
        self.disarm();
        self.generation += 1;

        let generation = self.generation;
        let period = self.period;
        let tx = self.events.clone();
        debug!(generation, ?period, "poll timer armed");

        self.pending = Some(tokio::spawn(async move {
            tokio::time::sleep(period).await;
            let _ = tx.send(RuntimeEvent::PollTimerFired { generation }).await;
        }));
    }

    /// Cancel the pending fire, if any.
    pub fn disarm(&mut self) {
        if let Some(handle) = self.pending.take() {
            handle.abort();
            debug!(generation = self.generation, "poll timer disarmed");
        }
    }

    /// Consume a fire. Returns `false` for a fire that no longer matches the
    /// armed generation (already disarmed or re-armed).
    pub fn accept(&mut self, generation: u64) -> bool {
        if self.pending.is_none() || generation != self.generation {
            debug!(
                generation,
                current = self.generation,
                "ignoring stale poll timer fire"
            );
            return false;
        }
        self.pending = None;
        true
    }
}

impl Drop for PollTimer {
    fn drop(&mut self) {
        self.disarm();
    }
}

impl fmt::Debug for PollTimer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PollTimer")
            .field("period", &self.period)
            .field("generation", &self.generation)
            .field("armed", &self.is_armed())
            .finish()
    }
}
