// tests/timer_and_state.rs

use std::time::Duration;

use tokio::sync::mpsc;

use respawner::engine::{
    PollTimer, RebuildFlag, RetryPolicy, RuntimeEvent, SchedulerPhase, SupervisorState,
};

#[tokio::test(start_paused = true)]
async fn armed_timer_fires_once_after_period() {
    let (tx, mut rx) = mpsc::channel(4);
    let mut timer = PollTimer::new(Duration::from_secs(10), tx);

    let started = tokio::time::Instant::now();
    timer.arm();
    assert!(timer.is_armed());

    let event = rx.recv().await.unwrap();
    assert_eq!(event, RuntimeEvent::PollTimerFired { generation: 1 });
    assert!(started.elapsed() >= Duration::from_secs(10));

    assert!(timer.accept(1));
    assert!(!timer.is_armed());
    assert!(!timer.accept(1), "a fire is consumed only once");
    assert!(rx.try_recv().is_err(), "one-shot");
}

#[tokio::test(start_paused = true)]
async fn rearming_replaces_pending_fire() {
    let (tx, mut rx) = mpsc::channel(4);
    let mut timer = PollTimer::new(Duration::from_millis(100), tx);

    timer.arm();
    tokio::time::sleep(Duration::from_millis(60)).await;
    timer.arm();

    let event = rx.recv().await.unwrap();
    assert_eq!(event, RuntimeEvent::PollTimerFired { generation: 2 });

    tokio::time::sleep(Duration::from_millis(500)).await;
    assert!(rx.try_recv().is_err(), "first arming was cancelled");
}

#[tokio::test(start_paused = true)]
async fn disarm_cancels_and_rejects_late_fires() {
    let (tx, mut rx) = mpsc::channel(4);
    let mut timer = PollTimer::new(Duration::from_millis(100), tx);

    timer.arm();
    let generation = timer.generation();
    timer.disarm();
    assert!(!timer.is_armed());

    tokio::time::sleep(Duration::from_millis(500)).await;
    assert!(rx.try_recv().is_err());
    assert!(!timer.accept(generation), "fire that raced a disarm is stale");
}

#[tokio::test(start_paused = true)]
async fn dropping_timer_cancels_fire() {
    let (tx, mut rx) = mpsc::channel(4);
    let mut timer = PollTimer::new(Duration::from_millis(100), tx);
    timer.arm();
    drop(timer);

    // Channel closes once the aborted task releases its sender.
    assert_eq!(rx.recv().await, None);
}

#[test]
fn phase_transitions_follow_the_cycle() {
    use SchedulerPhase::*;

    let allowed = [
        (Bootstrapping, Idle),
        (Bootstrapping, Bootstrapping),
        (Idle, Checking),
        (Checking, Idle),
        (Checking, Rebuilding),
        (Rebuilding, Idle),
        (Rebuilding, Respawning),
        (Respawning, Idle),
        (Idle, ShuttingDown),
        (Respawning, ShuttingDown),
        (ShuttingDown, Stopped),
    ];
    for (from, to) in allowed {
        assert!(from.can_transition_to(to), "{from} -> {to} should be allowed");
    }

    let forbidden = [
        (Idle, Rebuilding),
        (Idle, Respawning),
        (Checking, Respawning),
        (Respawning, Checking),
        (Stopped, Idle),
        (ShuttingDown, ShuttingDown),
        (Stopped, ShuttingDown),
    ];
    for (from, to) in forbidden {
        assert!(!from.can_transition_to(to), "{from} -> {to} should be rejected");
    }
}

#[tokio::test]
async fn state_counts_ticks() {
    let (tx, _rx) = mpsc::channel(1);
    let timer = PollTimer::new(Duration::from_secs(1), tx);
    let mut state = SupervisorState::new(RebuildFlag::new(true), timer);

    assert_eq!(state.phase(), SchedulerPhase::Bootstrapping);
    assert!(state.rebuild.is_pending());
    assert_eq!(state.begin_tick(), 1);
    assert_eq!(state.begin_tick(), 2);
    assert_eq!(state.ticks(), 2);

    state.transition(SchedulerPhase::Idle);
    assert_eq!(state.phase(), SchedulerPhase::Idle);
}

#[test]
fn backoff_doubles_up_to_the_cap() {
    let policy = RetryPolicy {
        max_attempts: 10,
        initial_backoff: Duration::from_millis(250),
        max_backoff: Duration::from_secs(2),
    };

    let delays: Vec<_> = (1..=6).map(|n| policy.backoff(n)).collect();
    assert_eq!(
        delays,
        vec![
            Duration::from_millis(250),
            Duration::from_millis(500),
            Duration::from_secs(1),
            Duration::from_secs(2),
            Duration::from_secs(2),
            Duration::from_secs(2),
        ]
    );
    assert_eq!(policy.backoff(u32::MAX), Duration::from_secs(2));
}
