// tests/supervisor_respawn.rs

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use respawner::errors::RespawnerError;
use respawner::exec::{ExitReport, ProcessLauncher, ProcessSupervisor, RespawnOutcome};
use respawner::fs::mock::MockFileSystem;
use respawner::types::StepKind;
use respawner_test_utils::fakes::{Call, CallLog, Crasher, FakeLauncher};
use respawner_test_utils::{init_tracing, with_timeout};

const EXE: &str = "bin/container";

fn supervisor(launcher: FakeLauncher) -> (MockFileSystem, ProcessSupervisor<FakeLauncher>) {
    let fs = MockFileSystem::new();
    fs.add_executable(EXE, b"#!fake\n".to_vec());
    let sup = ProcessSupervisor::new(launcher, Arc::new(fs.clone()), Duration::from_millis(200));
    (fs, sup)
}

#[tokio::test]
async fn spawn_missing_executable_is_rejected() {
    init_tracing();
    let log = CallLog::new();
    let (_fs, mut sup) = supervisor(FakeLauncher::new(log.clone()));

    let err = sup.spawn(&PathBuf::from("bin/nope")).unwrap_err();

    match &err {
        RespawnerError::ExecutableNotFound(path) => assert_eq!(path, &PathBuf::from("bin/nope")),
        other => panic!("Expected ExecutableNotFound, got: {:?}", other),
    }
    assert_eq!(err.step(), Some(StepKind::Spawn));
    assert_eq!(log.launches(), 0);
    assert!(sup.current().is_none());
}

#[tokio::test]
async fn spawn_non_executable_file_is_rejected() {
    init_tracing();
    let log = CallLog::new();
    let (fs, mut sup) = supervisor(FakeLauncher::new(log.clone()));
    fs.add_file("bin/notes.txt", b"not a program".to_vec());

    let err = sup.spawn(&PathBuf::from("bin/notes.txt")).unwrap_err();

    match &err {
        RespawnerError::Process(msg) => assert!(msg.contains("not executable"), "{msg}"),
        other => panic!("Expected Process error, got: {:?}", other),
    }
    assert_eq!(log.launches(), 0);
}

#[tokio::test]
async fn respawn_without_container_is_a_noop() {
    init_tracing();
    let log = CallLog::new();
    let (_fs, mut sup) = supervisor(FakeLauncher::new(log.clone()));

    let outcome = sup.respawn(&PathBuf::from(EXE)).await.unwrap();

    assert_eq!(outcome, RespawnOutcome::NoContainer);
    assert_eq!(log.launches(), 0);
    assert!(sup.current_pid().is_none());
}

#[tokio::test]
async fn respawn_terminates_old_before_launching_new() -> anyhow::Result<()> {
    init_tracing();
    let log = CallLog::new();
    let (_fs, mut sup) = supervisor(FakeLauncher::new(log.clone()));
    let exe = PathBuf::from(EXE);

    let old_pid = sup.spawn(&exe)?;
    log.clear();

    let outcome = with_timeout(sup.respawn(&exe)).await?;

    let RespawnOutcome::Respawned {
        old_pid: reported_old,
        new_pid,
    } = outcome
    else {
        panic!("Expected Respawned, got {:?}", outcome);
    };
    assert_eq!(reported_old, old_pid);
    assert_ne!(new_pid, old_pid);
    assert_eq!(sup.current_pid(), Some(new_pid));

    assert_eq!(
        log.snapshot(),
        vec![
            Call::Terminate { pid: old_pid },
            Call::Exit { pid: old_pid },
            Call::Launch {
                pid: new_pid,
                path: exe.clone()
            },
        ]
    );
    Ok(())
}

#[tokio::test]
async fn spawn_refuses_second_running_container() {
    init_tracing();
    let log = CallLog::new();
    let (_fs, mut sup) = supervisor(FakeLauncher::new(log.clone()));
    let exe = PathBuf::from(EXE);

    let pid = sup.spawn(&exe).unwrap();
    let err = sup.spawn(&exe).unwrap_err();

    assert!(matches!(err, RespawnerError::Process(_)), "{:?}", err);
    assert_eq!(sup.current_pid(), Some(pid));
    assert_eq!(log.launches(), 1);
}

#[tokio::test]
async fn crash_is_observed_but_not_respawned() -> anyhow::Result<()> {
    init_tracing();
    let log = CallLog::new();
    let crasher = Crasher::default();
    let (_fs, mut sup) = supervisor(FakeLauncher::new(log.clone()).with_crasher(crasher.clone()));
    let exe = PathBuf::from(EXE);

    let pid = sup.spawn(&exe)?;
    assert!(crasher.crash(pid, 3));

    with_timeout(async {
        while !sup.current().is_some_and(|h| h.has_exited()) {
            tokio::task::yield_now().await;
        }
    })
    .await;

    assert_eq!(
        sup.current().and_then(|h| h.exit_status()),
        Some(ExitReport::Exited { code: Some(3) })
    );
    assert_eq!(log.launches(), 1, "exit events never trigger a respawn");

    // An exited container no longer blocks a fresh spawn.
    let next = sup.spawn(&exe)?;
    assert_ne!(next, pid);
    Ok(())
}

#[tokio::test]
async fn shutdown_stops_container_and_releases_handle() -> anyhow::Result<()> {
    init_tracing();
    let log = CallLog::new();
    let (_fs, mut sup) = supervisor(FakeLauncher::new(log.clone()));

    let pid = sup.spawn(&PathBuf::from(EXE))?;
    let report = with_timeout(sup.shutdown()).await?;

    assert_eq!(report, Some(ExitReport::Exited { code: None }));
    assert!(sup.current().is_none());
    assert_eq!(log.terminations(), 1);
    assert!(log.snapshot().contains(&Call::Exit { pid }));

    // Nothing left to stop.
    assert_eq!(sup.shutdown().await?, None);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn stuck_container_times_out_and_keeps_handle() {
    init_tracing();
    let log = CallLog::new();
    let (_fs, mut sup) = supervisor(FakeLauncher::new(log.clone()).stubborn());
    let exe = PathBuf::from(EXE);

    let pid = sup.spawn(&exe).unwrap();
    let err = sup.respawn(&exe).await.unwrap_err();

    match err {
        RespawnerError::StepTimeout { step, .. } => assert_eq!(step, StepKind::Stop),
        other => panic!("Expected StepTimeout, got: {:?}", other),
    }
    assert_eq!(sup.current_pid(), Some(pid), "handle kept for a later retry");
    assert_eq!(log.launches(), 1, "no new container while the old one lingers");
}

#[tokio::test]
async fn kill_is_idempotent() -> anyhow::Result<()> {
    init_tracing();
    let log = CallLog::new();
    let mut launcher = FakeLauncher::new(log.clone());

    let mut handle = launcher.launch(&PathBuf::from(EXE))?;
    handle.kill()?;
    handle.kill()?;
    assert!(handle.kill_requested());

    let report = with_timeout(handle.wait_exit()).await?;
    assert_eq!(report, ExitReport::Exited { code: None });
    handle.kill()?;
    assert_eq!(log.terminations(), 1);
    Ok(())
}
