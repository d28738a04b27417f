// tests/real_process.rs

#![cfg(unix)]

use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use respawner::exec::{
    ExitReport, LineSink, OutputStream, ProcessLauncher, ProcessSupervisor, RespawnOutcome,
    TokioLauncher,
};
use respawner::fs::RealFileSystem;
use respawner_test_utils::{init_tracing, with_timeout};

#[derive(Default)]
struct CollectingSink {
    lines: Mutex<Vec<(u32, OutputStream, String)>>,
}

impl CollectingSink {
    fn contains(&self, stream: OutputStream, text: &str) -> bool {
        self.lines
            .lock()
            .unwrap()
            .iter()
            .any(|(_, s, l)| *s == stream && l == text)
    }
}

impl LineSink for CollectingSink {
    fn line(&self, pid: u32, stream: OutputStream, line: &str) {
        self.lines
            .lock()
            .unwrap()
            .push((pid, stream, line.to_string()));
    }
}

fn write_script(dir: &Path, name: &str, body: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path
}

async fn wait_for_line(sink: &CollectingSink, stream: OutputStream, text: &str) {
    with_timeout(async {
        while !sink.contains(stream, text) {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await;
}

#[tokio::test]
async fn output_is_forwarded_and_sigterm_stops_the_process() -> anyhow::Result<()> {
    init_tracing();
    let dir = tempfile::tempdir()?;
    let exe = write_script(
        dir.path(),
        "container",
        "echo hello\necho oops >&2\nexec sleep 30",
    );
    let sink = Arc::new(CollectingSink::default());
    let mut launcher = TokioLauncher::new(sink.clone(), Duration::from_secs(2));

    let mut handle = launcher.launch(&exe)?;
    wait_for_line(&sink, OutputStream::Stdout, "hello").await;
    wait_for_line(&sink, OutputStream::Stderr, "oops").await;

    assert!(!handle.has_exited());
    handle.kill()?;
    let report = with_timeout(handle.wait_exit()).await?;

    assert_eq!(report, ExitReport::Exited { code: None });
    let pid = handle.pid();
    assert!(sink.lines.lock().unwrap().iter().all(|(p, _, _)| *p == pid));
    Ok(())
}

#[tokio::test]
async fn invalid_utf8_output_does_not_stop_forwarding() -> anyhow::Result<()> {
    init_tracing();
    let dir = tempfile::tempdir()?;
    let exe = write_script(
        dir.path(),
        "container",
        "echo before\nprintf '\\377\\376bad\\r\\n'\necho after",
    );
    let sink = Arc::new(CollectingSink::default());
    let mut launcher = TokioLauncher::new(sink.clone(), Duration::from_secs(1));

    let mut handle = launcher.launch(&exe)?;
    wait_for_line(&sink, OutputStream::Stdout, "after").await;
    let report = with_timeout(handle.wait_exit()).await?;

    assert_eq!(report, ExitReport::Exited { code: Some(0) });
    let lines: Vec<String> = sink
        .lines
        .lock()
        .unwrap()
        .iter()
        .map(|(_, _, l)| l.clone())
        .collect();
    assert_eq!(lines, vec!["before", "\u{FFFD}\u{FFFD}bad", "after"]);
    Ok(())
}

#[tokio::test]
async fn natural_exit_is_reported_with_code() -> anyhow::Result<()> {
    init_tracing();
    let dir = tempfile::tempdir()?;
    let exe = write_script(dir.path(), "container", "exit 7");
    let mut launcher = TokioLauncher::new(Arc::new(CollectingSink::default()), Duration::from_secs(1));

    let mut handle = launcher.launch(&exe)?;
    let report = with_timeout(handle.wait_exit()).await?;

    assert_eq!(report, ExitReport::Exited { code: Some(7) });
    assert!(!report.success());
    // Killing an exited process is a no-op.
    handle.kill()?;
    Ok(())
}

#[tokio::test]
async fn process_ignoring_sigterm_is_force_killed_after_grace() -> anyhow::Result<()> {
    init_tracing();
    let dir = tempfile::tempdir()?;
    let exe = write_script(
        dir.path(),
        "container",
        "trap '' TERM\necho ready\nwhile true; do sleep 1; done",
    );
    let sink = Arc::new(CollectingSink::default());
    let grace = Duration::from_millis(300);
    let mut launcher = TokioLauncher::new(sink.clone(), grace);

    let mut handle = launcher.launch(&exe)?;
    wait_for_line(&sink, OutputStream::Stdout, "ready").await;

    let started = std::time::Instant::now();
    handle.kill()?;
    let report = with_timeout(handle.wait_exit()).await?;

    assert_eq!(report, ExitReport::Exited { code: None });
    assert!(started.elapsed() >= grace);
    Ok(())
}

#[tokio::test]
async fn supervisor_respawns_a_real_process() -> anyhow::Result<()> {
    init_tracing();
    let dir = tempfile::tempdir()?;
    let exe = write_script(dir.path(), "container", "exec sleep 30");
    let launcher = TokioLauncher::new(Arc::new(CollectingSink::default()), Duration::from_secs(2));
    let mut supervisor =
        ProcessSupervisor::new(launcher, Arc::new(RealFileSystem), Duration::from_secs(2));

    let first = supervisor.spawn(&exe)?;
    let outcome = with_timeout(supervisor.respawn(&exe)).await?;

    let RespawnOutcome::Respawned { old_pid, new_pid } = outcome else {
        panic!("Expected Respawned, got {:?}", outcome);
    };
    assert_eq!(old_pid, first);
    assert_ne!(new_pid, first);

    let report = with_timeout(supervisor.shutdown()).await?;
    assert_eq!(report, Some(ExitReport::Exited { code: None }));
    assert!(supervisor.current().is_none());
    Ok(())
}
