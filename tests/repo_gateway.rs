// tests/repo_gateway.rs

use std::path::{Path, PathBuf};
use std::sync::atomic::AtomicUsize;
use std::sync::Arc;
use std::time::Duration;

use respawner::engine::RebuildFlag;
use respawner::errors::RespawnerError;
use respawner::fs::mock::MockFileSystem;
use respawner::fs::FileSystem;
use respawner::repo::{DiffStat, PullSummary, RepositoryDescriptor, RepositoryGateway};
use respawner::types::StepKind;
use respawner_test_utils::fakes::{Call, CallLog, FakeVcs, PullStep, Script};
use respawner_test_utils::init_tracing;

fn descriptor() -> RepositoryDescriptor {
    RepositoryDescriptor {
        remote_url: "https://git.example.invalid/app.git".to_string(),
        local_path: PathBuf::from("checkout"),
        remote: "origin".to_string(),
        branch: "main".to_string(),
    }
}

fn gateway(fs: &MockFileSystem, vcs: FakeVcs) -> RepositoryGateway<FakeVcs> {
    RepositoryGateway::new(
        descriptor(),
        vcs,
        Arc::new(fs.clone()),
        Duration::from_millis(250),
    )
}

#[tokio::test]
async fn missing_clone_is_cloned_and_sets_flag() {
    init_tracing();
    let fs = MockFileSystem::new();
    let log = CallLog::new();
    let mut gw = gateway(&fs, FakeVcs::new(fs.clone(), log.clone()));
    let mut flag = RebuildFlag::new(false);

    let outcome = gw.ensure_cloned(&mut flag).await.unwrap();

    assert!(outcome.cloned);
    assert!(flag.is_pending());
    assert_eq!(
        log.snapshot(),
        vec![Call::Clone {
            remote_url: "https://git.example.invalid/app.git".to_string(),
            path: PathBuf::from("checkout"),
        }]
    );
}

#[tokio::test]
async fn existing_clone_is_left_alone() {
    init_tracing();
    let fs = MockFileSystem::new();
    fs.add_dir("checkout");
    let log = CallLog::new();
    let mut gw = gateway(&fs, FakeVcs::new(fs.clone(), log.clone()));
    let mut flag = RebuildFlag::new(false);

    let outcome = gw.ensure_cloned(&mut flag).await.unwrap();

    assert!(!outcome.cloned);
    assert!(!flag.is_pending());
    assert_eq!(log.clones(), 0);
}

#[tokio::test]
async fn file_in_place_of_clone_is_an_error() {
    init_tracing();
    let fs = MockFileSystem::new();
    fs.add_file("checkout", b"oops".to_vec());
    let log = CallLog::new();
    let mut gw = gateway(&fs, FakeVcs::new(fs.clone(), log.clone()));
    let mut flag = RebuildFlag::new(false);

    let err = gw.ensure_cloned(&mut flag).await.unwrap_err();

    assert!(matches!(err, RespawnerError::Repo(_)), "{:?}", err);
    assert_eq!(log.clones(), 0);
}

#[tokio::test]
async fn failed_clone_leaves_flag_untouched() {
    init_tracing();
    let fs = MockFileSystem::new();
    let log = CallLog::new();
    let vcs = FakeVcs::new(fs.clone(), log.clone())
        .with_clone_failures(Arc::new(AtomicUsize::new(1)));
    let mut gw = gateway(&fs, vcs);
    let mut flag = RebuildFlag::new(false);

    let err = gw.ensure_cloned(&mut flag).await.unwrap_err();

    assert_eq!(err.step(), Some(StepKind::Repository));
    assert!(!flag.is_pending());

    // Second call clones for real.
    assert!(gw.ensure_cloned(&mut flag).await.unwrap().cloned);
    assert!(flag.is_pending());
}

#[tokio::test(start_paused = true)]
async fn timed_out_clone_is_removed_before_the_next_attempt() {
    init_tracing();
    let fs = MockFileSystem::new();
    let log = CallLog::new();
    let vcs = FakeVcs::new(fs.clone(), log.clone())
        .with_stalled_clones(Arc::new(AtomicUsize::new(1)));
    let mut gw = gateway(&fs, vcs);
    let mut flag = RebuildFlag::new(false);

    let err = gw.ensure_cloned(&mut flag).await.unwrap_err();

    assert!(
        matches!(err, RespawnerError::StepTimeout { step: StepKind::Repository, .. }),
        "{:?}",
        err
    );
    assert!(!fs.exists(Path::new("checkout")));
    assert!(!fs.exists(Path::new("checkout/.git")));
    assert!(!flag.is_pending());

    let retry = gw.ensure_cloned(&mut flag).await.unwrap();
    assert!(retry.cloned);
    assert!(flag.is_pending());
    assert_eq!(log.clones(), 2);
}

#[tokio::test]
async fn pull_reports_change() {
    init_tracing();
    let fs = MockFileSystem::new();
    fs.add_dir("checkout");
    let log = CallLog::new();
    let script = Script::default();
    script.extend([PullStep::Changed { files: 3 }, PullStep::Unchanged]);
    let vcs = FakeVcs::new(fs.clone(), log.clone()).with_script(script.clone());
    let mut gw = gateway(&fs, vcs);

    let first = gw.check_for_updates().await.unwrap();
    assert!(first.changed());
    assert_eq!(first.stat.files_changed, 3);

    let second = gw.check_for_updates().await.unwrap();
    assert!(!second.changed());
    assert_eq!(second.before, first.after);
    assert_eq!(script.remaining(), 0);
}

#[tokio::test(start_paused = true)]
async fn hung_pull_is_a_repository_timeout() {
    init_tracing();
    let fs = MockFileSystem::new();
    fs.add_dir("checkout");
    let log = CallLog::new();
    let script = Script::default();
    script.push(PullStep::Hang);
    let vcs = FakeVcs::new(fs.clone(), log.clone()).with_script(script);
    let mut gw = gateway(&fs, vcs);

    let err = gw.check_for_updates().await.unwrap_err();

    match err {
        RespawnerError::StepTimeout { step, after } => {
            assert_eq!(step, StepKind::Repository);
            assert_eq!(after, Duration::from_millis(250));
        }
        other => panic!("Expected StepTimeout, got: {:?}", other),
    }
}

#[test]
fn diffstat_parses_full_line() {
    let output = "\
Updating 1a2b3c4..5d6e7f8
Fast-forward
 src/main.rs | 12 ++++++++----
 README.md   |  2 +-
 2 files changed, 9 insertions(+), 5 deletions(-)
";
    assert_eq!(
        DiffStat::parse(output),
        Some(DiffStat {
            files_changed: 2,
            insertions: 9,
            deletions: 5,
        })
    );
}

#[test]
fn diffstat_handles_missing_counts() {
    assert_eq!(
        DiffStat::parse(" 1 file changed, 1 insertion(+)\n"),
        Some(DiffStat {
            files_changed: 1,
            insertions: 1,
            deletions: 0,
        })
    );
    assert_eq!(
        DiffStat::parse(" 3 files changed, 7 deletions(-)\n"),
        Some(DiffStat {
            files_changed: 3,
            insertions: 0,
            deletions: 7,
        })
    );
    assert_eq!(DiffStat::parse("Already up to date.\n"), None);
}

#[test]
fn summary_change_is_head_movement() {
    assert!(!PullSummary::unchanged("abc").changed());

    let moved = PullSummary {
        before: "abc".into(),
        after: "def".into(),
        stat: DiffStat::default(),
    };
    assert!(moved.changed());
}
