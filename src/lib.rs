// src/lib.rs

pub mod build;
pub mod cli;
pub mod config;
pub mod engine;
pub mod errors;
pub mod exec;
pub mod fs;
pub mod logging;
pub mod repo;
pub mod timeouts;
pub mod types;

use std::sync::Arc;

use anyhow::Result;
use tokio::sync::mpsc;
use tracing::{debug, error, info};

use crate::build::Builder;
use crate::cli::CliArgs;
use crate::config::ConfigFile;
use crate::engine::{RuntimeEvent, SchedulerOptions, UpdateScheduler};
use crate::exec::{ProcessSupervisor, TokioLauncher, TracingSink};
use crate::fs::{FileSystem, RealFileSystem};
use crate::repo::{GitCli, RepositoryGateway};
use crate::types::Platform;

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - repository gateway (git)
/// - builder (configured compiler command)
/// - process supervisor (tokio processes, container output → log sink)
/// - update scheduler
/// - Ctrl-C / SIGTERM handling
pub async fn run(args: CliArgs, cfg: ConfigFile) -> Result<()> {
    let fs: Arc<dyn FileSystem> = Arc::new(RealFileSystem);
    let sup = &cfg.supervisor;

    let gateway = RepositoryGateway::new(
        cfg.repository_descriptor(),
        GitCli::new(),
        Arc::clone(&fs),
        sup.repository_timeout(),
    );
    let builder = Builder::new(cfg.compiler(), Arc::clone(&fs), sup.build_timeout());
    let launcher = TokioLauncher::new(Arc::new(TracingSink), sup.stop_timeout());
    let supervisor = ProcessSupervisor::new(launcher, Arc::clone(&fs), sup.stop_timeout());

    let options = SchedulerOptions {
        max_ticks: args.once.then_some(1),
        ..SchedulerOptions::from_config(&cfg)
    };

    let (rt_tx, rt_rx) = mpsc::channel::<RuntimeEvent>(16);

    // Ctrl-C / SIGTERM → graceful shutdown.
    {
        let tx = rt_tx.clone();
        tokio::spawn(async move {
            if let Err(e) = shutdown_signal().await {
                error!(error = %e, "failed to listen for shutdown signals");
                return;
            }
            let _ = tx.send(RuntimeEvent::ShutdownRequested).await;
        });
    }

    info!(
        pid = std::process::id(),
        remote_url = %cfg.repository.remote_url,
        path = ?cfg.repository.local_path,
        "respawner starting"
    );

    let scheduler = UpdateScheduler::new(
        gateway,
        builder,
        supervisor,
        cfg.build_descriptor(),
        options,
        rt_tx,
    );
    scheduler.run(rt_rx).await?;

    info!("respawner exiting");
    Ok(())
}

#[cfg(unix)]
async fn shutdown_signal() -> std::io::Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut terminate = signal(SignalKind::terminate())?;
    tokio::select! {
        res = tokio::signal::ctrl_c() => res,
        _ = terminate.recv() => Ok(()),
    }
}

#[cfg(not(unix))]
async fn shutdown_signal() -> std::io::Result<()> {
    tokio::signal::ctrl_c().await
}

/// Simple dry-run output: print the resolved configuration.
pub fn print_dry_run(cfg: &ConfigFile) {
    let sup = &cfg.supervisor;
    let repo = &cfg.repository;
    let build = cfg.build_descriptor();
    let compiler = cfg.compiler();

    println!("respawner dry-run");
    println!("  supervisor.platform = {} (host {})", sup.platform, Platform::host());
    println!("  supervisor.poll_interval_ms = {}", sup.poll_interval_ms);
    println!("  supervisor.rebuild_on_start = {}", sup.rebuild_on_start);
    println!(
        "  timeouts: repository={}ms build={}ms stop={}ms",
        sup.repository_timeout_ms, sup.build_timeout_ms, sup.stop_timeout_ms
    );
    println!(
        "  bootstrap: max_attempts={} backoff={}..{}ms",
        cfg.bootstrap.max_attempts, cfg.bootstrap.initial_backoff_ms, cfg.bootstrap.max_backoff_ms
    );
    println!();

    println!("repository:");
    println!("  remote_url: {}", repo.remote_url);
    println!("  local_path: {}", repo.local_path.display());
    println!("  pull: {} {}", repo.remote, repo.branch);
    println!();

    println!("build:");
    println!("  entry: {}", build.entry_point.display());
    println!("  output: {}", build.output.display());
    println!(
        "  cmd: {} {}",
        compiler.program(),
        compiler.render_args(&build.entry_point, &build.output).join(" ")
    );

    if let Some(ref path) = sup.log_file {
        println!("  log_file: {}", path.display());
    }
    if let Some(ref path) = sup.container_log_file {
        println!("  container_log_file: {}", path.display());
    }

    debug!("dry-run complete (no execution)");
}
