// src/logging.rs

//! Logging setup for `respawner` using `tracing` + `tracing-subscriber`.
//!
//! Priority for determining the log level:
//! 1. `--log-level` CLI flag (if provided)
//! 2. `RESPAWNER_LOG` environment variable (e.g. "info", "debug")
//! 3. default to `info`
//!
//! Supervisor events go to STDERR and, when configured, to an append-only
//! log file. Container stdout/stderr (events on [`CONTAINER_TARGET`]) go to
//! their own append-only file and are kept out of the supervisor outputs.

use std::fs::{File, OpenOptions};
use std::path::Path;
use std::sync::Mutex;

use anyhow::{Context, Result};
use tracing::Level;
use tracing_subscriber::filter::filter_fn;
use tracing_subscriber::fmt;
use tracing_subscriber::prelude::*;

use crate::cli::LogLevel;
use crate::config::SupervisorSection;
use crate::exec::CONTAINER_TARGET;

/// Initialise the global logging subscriber.
///
/// Safe to call once at startup.
pub fn init_logging(cli_level: Option<LogLevel>, supervisor: &SupervisorSection) -> Result<()> {
    let level = match cli_level {
        Some(lvl) => level_from_log_level(lvl),
        None => std::env::var("RESPAWNER_LOG")
            .ok()
            .and_then(|s| parse_level_str(&s))
            .unwrap_or(Level::INFO),
    };

    // Without a container log file, container output falls back to stderr.
    let container_to_stderr = supervisor.container_log_file.is_none();

    let stderr_layer = fmt::layer()
        .with_target(true)
        .with_thread_ids(false)
        .with_thread_names(false)
        .with_writer(std::io::stderr)
        .with_filter(filter_fn(move |meta| {
            (container_to_stderr || meta.target() != CONTAINER_TARGET) && *meta.level() <= level
        }));

    let app_file_layer = match &supervisor.log_file {
        Some(path) => Some(
            fmt::layer()
                .with_ansi(false)
                .with_target(true)
                .with_writer(Mutex::new(open_append(path)?))
                .with_filter(filter_fn(move |meta| {
                    meta.target() != CONTAINER_TARGET && *meta.level() <= level
                })),
        ),
        None => None,
    };

    let container_file_layer = match &supervisor.container_log_file {
        Some(path) => Some(
            fmt::layer()
                .with_ansi(false)
                .with_target(false)
                .with_writer(Mutex::new(open_append(path)?))
                .with_filter(filter_fn(|meta| meta.target() == CONTAINER_TARGET)),
        ),
        None => None,
    };

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(app_file_layer)
        .with(container_file_layer)
        .try_init()
        .context("installing tracing subscriber")?;

    Ok(())
}

fn open_append(path: &Path) -> Result<File> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("creating log directory {:?}", parent))?;
        }
    }
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("opening log file {:?}", path))
}

fn level_from_log_level(lvl: LogLevel) -> Level {
    match lvl {
        LogLevel::Error => Level::ERROR,
        LogLevel::Warn => Level::WARN,
        LogLevel::Info => Level::INFO,
        LogLevel::Debug => Level::DEBUG,
        LogLevel::Trace => Level::TRACE,
    }
}

pub fn parse_level_str(s: &str) -> Option<Level> {
    match s.trim().to_lowercase().as_str() {
        "error" => Some(Level::ERROR),
        "warn" | "warning" => Some(Level::WARN),
        "info" => Some(Level::INFO),
        "debug" => Some(Level::DEBUG),
        "trace" => Some(Level::TRACE),
        _ => None,
    }
}
