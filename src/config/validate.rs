// src/config/validate.rs

use crate::config::model::{ConfigFile, RawConfigFile};
use crate::errors::{Result, RespawnerError};

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = crate::errors::RespawnerError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        validate_raw_config(&raw)?;
        Ok(ConfigFile::new_unchecked(raw))
    }
}

pub fn validate_raw_config(cfg: &RawConfigFile) -> Result<()> {
    validate_supervisor(cfg)?;
    validate_bootstrap(cfg)?;
    validate_repository(cfg)?;
    validate_build(cfg)?;
    Ok(())
}

fn config_error(msg: impl Into<String>) -> RespawnerError {
    RespawnerError::ConfigError(msg.into())
}

fn validate_supervisor(cfg: &RawConfigFile) -> Result<()> {
    let s = &cfg.supervisor;

    let durations = [
        ("poll_interval_ms", s.poll_interval_ms),
        ("repository_timeout_ms", s.repository_timeout_ms),
        ("build_timeout_ms", s.build_timeout_ms),
        ("stop_timeout_ms", s.stop_timeout_ms),
    ];
    for (name, value) in durations {
        if value == 0 {
            return Err(config_error(format!(
                "[supervisor].{name} must be >= 1 (got 0)"
            )));
        }
    }

    if s.platform.as_str().is_empty() {
        return Err(config_error("[supervisor].platform must not be empty"));
    }

    if let (Some(app), Some(container)) = (&s.log_file, &s.container_log_file) {
        if app == container {
            return Err(config_error(format!(
                "[supervisor].log_file and container_log_file must differ (both {:?})",
                app
            )));
        }
    }

    Ok(())
}

fn validate_bootstrap(cfg: &RawConfigFile) -> Result<()> {
    let b = &cfg.bootstrap;

    if b.max_attempts == 0 {
        return Err(config_error(
            "[bootstrap].max_attempts must be >= 1 (got 0)",
        ));
    }

    if b.initial_backoff_ms > b.max_backoff_ms {
        return Err(config_error(format!(
            "[bootstrap].initial_backoff_ms ({}) must not exceed max_backoff_ms ({})",
            b.initial_backoff_ms, b.max_backoff_ms
        )));
    }

    Ok(())
}

fn validate_repository(cfg: &RawConfigFile) -> Result<()> {
    let r = &cfg.repository;

    if r.remote_url.trim().is_empty() {
        return Err(config_error("[repository].remote_url must not be empty"));
    }
    if r.remote.trim().is_empty() {
        return Err(config_error("[repository].remote must not be empty"));
    }
    if r.branch.trim().is_empty() {
        return Err(config_error("[repository].branch must not be empty"));
    }
    if r.local_path.as_os_str().is_empty() {
        return Err(config_error("[repository].local_path must not be empty"));
    }

    Ok(())
}

fn validate_build(cfg: &RawConfigFile) -> Result<()> {
    let b = &cfg.build;

    if b.compiler.trim().is_empty() {
        return Err(config_error("[build].compiler must not be empty"));
    }
    if b.output.as_os_str().is_empty() {
        return Err(config_error("[build].output must not be empty"));
    }
    if b.entry_point.as_os_str().is_empty() {
        return Err(config_error("[build].entry_point must not be empty"));
    }
    if b.entry_point.is_absolute() {
        return Err(config_error(format!(
            "[build].entry_point must be relative to the repository clone (got {:?})",
            b.entry_point
        )));
    }

    Ok(())
}
