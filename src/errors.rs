// src/errors.rs

//! Crate-wide error aliases and helpers.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::types::StepKind;

#[derive(Error, Debug)]
pub enum RespawnerError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    /// Clone or pull against the remote repository failed.
    #[error("Repository error: {0}")]
    Repo(String),

    /// A build was requested on a host that cannot produce the target executable.
    #[error("Unsupported platform: host is '{host}', build targets '{target}'")]
    UnsupportedPlatform { host: String, target: String },

    #[error("Build error: {0}")]
    Build(String),

    #[error("Executable not found: {}", .0.display())]
    ExecutableNotFound(PathBuf),

    /// Runtime error reported by (or while controlling) the container process.
    #[error("Process error: {0}")]
    Process(String),

    #[error("Step '{step}' timed out after {after:?}")]
    StepTimeout { step: StepKind, after: Duration },

    #[error("Bootstrap failed after {attempts} attempt(s): {last}")]
    BootstrapExhausted { attempts: u32, last: String },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl RespawnerError {
    /// The control-loop step an error is attributed to, if any.
    pub fn step(&self) -> Option<StepKind> {
        match self {
            RespawnerError::Repo(_) => Some(StepKind::Repository),
            RespawnerError::UnsupportedPlatform { .. } | RespawnerError::Build(_) => {
                Some(StepKind::Build)
            }
            RespawnerError::ExecutableNotFound(_) | RespawnerError::Process(_) => {
                Some(StepKind::Spawn)
            }
            RespawnerError::StepTimeout { step, .. } => Some(*step),
            _ => None,
        }
    }
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, RespawnerError>;
