// src/config/model.rs

use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

use crate::build::{BuildDescriptor, CommandCompiler};
use crate::engine::RetryPolicy;
use crate::repo::RepositoryDescriptor;
use crate::types::Platform;

/// Configuration as read from a TOML file, before validation.
///
/// ```toml
/// [supervisor]
/// platform = "linux"
/// poll_interval_ms = 10000
///
/// [repository]
/// remote_url = "https://example.com/app.git"
/// local_path = ".repo"
///
/// [build]
/// entry_point = "container/main.rs"
/// output = "container"
/// compiler = "rustc"
/// args = ["{entry}", "-o", "{output}"]
/// ```
///
/// `[supervisor]` and `[bootstrap]` are optional; `[repository]` and
/// `[build]` are required.
#[derive(Debug, Clone, Deserialize)]
pub struct RawConfigFile {
    #[serde(default)]
    pub supervisor: SupervisorSection,

    #[serde(default)]
    pub bootstrap: BootstrapSection,

    pub repository: RepositorySection,

    pub build: BuildSection,
}

/// Validated configuration. Construct through `ConfigFile::try_from(raw)`.
#[derive(Debug, Clone)]
pub struct ConfigFile {
    pub supervisor: SupervisorSection,
    pub bootstrap: BootstrapSection,
    pub repository: RepositorySection,
    pub build: BuildSection,
}

impl ConfigFile {
    pub(crate) fn new_unchecked(raw: RawConfigFile) -> Self {
        Self {
            supervisor: raw.supervisor,
            bootstrap: raw.bootstrap,
            repository: raw.repository,
            build: raw.build,
        }
    }

    pub fn repository_descriptor(&self) -> RepositoryDescriptor {
        RepositoryDescriptor {
            remote_url: self.repository.remote_url.clone(),
            local_path: self.repository.local_path.clone(),
            remote: self.repository.remote.clone(),
            branch: self.repository.branch.clone(),
        }
    }

    /// The entry point is resolved relative to the repository clone.
    pub fn build_descriptor(&self) -> BuildDescriptor {
        BuildDescriptor {
            entry_point: self.repository.local_path.join(&self.build.entry_point),
            output: self.build.output.clone(),
            target_platform: self.supervisor.platform.clone(),
        }
    }

    pub fn compiler(&self) -> CommandCompiler {
        CommandCompiler::new(self.build.compiler.clone(), self.build.args.clone())
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.bootstrap.max_attempts,
            initial_backoff: Duration::from_millis(self.bootstrap.initial_backoff_ms),
            max_backoff: Duration::from_millis(self.bootstrap.max_backoff_ms),
        }
    }
}

/// `[supervisor]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct SupervisorSection {
    /// Platform builds are produced for. Defaults to the host platform.
    #[serde(default = "Platform::host")]
    pub platform: Platform,

    /// Build once at startup even when the clone already existed.
    #[serde(default)]
    pub rebuild_on_start: bool,

    /// Interval between update checks.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Budget for a single clone or pull.
    #[serde(default = "default_repository_timeout_ms")]
    pub repository_timeout_ms: u64,

    /// Budget for a single compiler invocation.
    #[serde(default = "default_build_timeout_ms")]
    pub build_timeout_ms: u64,

    /// How long a terminated container may take to exit before it is
    /// force-killed.
    #[serde(default = "default_stop_timeout_ms")]
    pub stop_timeout_ms: u64,

    /// Append-only log of supervisor events. `None` logs to stderr only.
    #[serde(default = "default_log_file")]
    pub log_file: Option<PathBuf>,

    /// Append-only log of container stdout/stderr.
    #[serde(default = "default_container_log_file")]
    pub container_log_file: Option<PathBuf>,
}

impl SupervisorSection {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn repository_timeout(&self) -> Duration {
        Duration::from_millis(self.repository_timeout_ms)
    }

    pub fn build_timeout(&self) -> Duration {
        Duration::from_millis(self.build_timeout_ms)
    }

    pub fn stop_timeout(&self) -> Duration {
        Duration::from_millis(self.stop_timeout_ms)
    }
}

fn default_poll_interval_ms() -> u64 {
    10_000
}

fn default_repository_timeout_ms() -> u64 {
    120_000
}

fn default_build_timeout_ms() -> u64 {
    600_000
}

fn default_stop_timeout_ms() -> u64 {
    10_000
}

fn default_log_file() -> Option<PathBuf> {
    Some(PathBuf::from("respawner.log"))
}

fn default_container_log_file() -> Option<PathBuf> {
    Some(PathBuf::from("container.log"))
}

impl Default for SupervisorSection {
    fn default() -> Self {
        Self {
            platform: Platform::host(),
            rebuild_on_start: false,
            poll_interval_ms: default_poll_interval_ms(),
            repository_timeout_ms: default_repository_timeout_ms(),
            build_timeout_ms: default_build_timeout_ms(),
            stop_timeout_ms: default_stop_timeout_ms(),
            log_file: default_log_file(),
            container_log_file: default_container_log_file(),
        }
    }
}

/// `[bootstrap]` section: retry policy when the initial
/// clone → build → spawn chain fails.
#[derive(Debug, Clone, Deserialize)]
pub struct BootstrapSection {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,

    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,
}

fn default_max_attempts() -> u32 {
    5
}

fn default_initial_backoff_ms() -> u64 {
    1_000
}

fn default_max_backoff_ms() -> u64 {
    30_000
}

impl Default for BootstrapSection {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_backoff_ms: default_initial_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
        }
    }
}

/// `[repository]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct RepositorySection {
    pub remote_url: String,

    #[serde(default = "default_local_path")]
    pub local_path: PathBuf,

    #[serde(default = "default_remote")]
    pub remote: String,

    #[serde(default = "default_branch")]
    pub branch: String,
}

fn default_local_path() -> PathBuf {
    PathBuf::from(".repo")
}

fn default_remote() -> String {
    "origin".to_string()
}

fn default_branch() -> String {
    "master".to_string()
}

/// `[build]` section.
///
/// `args` is a template: `{entry}` and `{output}` are substituted with the
/// resolved entry point and output path before the compiler is invoked.
#[derive(Debug, Clone, Deserialize)]
pub struct BuildSection {
    pub entry_point: PathBuf,

    pub output: PathBuf,

    pub compiler: String,

    #[serde(default = "default_args")]
    pub args: Vec<String>,
}

fn default_args() -> Vec<String> {
    vec![
        "{entry}".to_string(),
        "-o".to_string(),
        "{output}".to_string(),
    ]
}
