#![allow(dead_code)]

use std::path::PathBuf;

use respawner::config::{
    BootstrapSection, BuildSection, ConfigFile, RawConfigFile, RepositorySection,
    SupervisorSection,
};
use respawner::types::Platform;

/// Builder for `ConfigFile` to simplify test setup.
///
/// Defaults target the host platform, keep logs off disk and use short
/// intervals so paused-time tests stay well inside `with_timeout`.
pub struct ConfigFileBuilder {
    config: RawConfigFile,
}

impl ConfigFileBuilder {
    pub fn new() -> Self {
        Self {
            config: RawConfigFile {
                supervisor: SupervisorSection {
                    platform: Platform::host(),
                    rebuild_on_start: false,
                    poll_interval_ms: 100,
                    repository_timeout_ms: 1_000,
                    build_timeout_ms: 1_000,
                    stop_timeout_ms: 200,
                    log_file: None,
                    container_log_file: None,
                },
                bootstrap: BootstrapSection {
                    max_attempts: 3,
                    initial_backoff_ms: 10,
                    max_backoff_ms: 40,
                },
                repository: RepositorySection {
                    remote_url: "https://git.example.invalid/app.git".to_string(),
                    local_path: PathBuf::from("repo"),
                    remote: "origin".to_string(),
                    branch: "master".to_string(),
                },
                build: BuildSection {
                    entry_point: PathBuf::from("container/main.rs"),
                    output: PathBuf::from("bin/container"),
                    compiler: "cc".to_string(),
                    args: vec![
                        "{entry}".to_string(),
                        "-o".to_string(),
                        "{output}".to_string(),
                    ],
                },
            },
        }
    }

    pub fn platform(mut self, platform: &str) -> Self {
        self.config.supervisor.platform = Platform::new(platform);
        self
    }

    pub fn rebuild_on_start(mut self, val: bool) -> Self {
        self.config.supervisor.rebuild_on_start = val;
        self
    }

    pub fn poll_interval_ms(mut self, ms: u64) -> Self {
        self.config.supervisor.poll_interval_ms = ms;
        self
    }

    pub fn repository_timeout_ms(mut self, ms: u64) -> Self {
        self.config.supervisor.repository_timeout_ms = ms;
        self
    }

    pub fn build_timeout_ms(mut self, ms: u64) -> Self {
        self.config.supervisor.build_timeout_ms = ms;
        self
    }

    pub fn stop_timeout_ms(mut self, ms: u64) -> Self {
        self.config.supervisor.stop_timeout_ms = ms;
        self
    }

    pub fn max_attempts(mut self, attempts: u32) -> Self {
        self.config.bootstrap.max_attempts = attempts;
        self
    }

    pub fn backoff_ms(mut self, initial: u64, max: u64) -> Self {
        self.config.bootstrap.initial_backoff_ms = initial;
        self.config.bootstrap.max_backoff_ms = max;
        self
    }

    pub fn local_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.repository.local_path = path.into();
        self
    }

    pub fn output(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.build.output = path.into();
        self
    }

    /// The unvalidated config, for tests that exercise validation itself.
    pub fn raw(self) -> RawConfigFile {
        self.config
    }

    pub fn build(self) -> ConfigFile {
        ConfigFile::try_from(self.config).expect("Failed to build valid config from builder")
    }
}

impl Default for ConfigFileBuilder {
    fn default() -> Self {
        Self::new()
    }
}
