// src/types.rs

use std::fmt;
use std::future::Future;
use std::pin::Pin;

use serde::Deserialize;

/// Boxed future returned by the collaborator traits (`VcsClient`, `Compiler`).
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Operating system identifier used to decide whether a build may run.
///
/// Values are normalised to the names used by `std::env::consts::OS`
/// (`linux`, `macos`, `windows`, ...). The Node-style aliases `win32` and
/// `darwin` are accepted so older configs keep working.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize)]
#[serde(from = "String")]
pub struct Platform(String);

impl Platform {
    pub fn new(name: impl AsRef<str>) -> Self {
        let name = name.as_ref().trim().to_lowercase();
        let normalised = match name.as_str() {
            "win32" => "windows".to_string(),
            "darwin" => "macos".to_string(),
            _ => name,
        };
        Platform(normalised)
    }

    /// Platform of the running supervisor.
    pub fn host() -> Self {
        Platform::new(std::env::consts::OS)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for Platform {
    fn from(s: String) -> Self {
        Platform::new(s)
    }
}

impl From<&str> for Platform {
    fn from(s: &str) -> Self {
        Platform::new(s)
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Steps of the update-build-respawn loop, used for timeouts and log fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StepKind {
    /// Clone or pull.
    Repository,
    Build,
    Spawn,
    /// Waiting for a terminated container to exit.
    Stop,
}

impl fmt::Display for StepKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            StepKind::Repository => "repository",
            StepKind::Build => "build",
            StepKind::Spawn => "spawn",
            StepKind::Stop => "stop",
        };
        f.write_str(s)
    }
}
