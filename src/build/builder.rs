// src/build/builder.rs

use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use blake3::Hasher;
use tracing::{debug, info, warn};

use crate::build::compiler::Compiler;
use crate::build::BuildDescriptor;
use crate::engine::RebuildFlag;
use crate::errors::{Result, RespawnerError};
use crate::fs::FileSystem;
use crate::timeouts::bounded;
use crate::types::{Platform, StepKind};

/// A freshly built executable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildArtifact {
    pub output: PathBuf,
    /// blake3 hex digest of the executable.
    pub digest: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuildOutcome {
    /// Rebuild flag was clear; nothing was compiled.
    Skipped,
    Built(BuildArtifact),
}

/// Compiles the container when the rebuild flag asks for it.
pub struct Builder<C: Compiler> {
    compiler: C,
    fs: Arc<dyn FileSystem>,
    host: Platform,
    timeout: Duration,
}

impl<C: Compiler> Builder<C> {
    pub fn new(compiler: C, fs: Arc<dyn FileSystem>, timeout: Duration) -> Self {
        Self::with_host(compiler, fs, timeout, Platform::host())
    }

    /// Construct with an explicit host platform instead of the running OS.
    pub fn with_host(
        compiler: C,
        fs: Arc<dyn FileSystem>,
        timeout: Duration,
        host: Platform,
    ) -> Self {
        Self {
            compiler,
            fs,
            host,
            timeout,
        }
    }

    /// Whether the descriptor's output is already on disk.
    pub fn artifact_exists(&self, descriptor: &BuildDescriptor) -> bool {
        self.fs.is_file(&descriptor.output)
    }

    /// Build `descriptor` if `rebuild` is set.
    ///
    /// The flag is cleared only after a successful build; any failure leaves
    /// it set so the obligation carries over to a later cycle.
    pub async fn build_if_needed(
        &mut self,
        descriptor: &BuildDescriptor,
        rebuild: &mut RebuildFlag,
    ) -> Result<BuildOutcome> {
        if !rebuild.is_pending() {
            debug!(output = ?descriptor.output, "rebuild flag clear; skipping build");
            return Ok(BuildOutcome::Skipped);
        }

        if self.host != descriptor.target_platform {
            warn!(
                host = %self.host,
                target = %descriptor.target_platform,
                "refusing to build for a different platform"
            );
            return Err(RespawnerError::UnsupportedPlatform {
                host: self.host.to_string(),
                target: descriptor.target_platform.to_string(),
            });
        }

        info!(
            entry = ?descriptor.entry_point,
            output = ?descriptor.output,
            "rebuilding container"
        );

        let compiler = &mut self.compiler;
        bounded(StepKind::Build, self.timeout, async {
            compiler
                .compile(&descriptor.entry_point, &descriptor.output)
                .await
                .map_err(|e| RespawnerError::Build(format!("{e:#}")))
        })
        .await?;

        if !self.fs.is_file(&descriptor.output) {
            return Err(RespawnerError::Build(format!(
                "compiler reported success but {:?} was not produced",
                descriptor.output
            )));
        }

        let digest = artifact_digest(self.fs.as_ref(), &descriptor.output)
            .map_err(|e| RespawnerError::Build(format!("{e:#}")))?;

        rebuild.clear();
        info!(output = ?descriptor.output, %digest, "build success");

        Ok(BuildOutcome::Built(BuildArtifact {
            output: descriptor.output.clone(),
            digest,
        }))
    }
}

/// blake3 digest of a built executable.
pub fn artifact_digest(fs: &dyn FileSystem, path: &Path) -> anyhow::Result<String> {
    let mut hasher = Hasher::new();
    let mut reader = fs
        .open_read(path)
        .with_context(|| format!("opening artifact for hashing: {:?}", path))?;
    let mut buf = [0u8; 8192];
    loop {
        let n = reader.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hasher.finalize().to_hex().to_string())
}
