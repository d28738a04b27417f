// src/repo/gateway.rs

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use crate::engine::RebuildFlag;
use crate::errors::{Result, RespawnerError};
use crate::fs::FileSystem;
use crate::repo::vcs::VcsClient;
use crate::repo::{PullSummary, RepositoryDescriptor};
use crate::timeouts::bounded;
use crate::types::StepKind;

/// Result of [`RepositoryGateway::ensure_cloned`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnsureOutcome {
    /// True when the clone was created by this call.
    pub cloned: bool,
}

/// Keeps the local clone present and current.
pub struct RepositoryGateway<V: VcsClient> {
    descriptor: RepositoryDescriptor,
    vcs: V,
    fs: Arc<dyn FileSystem>,
    timeout: Duration,
}

impl<V: VcsClient> RepositoryGateway<V> {
    pub fn new(
        descriptor: RepositoryDescriptor,
        vcs: V,
        fs: Arc<dyn FileSystem>,
        timeout: Duration,
    ) -> Self {
        Self {
            descriptor,
            vcs,
            fs,
            timeout,
        }
    }

    /// Clone the repository if the local path is missing.
    ///
    /// A fresh clone sets `rebuild`: whatever executable is on disk was not
    /// built from this checkout.
    pub async fn ensure_cloned(&mut self, rebuild: &mut RebuildFlag) -> Result<EnsureOutcome> {
        let path = self.descriptor.local_path.clone();
        info!(path = ?path, "checking repository");

        if self.fs.exists(&path) {
            if !self.fs.is_dir(&path) {
                return Err(RespawnerError::Repo(format!(
                    "{:?} exists but is not a directory",
                    path
                )));
            }
            info!(path = ?path, "repository already exists");
            return Ok(EnsureOutcome { cloned: false });
        }

        info!(
            path = ?path,
            remote_url = %self.descriptor.remote_url,
            "repository does not exist; cloning"
        );

        let remote_url = self.descriptor.remote_url.clone();
        let vcs = &mut self.vcs;
        let cloned = bounded(StepKind::Repository, self.timeout, async {
            vcs.clone_repo(&remote_url, &path)
                .await
                .map_err(|e| RespawnerError::Repo(format!("{e:#}")))
        })
        .await;

        if let Err(err) = cloned {
            self.discard_partial_clone(&path);
            return Err(err);
        }

        info!(path = ?path, "clone done");
        rebuild.set();

        Ok(EnsureOutcome { cloned: true })
    }

    /// A killed or failed clone can leave a half-written directory behind,
    /// which the next attempt would otherwise take for a checkout.
    fn discard_partial_clone(&self, path: &Path) {
        if !self.fs.is_dir(path) {
            return;
        }
        match self.fs.remove_dir_all(path) {
            Ok(()) => warn!(path = ?path, "removed partial clone"),
            Err(e) => warn!(path = ?path, error = %e, "failed to remove partial clone"),
        }
    }

    /// Pull the configured remote/branch and report whether `HEAD` moved.
    pub async fn check_for_updates(&mut self) -> Result<PullSummary> {
        let RepositoryDescriptor {
            local_path,
            remote,
            branch,
            ..
        } = self.descriptor.clone();

        if !self.fs.is_dir(&local_path) {
            warn!(path = ?local_path, "repository clone disappeared");
            return Err(RespawnerError::Repo(format!(
                "repository clone {:?} is missing",
                local_path
            )));
        }

        info!(%remote, %branch, "starting pull");

        let vcs = &mut self.vcs;
        let summary = bounded(StepKind::Repository, self.timeout, async {
            vcs.pull(&local_path, &remote, &branch)
                .await
                .map_err(|e| RespawnerError::Repo(format!("{e:#}")))
        })
        .await?;

        if summary.changed() {
            info!(
                %remote,
                %branch,
                before = %summary.before,
                after = %summary.after,
                files_changed = summary.stat.files_changed,
                insertions = summary.stat.insertions,
                deletions = summary.stat.deletions,
                "got new updates"
            );
        } else {
            info!(%remote, %branch, revision = %summary.after, "already up to date");
        }

        Ok(summary)
    }
}
