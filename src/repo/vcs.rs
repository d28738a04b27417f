// src/repo/vcs.rs

//! Pluggable version-control client.
//!
//! The gateway talks to a `VcsClient` instead of running `git` directly, so
//! tests can script clone/pull results. Production uses [`super::git::GitCli`].

use std::path::Path;

use anyhow::Result;

use crate::repo::PullSummary;
use crate::types::BoxFuture;

pub trait VcsClient: Send {
    /// Clone `remote_url` into `path`. `path` must not exist yet.
    fn clone_repo<'a>(
        &'a mut self,
        remote_url: &'a str,
        path: &'a Path,
    ) -> BoxFuture<'a, Result<()>>;

    /// Pull `branch` from `remote` into the clone at `path`.
    fn pull<'a>(
        &'a mut self,
        path: &'a Path,
        remote: &'a str,
        branch: &'a str,
    ) -> BoxFuture<'a, Result<PullSummary>>;
}
