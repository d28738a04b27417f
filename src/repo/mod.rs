// src/repo/mod.rs

//! Repository synchronisation.
//!
//! - [`gateway`] decides when to clone and when to pull, and owns the
//!   timeouts and error mapping for both.
//! - [`vcs`] is the `VcsClient` trait the gateway drives.
//! - [`git`] implements `VcsClient` on top of the `git` binary.
//! - [`summary`] turns pull output into a `PullSummary`.

use std::path::PathBuf;

pub mod gateway;
pub mod git;
pub mod summary;
pub mod vcs;

pub use gateway::{EnsureOutcome, RepositoryGateway};
pub use git::GitCli;
pub use summary::{DiffStat, PullSummary};
pub use vcs::VcsClient;

/// Where the source lives and which branch to follow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepositoryDescriptor {
    pub remote_url: String,
    pub local_path: PathBuf,
    pub remote: String,
    pub branch: String,
}
