// src/repo/git.rs

use std::ffi::OsStr;
use std::path::Path;
use std::process::Stdio;

use anyhow::{bail, Context, Result};
use tokio::process::Command;
use tracing::debug;

use crate::repo::vcs::VcsClient;
use crate::repo::{DiffStat, PullSummary};
use crate::types::BoxFuture;

/// `VcsClient` backed by the `git` command line.
///
/// Every invocation runs with `GIT_TERMINAL_PROMPT=0` so a remote asking for
/// credentials fails instead of blocking on a prompt.
#[derive(Debug, Clone)]
pub struct GitCli {
    program: String,
}

impl GitCli {
    pub fn new() -> Self {
        Self {
            program: "git".to_string(),
        }
    }

    async fn git<I, S>(&self, args: I) -> Result<String>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        let mut cmd = Command::new(&self.program);
        cmd.args(args)
            .env("GIT_TERMINAL_PROMPT", "0")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        debug!(?cmd, "running git");

        let output = cmd
            .output()
            .await
            .with_context(|| format!("spawning '{}'", self.program))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            bail!("git exited with {}: {}", output.status, stderr.trim());
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    async fn head(&self, path: &Path) -> Result<String> {
        let out = self
            .git([OsStr::new("-C"), path.as_os_str(), OsStr::new("rev-parse"), OsStr::new("HEAD")])
            .await
            .with_context(|| format!("resolving HEAD in {:?}", path))?;
        Ok(out.trim().to_string())
    }
}

impl Default for GitCli {
    fn default() -> Self {
        Self::new()
    }
}

impl VcsClient for GitCli {
    fn clone_repo<'a>(
        &'a mut self,
        remote_url: &'a str,
        path: &'a Path,
    ) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            self.git([OsStr::new("clone"), OsStr::new(remote_url), path.as_os_str()])
                .await
                .with_context(|| format!("cloning {remote_url} into {:?}", path))?;
            Ok(())
        })
    }

    fn pull<'a>(
        &'a mut self,
        path: &'a Path,
        remote: &'a str,
        branch: &'a str,
    ) -> BoxFuture<'a, Result<PullSummary>> {
        Box::pin(async move {
            let before = self.head(path).await?;

            let output = self
                .git([
                    OsStr::new("-C"),
                    path.as_os_str(),
                    OsStr::new("pull"),
                    OsStr::new("--stat"),
                    OsStr::new(remote),
                    OsStr::new(branch),
                ])
                .await
                .with_context(|| format!("pulling {remote}/{branch} in {:?}", path))?;

            let after = self.head(path).await?;
            let stat = DiffStat::parse(&output).unwrap_or_default();

            Ok(PullSummary {
                before,
                after,
                stat,
            })
        })
    }
}
