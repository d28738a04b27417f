// src/repo/summary.rs

use std::sync::LazyLock;

use regex::Regex;

static DIFFSTAT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(\d+) files? changed(?:, (\d+) insertions?\(\+\))?(?:, (\d+) deletions?\(-\))?",
    )
    .expect("diffstat pattern is a valid regex")
});

/// Totals from the `N files changed, X insertions(+), Y deletions(-)` line
/// git prints after a pull with `--stat`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DiffStat {
    pub files_changed: u64,
    pub insertions: u64,
    pub deletions: u64,
}

impl DiffStat {
    /// Parse the last diffstat line found in `output`. Missing counts are 0.
    pub fn parse(output: &str) -> Option<Self> {
        let caps = DIFFSTAT.captures_iter(output).last()?;
        let count = |i: usize| {
            caps.get(i)
                .and_then(|m| m.as_str().parse::<u64>().ok())
                .unwrap_or(0)
        };
        Some(DiffStat {
            files_changed: count(1),
            insertions: count(2),
            deletions: count(3),
        })
    }
}

/// Result of pulling the configured remote/branch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PullSummary {
    /// Revision of `HEAD` before the pull.
    pub before: String,
    /// Revision of `HEAD` after the pull.
    pub after: String,
    pub stat: DiffStat,
}

impl PullSummary {
    pub fn unchanged(revision: impl Into<String>) -> Self {
        let revision = revision.into();
        Self {
            before: revision.clone(),
            after: revision,
            stat: DiffStat::default(),
        }
    }

    /// True when the pull moved `HEAD`.
    pub fn changed(&self) -> bool {
        self.before != self.after
    }
}
