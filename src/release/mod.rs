//! Release-note workflow: detect a new deployment, summarize its commits,
//! publish the summary and advance the last-deployed marker tag.

mod alert;
mod format;
mod range;
mod version;
mod workflow;

#[cfg(test)]
pub(crate) mod fakes;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;

pub use alert::{AlertDeduplicator, AlertDisposition, AlertSink};
pub use version::VersionSource;
pub use workflow::{ReleaseCheck, ReleaseSettings, RunResult, RunStage};

/// A commit as consumed by the release workflow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Commit {
    pub sha: String,
    /// Full commit message; only the first line is shown in release notes
    pub message: String,
    pub author: Option<String>,
    pub authored_at: Option<DateTime<Utc>>,
}

impl Commit {
    /// First line of the commit message.
    pub fn summary(&self) -> &str {
        self.message.lines().next().unwrap_or("").trim()
    }
}

/// Typed view of the source-control host.
///
/// Every call is a live remote request; implementations must not cache.
#[async_trait]
pub trait RepositoryGateway: Send + Sync {
    /// Commit a tag points at. `HeraldError::NotFound` when the tag does not exist.
    async fn resolve_tag_commit(&self, tag_name: &str) -> Result<String>;

    /// Commits after `base_sha` up to and including `head_sha`, oldest first.
    ///
    /// `HeraldError::RangeUnavailable` when either commit is unknown or `base_sha`
    /// is not an ancestor of `head_sha`.
    async fn list_commits_between(&self, base_sha: &str, head_sha: &str) -> Result<Vec<Commit>>;

    /// At most `limit` most recent commits reachable from `head_sha`, oldest first.
    async fn list_recent_commits(&self, head_sha: &str, limit: usize) -> Result<Vec<Commit>>;

    /// Names of tags pointing directly at `commit_sha`.
    async fn list_tags_at_commit(&self, commit_sha: &str) -> Result<Vec<String>>;

    /// Point `tag_name` at `commit_sha`, creating the tag if needed. Idempotent.
    async fn upsert_tag(&self, tag_name: &str, commit_sha: &str) -> Result<()>;
}

/// Delivers a rendered release note to its audience. One attempt, no retries.
#[async_trait]
pub trait Publisher: Send + Sync {
    async fn publish(&self, text: &str) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_commit_summary_uses_first_line() {
        let commit = Commit {
            sha: "abc".to_string(),
            message: "  feat: add thing  \n\nLonger body".to_string(),
            author: None,
            authored_at: None,
        };
        assert_eq!(commit.summary(), "feat: add thing");
    }

    #[test]
    fn test_commit_summary_of_empty_message() {
        let commit = Commit {
            sha: "abc".to_string(),
            message: String::new(),
            author: None,
            authored_at: None,
        };
        assert_eq!(commit.summary(), "");
    }
}
