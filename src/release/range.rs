use log::{debug, info, warn};

use crate::error::{HeraldError, Result};

use super::version::looks_like_commit_sha;
use super::{Commit, RepositoryGateway};

/// Commits that make up one release.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleaseRange {
    /// Commit the current version resolves to
    pub current_sha: String,
    /// Commits in the release, oldest first. Empty means nothing new was deployed.
    pub commits: Vec<Commit>,
    /// True when the range came from the recent-commit listing instead of a marker diff
    pub bootstrap: bool,
}

/// Decides which commits a release consists of.
pub struct CommitRangeResolver<'a> {
    gateway: &'a dyn RepositoryGateway,
    bootstrap_limit: usize,
}

impl<'a> CommitRangeResolver<'a> {
    pub fn new(gateway: &'a dyn RepositoryGateway, bootstrap_limit: usize) -> Self {
        Self {
            gateway,
            bootstrap_limit,
        }
    }

    /// Resolve a version identifier to a commit sha.
    ///
    /// Versions are looked up as tags first. A version with no matching tag is
    /// accepted as-is when it has the shape of a commit sha.
    pub async fn resolve_version(&self, version: &str) -> Result<String> {
        match self.gateway.resolve_tag_commit(version).await {
            Ok(sha) => Ok(sha),
            Err(HeraldError::NotFound(_)) if looks_like_commit_sha(version) => {
                debug!("No tag named {version}, treating it as a commit sha");
                Ok(version.to_string())
            }
            Err(HeraldError::NotFound(_)) => Err(HeraldError::NotFound(format!(
                "commit for version {version}"
            ))),
            Err(e) => Err(e),
        }
    }

    /// Compute the release range for `version` relative to the marker commit.
    ///
    /// * no marker: the most recent `bootstrap_limit` commits
    /// * marker equals current: empty range
    /// * otherwise: commits after the marker, falling back to the recent listing
    ///   when the marker is not an ancestor of the current commit
    pub async fn resolve(&self, version: &str, marker_sha: Option<&str>) -> Result<ReleaseRange> {
        let current_sha = self.resolve_version(version).await?;

        let Some(marker_sha) = marker_sha else {
            info!("No marker tag yet, listing the last {} commits", self.bootstrap_limit);
            return self.bootstrap(current_sha).await;
        };

        if marker_sha == current_sha {
            info!("Marker already at {current_sha}, nothing new to publish");
            return Ok(ReleaseRange {
                current_sha,
                commits: Vec::new(),
                bootstrap: false,
            });
        }

        match self
            .gateway
            .list_commits_between(marker_sha, &current_sha)
            .await
        {
            Ok(commits) => {
                debug!("{} commits between {marker_sha} and {current_sha}", commits.len());
                Ok(ReleaseRange {
                    current_sha,
                    commits,
                    bootstrap: false,
                })
            }
            Err(HeraldError::RangeUnavailable { .. }) => {
                warn!(
                    "Marker {marker_sha} is not reachable from {current_sha}, falling back to recent commits"
                );
                self.bootstrap(current_sha).await
            }
            Err(e) => Err(e),
        }
    }

    async fn bootstrap(&self, current_sha: String) -> Result<ReleaseRange> {
        let commits = self
            .gateway
            .list_recent_commits(&current_sha, self.bootstrap_limit)
            .await?;

        Ok(ReleaseRange {
            current_sha,
            commits,
            bootstrap: true,
        })
    }
}
