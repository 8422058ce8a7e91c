use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::release::Commit;

/// A git reference as returned by the `git/ref` and `git/matching-refs` endpoints.
#[derive(Debug, Clone, Deserialize)]
pub struct GitRef {
    /// Fully qualified name (e.g., "refs/tags/v1.0.0")
    #[serde(rename = "ref")]
    pub ref_: String,
    /// Object the reference points at
    pub object: GitObject,
}

/// Object pointed at by a reference or an annotated tag.
#[derive(Debug, Clone, Deserialize)]
pub struct GitObject {
    pub sha: String,
    /// "commit" for lightweight tags, "tag" for annotated tags
    #[serde(rename = "type")]
    pub kind: String,
}

/// An annotated tag object.
#[derive(Debug, Clone, Deserialize)]
pub struct AnnotatedTag {
    pub object: GitObject,
}

/// Commit entry from the `commits` and `compare` endpoints.
#[derive(Debug, Clone, Deserialize)]
pub struct GitHubCommit {
    pub sha: String,
    pub commit: GitHubCommitDetail,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GitHubCommitDetail {
    pub message: String,
    pub author: Option<GitHubSignature>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GitHubSignature {
    pub name: Option<String>,
    pub date: Option<DateTime<Utc>>,
}

/// Response from the `compare/{base}...{head}` endpoint.
#[derive(Debug, Deserialize)]
pub struct CompareResponse {
    /// "ahead", "behind", "identical" or "diverged"
    pub status: String,
    #[serde(default)]
    pub commits: Vec<GitHubCommit>,
}

/// Body for moving an existing reference.
#[derive(Debug, Serialize)]
pub struct UpdateRefRequest<'a> {
    pub sha: &'a str,
    pub force: bool,
}

/// Body for creating a new reference.
#[derive(Debug, Serialize)]
pub struct CreateRefRequest<'a> {
    #[serde(rename = "ref")]
    pub ref_: String,
    pub sha: &'a str,
}

impl From<GitHubCommit> for Commit {
    fn from(commit: GitHubCommit) -> Self {
        let (author, authored_at) = commit
            .commit
            .author
            .map(|author| (author.name, author.date))
            .unwrap_or_default();

        Commit {
            sha: commit.sha,
            message: commit.commit.message,
            author,
            authored_at,
        }
    }
}
