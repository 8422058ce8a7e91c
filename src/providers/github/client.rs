use async_trait::async_trait;
use log::{debug, info, warn};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, USER_AGENT};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use std::time::Duration;
use url::Url;

use crate::auth::Token;
use crate::error::{HeraldError, Result, Service};
use crate::release::{Commit, RepositoryGateway};

use super::types::{
    AnnotatedTag, CompareResponse, CreateRefRequest, GitHubCommit, GitObject, GitRef,
    UpdateRefRequest,
};

/// Response bodies that identify a 403 as a credential problem rather than a policy one.
const AUTH_FAILURE_HINTS: [&str; 4] = [
    "bad credentials",
    "expired",
    "requires authentication",
    "resource not accessible by personal access token",
];

/// GitHub `per_page` upper bound.
const MAX_PAGE_SIZE: usize = 100;

/// Annotated tags may point at other annotated tags; stop following after this many hops.
const MAX_TAG_DEPTH: usize = 5;

/// Stop paging through tag refs after this many pages.
const MAX_TAG_PAGES: usize = 20;

/// GitHub REST client scoped to a single repository.
#[derive(Clone)]
pub struct GitHubClient {
    /// HTTP client
    client: Client,
    /// Base URL for GitHub API
    api_url: Url,
    /// Repository owner
    owner: String,
    /// Repository name
    repo: String,
    token: Option<Token>,
}

/// Error response captured before it is classified.
struct FailedResponse {
    status: u16,
    rate_exhausted: bool,
    body: String,
}

enum RefWrite {
    Done,
    Missing,
    AlreadyExists,
}

impl GitHubClient {
    /// Create a new GitHub API client.
    ///
    /// # Arguments
    ///
    /// * `base_url` - GitHub API base URL (e.g., "https://api.github.com")
    /// * `owner` - Repository owner/organization
    /// * `repo` - Repository name
    /// * `token` - Optional GitHub personal access token; required for moving tags
    /// * `timeout` - Upper bound for every request
    ///
    /// # Errors
    ///
    /// Returns an error if the base URL is invalid or the HTTP client cannot be built.
    pub fn new(
        base_url: &str,
        owner: String,
        repo: String,
        token: Option<Token>,
        timeout: Duration,
    ) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_static("release-herald/0.3"));
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("application/vnd.github+json"),
        );
        headers.insert(
            "x-github-api-version",
            HeaderValue::from_static("2022-11-28"),
        );

        let client = Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()
            .map_err(|e| HeraldError::Config(format!("Failed to create HTTP client: {e}")))?;

        let api_url = Url::parse(base_url)
            .map_err(|e| HeraldError::Config(format!("Invalid GitHub API base URL: {e}")))?;

        if api_url.cannot_be_a_base() {
            return Err(HeraldError::Config(format!(
                "Invalid GitHub API base URL: {base_url}"
            )));
        }

        Ok(Self {
            client,
            api_url,
            owner,
            repo,
            token,
        })
    }

    pub fn repository(&self) -> String {
        format!("{}/{}", self.owner, self.repo)
    }

    fn auth_request(&self, request: RequestBuilder) -> RequestBuilder {
        if let Some(token) = &self.token {
            request.bearer_auth(token.as_str())
        } else {
            request
        }
    }

    /// Build `{api}/repos/{owner}/{repo}/{segments...}`.
    fn repo_url<'a, I>(&self, segments: I) -> Result<Url>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut url = self.api_url.clone();
        url.path_segments_mut()
            .map_err(|()| {
                HeraldError::Config(format!("Invalid GitHub API base URL: {}", self.api_url))
            })?
            .pop_if_empty()
            .extend(["repos", self.owner.as_str(), self.repo.as_str()])
            .extend(segments);
        Ok(url)
    }

    async fn capture_failure(response: Response) -> FailedResponse {
        let status = response.status().as_u16();
        let rate_exhausted = response
            .headers()
            .get("x-ratelimit-remaining")
            .and_then(|value| value.to_str().ok())
            == Some("0");
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "Unable to read error response".to_string());

        FailedResponse {
            status,
            rate_exhausted,
            body,
        }
    }

    async fn resolve_ref(&self, tag_name: &str) -> Result<GitRef> {
        let url = self.repo_url(["git", "ref", "tags"].into_iter().chain(tag_name.split('/')))?;
        debug!("Resolving tag {tag_name} via {url}");

        let response = self.auth_request(self.client.get(url)).send().await?;

        match response.status() {
            StatusCode::OK => Ok(response.json().await?),
            StatusCode::NOT_FOUND => Err(HeraldError::NotFound(format!("tag {tag_name}"))),
            _ => Err(classify_failure(
                "resolve_tag_commit",
                Self::capture_failure(response).await,
            )),
        }
    }

    async fn dereference_annotated_tag(&self, tag_sha: &str) -> Result<AnnotatedTag> {
        let url = self.repo_url(["git", "tags", tag_sha])?;
        let response = self.auth_request(self.client.get(url)).send().await?;

        if response.status().is_success() {
            return Ok(response.json().await?);
        }

        Err(classify_failure(
            "resolve_tag_commit:annotated_tag",
            Self::capture_failure(response).await,
        ))
    }

    /// Follow annotated tag objects until reaching the commit they point at.
    async fn peel_to_commit(&self, tag_name: &str, mut object: GitObject) -> Result<String> {
        for _ in 0..MAX_TAG_DEPTH {
            if object.kind != "tag" {
                return Ok(object.sha);
            }
            debug!("Tag {tag_name} is annotated, dereferencing {}", object.sha);
            object = self.dereference_annotated_tag(&object.sha).await?.object;
        }

        Err(HeraldError::Api {
            status: 200,
            message: format!("Tag {tag_name} is nested deeper than {MAX_TAG_DEPTH} levels"),
        })
    }

    async fn fetch_tag_refs(&self) -> Result<Vec<GitRef>> {
        let mut all_refs = Vec::new();
        let mut page = 1;

        loop {
            let mut url = self.repo_url(["git", "matching-refs", "tags"])?;
            url.query_pairs_mut()
                .append_pair("per_page", &MAX_PAGE_SIZE.to_string())
                .append_pair("page", &page.to_string());

            let response = self.auth_request(self.client.get(url)).send().await?;
            if !response.status().is_success() {
                return Err(classify_failure(
                    "list_tags_at_commit",
                    Self::capture_failure(response).await,
                ));
            }

            let refs: Vec<GitRef> = response.json().await?;
            let response_len = refs.len();
            all_refs.extend(refs);

            if response_len < MAX_PAGE_SIZE {
                break;
            }
            if page >= MAX_TAG_PAGES {
                warn!(
                    "Stopped listing tags after {} refs; labels may be incomplete",
                    all_refs.len()
                );
                break;
            }
            page += 1;
        }

        Ok(all_refs)
    }

    async fn update_ref(&self, tag_name: &str, commit_sha: &str) -> Result<RefWrite> {
        let url = self.repo_url(["git", "refs", "tags"].into_iter().chain(tag_name.split('/')))?;
        let body = UpdateRefRequest {
            sha: commit_sha,
            force: true,
        };

        let response = self
            .auth_request(self.client.patch(url).json(&body))
            .send()
            .await?;

        if response.status().is_success() {
            return Ok(RefWrite::Done);
        }

        let failure = Self::capture_failure(response).await;
        if failure.status == 404
            || (failure.status == 422 && failure.body.to_lowercase().contains("does not exist"))
        {
            return Ok(RefWrite::Missing);
        }

        Err(classify_failure("upsert_tag:update", failure))
    }

    async fn create_ref(&self, tag_name: &str, commit_sha: &str) -> Result<RefWrite> {
        let url = self.repo_url(["git", "refs"])?;
        let body = CreateRefRequest {
            ref_: format!("refs/tags/{tag_name}"),
            sha: commit_sha,
        };

        let response = self
            .auth_request(self.client.post(url).json(&body))
            .send()
            .await?;

        if response.status().is_success() {
            return Ok(RefWrite::Done);
        }

        let failure = Self::capture_failure(response).await;
        if failure.status == 422 && failure.body.to_lowercase().contains("already exists") {
            return Ok(RefWrite::AlreadyExists);
        }

        Err(classify_failure("upsert_tag:create", failure))
    }
}

#[async_trait]
impl RepositoryGateway for GitHubClient {
    async fn resolve_tag_commit(&self, tag_name: &str) -> Result<String> {
        let git_ref = self.resolve_ref(tag_name).await?;
        self.peel_to_commit(tag_name, git_ref.object).await
    }

    async fn list_commits_between(&self, base_sha: &str, head_sha: &str) -> Result<Vec<Commit>> {
        let range = format!("{base_sha}...{head_sha}");
        let url = self.repo_url(["compare", range.as_str()])?;

        let response = self.auth_request(self.client.get(url)).send().await?;
        let status = response.status();

        if status == StatusCode::NOT_FOUND || status == StatusCode::UNPROCESSABLE_ENTITY {
            return Err(range_unavailable(base_sha, head_sha));
        }
        if !status.is_success() {
            return Err(classify_failure(
                "list_commits_between",
                Self::capture_failure(response).await,
            ));
        }

        let compare: CompareResponse = response.json().await?;
        // Only "ahead" and "identical" mean base is an ancestor of head.
        if !matches!(compare.status.as_str(), "ahead" | "identical") {
            warn!(
                "{base_sha} is not an ancestor of {head_sha} ({})",
                compare.status
            );
            return Err(range_unavailable(base_sha, head_sha));
        }

        Ok(compare.commits.into_iter().map(Commit::from).collect())
    }

    async fn list_recent_commits(&self, head_sha: &str, limit: usize) -> Result<Vec<Commit>> {
        let per_page = limit.clamp(1, MAX_PAGE_SIZE);
        let mut url = self.repo_url(["commits"])?;
        url.query_pairs_mut()
            .append_pair("sha", head_sha)
            .append_pair("per_page", &per_page.to_string());

        let response = self.auth_request(self.client.get(url)).send().await?;
        let status = response.status();

        if status == StatusCode::NOT_FOUND || status == StatusCode::UNPROCESSABLE_ENTITY {
            return Err(HeraldError::NotFound(format!("commit {head_sha}")));
        }
        if !status.is_success() {
            return Err(classify_failure(
                "list_recent_commits",
                Self::capture_failure(response).await,
            ));
        }

        let commits: Vec<GitHubCommit> = response.json().await?;

        // GitHub lists newest first
        let mut commits: Vec<Commit> = commits
            .into_iter()
            .take(limit)
            .map(Commit::from)
            .collect();
        commits.reverse();

        Ok(commits)
    }

    async fn list_tags_at_commit(&self, commit_sha: &str) -> Result<Vec<String>> {
        let mut tags = Vec::new();

        for git_ref in self.fetch_tag_refs().await? {
            let Some(tag_name) = git_ref.ref_.strip_prefix("refs/tags/") else {
                continue;
            };

            if self.peel_to_commit(tag_name, git_ref.object).await? == commit_sha {
                tags.push(tag_name.to_string());
            }
        }

        Ok(tags)
    }

    async fn upsert_tag(&self, tag_name: &str, commit_sha: &str) -> Result<()> {
        if self.token.is_none() {
            return Err(HeraldError::MissingCredentials {
                operation: "upsert_tag".to_string(),
            });
        }

        let written = match self.update_ref(tag_name, commit_sha).await? {
            RefWrite::Missing => match self.create_ref(tag_name, commit_sha).await? {
                // Someone created it between our two calls; move it instead.
                RefWrite::AlreadyExists => self.update_ref(tag_name, commit_sha).await?,
                other => other,
            },
            other => other,
        };

        match written {
            RefWrite::Done => {
                info!(
                    "Tag {tag_name} now points at {commit_sha} in {}",
                    self.repository()
                );
                Ok(())
            }
            RefWrite::Missing | RefWrite::AlreadyExists => Err(HeraldError::Api {
                status: 422,
                message: format!("Tag {tag_name} could not be created or updated"),
            }),
        }
    }
}

fn range_unavailable(base: &str, head: &str) -> HeraldError {
    HeraldError::RangeUnavailable {
        base: base.to_string(),
        head: head.to_string(),
    }
}

/// Whether a failed response means the credential is invalid, expired or under-scoped.
pub fn is_auth_failure(status: u16, body: &str) -> bool {
    match status {
        401 => true,
        403 => {
            let body = body.to_lowercase();
            AUTH_FAILURE_HINTS.iter().any(|hint| body.contains(hint))
        }
        _ => false,
    }
}

fn classify_failure(operation: &str, failure: FailedResponse) -> HeraldError {
    let FailedResponse {
        status,
        rate_exhausted,
        body,
    } = failure;

    if is_auth_failure(status, &body) {
        return HeraldError::Auth {
            service: Service::GitHub,
            operation: operation.to_string(),
            status,
            message: body,
        };
    }

    if status == 429
        || (status == 403 && (rate_exhausted || body.to_lowercase().contains("rate limit")))
    {
        return HeraldError::RateLimited {
            operation: operation.to_string(),
        };
    }

    HeraldError::Api {
        status,
        message: body,
    }
}
