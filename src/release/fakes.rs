//! In-memory fakes for the release workflow's remote collaborators (testing only).

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::Notify;

use crate::error::{HeraldError, Result, Service};

use super::{AlertSink, Commit, Publisher, RepositoryGateway};

pub fn commit(index: usize) -> Commit {
    Commit {
        sha: format!("{index:040x}"),
        message: format!("feat: change number {index}\n\nDetails for {index}"),
        author: Some("dev".to_string()),
        authored_at: None,
    }
}

pub fn github_auth_error() -> HeraldError {
    HeraldError::Auth {
        service: Service::GitHub,
        operation: "resolve_tag_commit".to_string(),
        status: 401,
        message: "Bad credentials".to_string(),
    }
}

pub fn network_error() -> HeraldError {
    HeraldError::Api {
        status: 502,
        message: "Bad Gateway".to_string(),
    }
}

#[derive(Default)]
struct RepoState {
    /// Linear history, oldest first
    history: Vec<Commit>,
    tags: HashMap<String, String>,
    failures: HashMap<&'static str, fn() -> HeraldError>,
    calls: Vec<String>,
}

/// Repository with a single linear history and a tag table.
#[derive(Default)]
pub struct FakeRepository {
    state: Mutex<RepoState>,
}

impl FakeRepository {
    /// Repository with commits `1..=count`.
    pub fn with_history(count: usize) -> Self {
        let repo = Self::default();
        repo.state.lock().unwrap().history = (1..=count).map(commit).collect();
        repo
    }

    pub fn sha(&self, index: usize) -> String {
        commit(index).sha
    }

    pub fn tag(&self, name: &str, sha: &str) -> &Self {
        self.state
            .lock()
            .unwrap()
            .tags
            .insert(name.to_string(), sha.to_string());
        self
    }

    pub fn tag_target(&self, name: &str) -> Option<String> {
        self.state.lock().unwrap().tags.get(name).cloned()
    }

    /// Make every call to `operation` fail with the error `make` builds.
    pub fn fail(&self, operation: &'static str, make: fn() -> HeraldError) -> &Self {
        self.state.lock().unwrap().failures.insert(operation, make);
        self
    }

    pub fn recover(&self, operation: &'static str) {
        self.state.lock().unwrap().failures.remove(operation);
    }

    pub fn calls(&self) -> Vec<String> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn count_calls(&self, operation: &str) -> usize {
        self.calls()
            .iter()
            .filter(|call| call.split(':').next() == Some(operation))
            .count()
    }

    fn enter(&self, operation: &'static str, detail: &str) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(format!("{operation}:{detail}"));
        match state.failures.get(operation) {
            Some(make) => Err(make()),
            None => Ok(()),
        }
    }

    fn position(state: &RepoState, sha: &str) -> Option<usize> {
        state.history.iter().position(|c| c.sha == sha)
    }
}

#[async_trait]
impl RepositoryGateway for FakeRepository {
    async fn resolve_tag_commit(&self, tag_name: &str) -> Result<String> {
        self.enter("resolve_tag_commit", tag_name)?;
        self.tag_target(tag_name)
            .ok_or_else(|| HeraldError::NotFound(format!("tag {tag_name}")))
    }

    async fn list_commits_between(&self, base_sha: &str, head_sha: &str) -> Result<Vec<Commit>> {
        self.enter("list_commits_between", &format!("{base_sha}...{head_sha}"))?;
        let state = self.state.lock().unwrap();
        match (
            Self::position(&state, base_sha),
            Self::position(&state, head_sha),
        ) {
            (Some(base), Some(head)) if base <= head => Ok(state.history[base + 1..=head].to_vec()),
            _ => Err(HeraldError::RangeUnavailable {
                base: base_sha.to_string(),
                head: head_sha.to_string(),
            }),
        }
    }

    async fn list_recent_commits(&self, head_sha: &str, limit: usize) -> Result<Vec<Commit>> {
        self.enter("list_recent_commits", head_sha)?;
        let state = self.state.lock().unwrap();
        let head = Self::position(&state, head_sha)
            .ok_or_else(|| HeraldError::NotFound(format!("commit {head_sha}")))?;
        let start = (head + 1).saturating_sub(limit);
        Ok(state.history[start..=head].to_vec())
    }

    async fn list_tags_at_commit(&self, commit_sha: &str) -> Result<Vec<String>> {
        self.enter("list_tags_at_commit", commit_sha)?;
        let state = self.state.lock().unwrap();
        let mut names: Vec<String> = state
            .tags
            .iter()
            .filter(|(_, sha)| sha.as_str() == commit_sha)
            .map(|(name, _)| name.clone())
            .collect();
        names.sort();
        Ok(names)
    }

    async fn upsert_tag(&self, tag_name: &str, commit_sha: &str) -> Result<()> {
        self.enter("upsert_tag", tag_name)?;
        self.tag(tag_name, commit_sha);
        Ok(())
    }
}

/// Publisher that records every note it is given.
#[derive(Default)]
pub struct FakePublisher {
    published: Mutex<Vec<String>>,
    failure: Mutex<Option<fn() -> HeraldError>>,
    gate: Option<(Arc<Notify>, Arc<Notify>)>,
}

impl FakePublisher {
    pub fn new() -> Self {
        Self::default()
    }

    /// A publisher that signals `entered` and then waits for `release` before returning.
    pub fn gated() -> (Self, Arc<Notify>, Arc<Notify>) {
        let entered = Arc::new(Notify::new());
        let release = Arc::new(Notify::new());
        let publisher = Self {
            gate: Some((entered.clone(), release.clone())),
            ..Self::default()
        };
        (publisher, entered, release)
    }

    pub fn fail_with(&self, make: fn() -> HeraldError) {
        *self.failure.lock().unwrap() = Some(make);
    }

    pub fn published(&self) -> Vec<String> {
        self.published.lock().unwrap().clone()
    }
}

#[async_trait]
impl Publisher for FakePublisher {
    async fn publish(&self, text: &str) -> Result<()> {
        if let Some((entered, release)) = &self.gate {
            entered.notify_one();
            release.notified().await;
        }
        if let Some(make) = *self.failure.lock().unwrap() {
            return Err(make());
        }
        self.published.lock().unwrap().push(text.to_string());
        Ok(())
    }
}

/// Alert sink that records private messages.
#[derive(Default)]
pub struct FakeAlertSink {
    messages: Mutex<Vec<(u64, String)>>,
    failing: bool,
}

impl FakeAlertSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            failing: true,
            ..Self::default()
        }
    }

    pub fn messages(&self) -> Vec<(u64, String)> {
        self.messages.lock().unwrap().clone()
    }
}

#[async_trait]
impl AlertSink for FakeAlertSink {
    async fn send_private_message(&self, user_id: u64, message: &str) -> Result<()> {
        if self.failing {
            return Err(HeraldError::Delivery("bot offline".to_string()));
        }
        self.messages
            .lock()
            .unwrap()
            .push((user_id, message.to_string()));
        Ok(())
    }
}
