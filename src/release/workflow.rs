use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use log::{debug, error, info, warn};

use crate::config::Config;
use crate::error::{HeraldError, Result};

use super::alert::{AlertDeduplicator, AlertDisposition, FailureClass};
use super::format::{format_release_note, FormatLimits};
use super::range::CommitRangeResolver;
use super::version::VersionSource;
use super::{Publisher, RepositoryGateway};

/// Label used when the previous deployment has no version tag of its own.
const UNKNOWN_PREVIOUS_VERSION: &str = "previous";

/// Step of a release check, used to report where a run stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStage {
    Idle,
    ResolvingMarker,
    ResolvingRange,
    Formatting,
    Publishing,
    AdvancingTag,
}

impl fmt::Display for RunStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "starting",
            Self::ResolvingMarker => "resolving marker tag",
            Self::ResolvingRange => "resolving commit range",
            Self::Formatting => "formatting release note",
            Self::Publishing => "publishing release note",
            Self::AdvancingTag => "advancing marker tag",
        };
        f.write_str(name)
    }
}

/// Terminal state of one release check.
#[derive(Debug)]
pub enum RunResult {
    /// The marker already points at the deployed commit
    NoUpdate { version: String },
    /// A note was published and the marker advanced
    Published {
        from: Option<String>,
        to: String,
        sha: String,
        commit_count: usize,
    },
    /// Another check was already running
    Skipped,
    Failed {
        stage: RunStage,
        error: HeraldError,
        alert: Option<AlertDisposition>,
    },
}

impl RunResult {
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }

    /// One-line description suitable for a chat reply.
    pub fn summary(&self) -> String {
        match self {
            Self::NoUpdate { version } => format!("No update: {version} is already published"),
            Self::Published {
                from,
                to,
                commit_count,
                ..
            } => {
                let commits = match *commit_count {
                    1 => "1 commit".to_string(),
                    n => format!("{n} commits"),
                };
                match from {
                    Some(from) => format!("Published release note {from} → {to} ({commits})"),
                    None => format!("Published release note for {to} ({commits})"),
                }
            }
            Self::Skipped => "Skipped: a release check is already running".to_string(),
            Self::Failed { stage, error, .. } => format!("Failed while {stage}: {error}"),
        }
    }
}

/// Workflow settings that do not change between runs.
#[derive(Debug, Clone)]
pub struct ReleaseSettings {
    pub marker_tag: String,
    pub bootstrap_limit: usize,
    pub limits: FormatLimits,
}

impl Default for ReleaseSettings {
    fn default() -> Self {
        Self {
            marker_tag: "last-deployed".to_string(),
            bootstrap_limit: 10,
            limits: FormatLimits::default(),
        }
    }
}

impl ReleaseSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            marker_tag: config.github.marker_tag.clone(),
            bootstrap_limit: config.github.bootstrap_limit,
            limits: FormatLimits {
                max_commits_display: config.release.max_commits_display,
                max_message_length: config.release.max_message_length,
            },
        }
    }
}

struct StageFailure {
    stage: RunStage,
    error: HeraldError,
}

trait AtStage<T> {
    fn at(self, stage: RunStage) -> std::result::Result<T, StageFailure>;
}

impl<T> AtStage<T> for Result<T> {
    fn at(self, stage: RunStage) -> std::result::Result<T, StageFailure> {
        self.map_err(|error| StageFailure { stage, error })
    }
}

/// Clears the in-flight flag when dropped, whichever way the run ends.
struct InFlightGuard<'a>(&'a AtomicBool);

impl<'a> InFlightGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Check-and-publish workflow shared by the startup trigger and the operator command.
///
/// Only one run proceeds at a time; a trigger that arrives while a run is in
/// flight returns [`RunResult::Skipped`] immediately.
pub struct ReleaseCheck {
    gateway: Arc<dyn RepositoryGateway>,
    publisher: Arc<dyn Publisher>,
    alerts: Arc<AlertDeduplicator>,
    version: VersionSource,
    settings: ReleaseSettings,
    in_flight: AtomicBool,
}

impl ReleaseCheck {
    pub fn new(
        gateway: Arc<dyn RepositoryGateway>,
        publisher: Arc<dyn Publisher>,
        alerts: Arc<AlertDeduplicator>,
        version: VersionSource,
        settings: ReleaseSettings,
    ) -> Self {
        Self {
            gateway,
            publisher,
            alerts,
            version,
            settings,
            in_flight: AtomicBool::new(false),
        }
    }

    pub fn is_running(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Run one release check to completion.
    pub async fn run_check(&self) -> RunResult {
        let Some(_guard) = InFlightGuard::acquire(&self.in_flight) else {
            info!("Release check already in progress, skipping this trigger");
            return RunResult::Skipped;
        };

        info!("Starting release note check...");

        match self.execute().await {
            Ok(result) => {
                info!("Release note check completed: {}", result.summary());
                result
            }
            Err(StageFailure { stage, error }) => self.fail(stage, error).await,
        }
    }

    async fn execute(&self) -> std::result::Result<RunResult, StageFailure> {
        let version = self.version.current().at(RunStage::Idle)?.to_string();
        let marker_tag = self.settings.marker_tag.as_str();

        debug!("Resolving marker tag {marker_tag}");
        let marker_sha = match self.gateway.resolve_tag_commit(marker_tag).await {
            Ok(sha) => Some(sha),
            Err(HeraldError::NotFound(_)) => {
                info!("Marker tag {marker_tag} not found, treating this as the first deployment");
                None
            }
            Err(error) => {
                return Err(StageFailure {
                    stage: RunStage::ResolvingMarker,
                    error,
                })
            }
        };

        let resolver = CommitRangeResolver::new(self.gateway.as_ref(), self.settings.bootstrap_limit);
        let range = resolver
            .resolve(&version, marker_sha.as_deref())
            .await
            .at(RunStage::ResolvingRange)?;

        if range.commits.is_empty() {
            info!("No new commits since last deployment");
            return Ok(RunResult::NoUpdate { version });
        }

        let from = match &marker_sha {
            Some(sha) => Some(self.previous_version_label(sha).await.at(RunStage::Formatting)?),
            None => None,
        };

        let text = format_release_note(
            from.as_deref(),
            &version,
            &range.commits,
            &self.settings.limits,
        );
        info!("Generated release note:\n{text}");

        self.publisher
            .publish(&text)
            .await
            .at(RunStage::Publishing)?;
        info!("Release note published");

        self.gateway
            .upsert_tag(marker_tag, &range.current_sha)
            .await
            .at(RunStage::AdvancingTag)?;

        Ok(RunResult::Published {
            from,
            to: version,
            sha: range.current_sha,
            commit_count: range.commits.len(),
        })
    }

    /// Version tag at the previously deployed commit, other than the marker itself.
    async fn previous_version_label(&self, marker_sha: &str) -> Result<String> {
        match self.gateway.list_tags_at_commit(marker_sha).await {
            Ok(tags) => {
                let label = tags
                    .into_iter()
                    .find(|tag| *tag != self.settings.marker_tag)
                    .unwrap_or_else(|| UNKNOWN_PREVIOUS_VERSION.to_string());
                debug!("Previous version label: {label}");
                Ok(label)
            }
            Err(e) if FailureClass::of(&e).is_some() => Err(e),
            Err(e) => {
                warn!("Could not look up tags at {marker_sha}: {e}");
                Ok(UNKNOWN_PREVIOUS_VERSION.to_string())
            }
        }
    }

    async fn fail(&self, stage: RunStage, error: HeraldError) -> RunResult {
        let alert = match FailureClass::of(&error) {
            Some(class) => {
                error!("Release check failed while {stage}: {error}");
                if let HeraldError::Auth { message, .. } = &error {
                    debug!("Auth failure response: {message}");
                }
                Some(self.alerts.notify_if_new(class, &error.to_string()).await)
            }
            None => {
                match &error {
                    HeraldError::RateLimited { .. } | HeraldError::Network(_) => {
                        warn!("Release check failed while {stage}, will retry on next trigger: {error}");
                    }
                    _ => error!("Release check failed while {stage}: {error}"),
                }
                None
            }
        };

        RunResult::Failed {
            stage,
            error,
            alert,
        }
    }
}
