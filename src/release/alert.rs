use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use log::{info, warn};

use crate::error::{HeraldError, Result, Service};

/// Failure kinds that warrant telling an operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureClass {
    /// GitHub rejected the configured token
    GitHubAuth,
    /// No GitHub token configured, so the marker tag cannot move
    GitHubTokenMissing,
    /// The messaging endpoint rejected its access token
    NapCatAuth,
}

impl FailureClass {
    pub fn key(self) -> &'static str {
        match self {
            Self::GitHubAuth => "github-auth-invalid",
            Self::GitHubTokenMissing => "github-token-missing",
            Self::NapCatAuth => "napcat-auth-invalid",
        }
    }

    /// Alertable class of an error, if any. Transient failures have none.
    pub fn of(error: &HeraldError) -> Option<Self> {
        match error {
            HeraldError::Auth {
                service: Service::GitHub,
                ..
            } => Some(Self::GitHubAuth),
            HeraldError::Auth {
                service: Service::NapCat,
                ..
            } => Some(Self::NapCatAuth),
            HeraldError::MissingCredentials { .. } => Some(Self::GitHubTokenMissing),
            _ => None,
        }
    }

    fn remedy(self) -> &'static str {
        match self {
            Self::GitHubAuth => "Check GITHUB_TOKEN and repo tag permissions.",
            Self::GitHubTokenMissing => "Set GITHUB_TOKEN for tag update.",
            Self::NapCatAuth => "Check the NapCat access token.",
        }
    }

    pub fn alert_message(self, detail: &str) -> String {
        format!("[release-note] {detail}. {}", self.remedy())
    }
}

/// Sends a direct message to a single operator.
#[async_trait]
pub trait AlertSink: Send + Sync {
    async fn send_private_message(&self, user_id: u64, message: &str) -> Result<()>;
}

/// What happened to a `notify_if_new` request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertDisposition {
    /// First occurrence; the operator was messaged
    Sent,
    /// This class was already alerted during this process lifetime
    Suppressed,
    /// First occurrence, but no operator is configured or delivery failed
    Undelivered,
}

/// Sends at most one operator alert per failure class per process lifetime.
///
/// The class is marked before delivery is attempted, so a failed delivery
/// still uses up the class's alert.
pub struct AlertDeduplicator {
    sink: Arc<dyn AlertSink>,
    operator: Option<u64>,
    alerted: Mutex<HashSet<FailureClass>>,
}

impl AlertDeduplicator {
    pub fn new(sink: Arc<dyn AlertSink>, operator: Option<u64>) -> Self {
        Self {
            sink,
            operator,
            alerted: Mutex::new(HashSet::new()),
        }
    }

    pub fn has_alerted(&self, class: FailureClass) -> bool {
        self.alerted
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(&class)
    }

    pub async fn notify_if_new(&self, class: FailureClass, detail: &str) -> AlertDisposition {
        let first = self
            .alerted
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(class);

        if !first {
            info!("Alert {} already sent, suppressing", class.key());
            return AlertDisposition::Suppressed;
        }

        let Some(operator) = self.operator else {
            warn!("No operator configured, dropping alert {}", class.key());
            return AlertDisposition::Undelivered;
        };

        match self
            .sink
            .send_private_message(operator, &class.alert_message(detail))
            .await
        {
            Ok(()) => {
                info!("Sent {} alert to superuser {operator}", class.key());
                AlertDisposition::Sent
            }
            Err(e) => {
                warn!("Failed to send {} alert: {e}", class.key());
                AlertDisposition::Undelivered
            }
        }
    }
}
