use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use log::{info, warn};
use tokio::task::JoinHandle;

use crate::release::{ReleaseCheck, RunResult};

/// Commands that trigger a release check.
const CHECK_COMMANDS: [&str; 2] = ["check-release", "检查更新"];

const CHECK_STARTED_REPLY: &str = "Checking for release updates...";

/// Run the release check once, `delay` after the messaging connection is up.
pub fn schedule_startup_check(workflow: Arc<ReleaseCheck>, delay: Duration) -> JoinHandle<RunResult> {
    info!("Scheduling release note check in {}s", delay.as_secs());
    tokio::spawn(async move {
        tokio::time::sleep(delay).await;
        workflow.run_check().await
    })
}

/// What the router did with an incoming line.
#[derive(Debug, PartialEq, Eq)]
pub enum CommandOutcome {
    /// Not a command this router handles
    Ignored,
    /// A check command from someone who is not an operator
    Denied,
    /// Replies to send back to the invoking channel, in order
    Replies(Vec<String>),
}

/// Routes operator commands of the form `<user_id> <command>` to the release check.
pub struct CommandRouter {
    workflow: Arc<ReleaseCheck>,
    operators: HashSet<String>,
}

impl CommandRouter {
    pub fn new(workflow: Arc<ReleaseCheck>, operators: &[String]) -> Self {
        Self {
            workflow,
            operators: operators.iter().cloned().collect(),
        }
    }

    pub async fn dispatch(&self, line: &str) -> CommandOutcome {
        let mut parts = line.split_whitespace();
        let (Some(user_id), Some(command)) = (parts.next(), parts.next()) else {
            return CommandOutcome::Ignored;
        };

        let command = command.trim_start_matches('/');
        if !CHECK_COMMANDS.contains(&command) {
            return CommandOutcome::Ignored;
        }

        if !self.operators.contains(user_id) {
            warn!("User {user_id} is not allowed to run {command}");
            return CommandOutcome::Denied;
        }

        info!("Release check requested by {user_id}");
        let result = self.workflow.run_check().await;

        CommandOutcome::Replies(vec![CHECK_STARTED_REPLY.to_string(), result.summary()])
    }

    /// Handle `line` on its own task; `on_replies` receives the replies, if any.
    pub fn spawn_dispatch<F>(self: &Arc<Self>, line: String, on_replies: F) -> JoinHandle<()>
    where
        F: FnOnce(Vec<String>) + Send + 'static,
    {
        let router = Arc::clone(self);
        tokio::spawn(async move {
            if let CommandOutcome::Replies(replies) = router.dispatch(&line).await {
                on_replies(replies);
            }
        })
    }
}
