use std::fmt::Display;

use console::{style, StyledObject};

use crate::release::RunResult;

/// Colored status glyph for a run outcome.
pub fn outcome_marker(result: &RunResult) -> StyledObject<&'static str> {
    match result {
        RunResult::Published { .. } => style("✓").bright().green(),
        RunResult::NoUpdate { .. } | RunResult::Skipped => style("•").bright().yellow(),
        RunResult::Failed { .. } => style("✗").bright().red(),
    }
}

/// Abbreviated commit sha, the way git prints it.
pub fn commit_sha(sha: &str) -> StyledObject<&str> {
    style(sha.get(..7).unwrap_or(sha)).cyan()
}

pub fn heading(text: impl Display) -> StyledObject<String> {
    style(text.to_string()).bright().underlined()
}

pub fn label(text: impl Display) -> StyledObject<String> {
    style(text.to_string()).dim()
}

pub fn title(text: impl Display) -> StyledObject<String> {
    style(text.to_string()).magenta().bold()
}
