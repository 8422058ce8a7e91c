use std::fmt::Write;

use crate::release::{AlertDisposition, RunResult};

use super::styling::{commit_sha, heading, label, outcome_marker};

/// Prints the outcome of a release check to stdout.
pub fn print_run_result(result: &RunResult) {
    println!("{}", render_run_result(result));
}

/// Human-readable, color-coded outcome of a release check.
///
/// - Green: note published and marker advanced
/// - Yellow: nothing to publish, or another check was running
/// - Red: the check failed
pub fn render_run_result(result: &RunResult) -> String {
    let mut output = String::new();
    let _ = writeln!(output, "{}", heading("Release check"));
    let _ = writeln!(output, "  {} {}", outcome_marker(result), result.summary());

    match result {
        RunResult::Published { sha, .. } => {
            let _ = writeln!(output, "  {} {}", label("marker →"), commit_sha(sha));
        }
        RunResult::Failed {
            alert: Some(alert), ..
        } => {
            let _ = writeln!(output, "  {} {}", label("operator alert:"), describe_alert(*alert));
        }
        _ => {}
    }

    output
}

fn describe_alert(alert: AlertDisposition) -> &'static str {
    match alert {
        AlertDisposition::Sent => "sent",
        AlertDisposition::Suppressed => "already sent earlier",
        AlertDisposition::Undelivered => "could not be delivered",
    }
}
