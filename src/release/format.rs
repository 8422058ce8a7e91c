use std::fmt;

use unicode_segmentation::UnicodeSegmentation;

use super::Commit;

const ELLIPSIS: &str = "…";

/// Bounds applied when rendering a release note.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FormatLimits {
    /// Maximum number of commit bullets
    pub max_commits_display: usize,
    /// Maximum characters of a commit summary before it is cut
    pub max_message_length: usize,
}

impl Default for FormatLimits {
    fn default() -> Self {
        Self {
            max_commits_display: 10,
            max_message_length: 60,
        }
    }
}

/// A rendered-on-demand summary of one release.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleaseNote {
    /// Previous version label; `None` on the first deployment
    pub from_version: Option<String>,
    pub to_version: String,
    /// One line per displayed commit, already truncated
    pub bullet_lines: Vec<String>,
    /// Commits left out because of the display cap
    pub truncated_count: usize,
}

impl ReleaseNote {
    pub fn build(
        from_version: Option<&str>,
        to_version: &str,
        commits: &[Commit],
        limits: &FormatLimits,
    ) -> Self {
        let bullet_lines = commits
            .iter()
            .take(limits.max_commits_display)
            .map(|commit| truncate_graphemes(commit.summary(), limits.max_message_length))
            .collect::<Vec<_>>();

        Self {
            from_version: from_version.map(ToString::to_string),
            to_version: to_version.to_string(),
            truncated_count: commits.len() - bullet_lines.len(),
            bullet_lines,
        }
    }
}

impl fmt::Display for ReleaseNote {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.bullet_lines.is_empty() && self.truncated_count == 0 {
            return write!(f, "Version {} deployed, no new commits", self.to_version);
        }

        match &self.from_version {
            Some(from) => writeln!(f, "🚀 Release: {from} → {}", self.to_version)?,
            None => writeln!(f, "🚀 Deployed {}", self.to_version)?,
        }
        writeln!(f)?;
        write!(f, "📝 Changes:")?;

        for line in &self.bullet_lines {
            write!(f, "\n  • {line}")?;
        }

        if self.truncated_count > 0 {
            write!(f, "\n...and {} more", self.truncated_count)?;
        }

        Ok(())
    }
}

/// Render the release note text for `commits`.
///
/// The output depends only on the arguments, so identical input always
/// produces byte-identical text.
pub fn format_release_note(
    from_version: Option<&str>,
    to_version: &str,
    commits: &[Commit],
    limits: &FormatLimits,
) -> String {
    ReleaseNote::build(from_version, to_version, commits, limits).to_string()
}

/// Cut `text` to at most `max` user-perceived characters, marking the cut with an ellipsis.
pub fn truncate_graphemes(text: &str, max: usize) -> String {
    let mut graphemes = text.grapheme_indices(true);

    match graphemes.nth(max) {
        None => text.to_string(),
        Some((cut, _)) => format!("{}{ELLIPSIS}", text[..cut].trim_end()),
    }
}
