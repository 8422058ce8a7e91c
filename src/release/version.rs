use crate::config::Config;
use crate::error::{HeraldError, Result};

/// Currently deployed version identifier, as supplied by the deployment.
#[derive(Debug, Clone, Default)]
pub struct VersionSource {
    version: Option<String>,
}

impl VersionSource {
    pub fn new(version: Option<String>) -> Self {
        Self {
            version: version.filter(|v| !v.trim().is_empty()),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.release.version.clone())
    }

    pub fn current(&self) -> Result<&str> {
        self.version
            .as_deref()
            .ok_or_else(|| HeraldError::Config("VERSION is not set".to_string()))
    }
}

/// Whether a version string can be used as a commit sha directly.
pub fn looks_like_commit_sha(value: &str) -> bool {
    (7..=40).contains(&value.len()) && value.chars().all(|c| c.is_ascii_hexdigit())
}
