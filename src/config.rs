use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Configuration for release-herald.
///
/// Values come from an optional configuration file and are then overridden
/// by the process environment, which is how deployments normally supply them.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Config {
    /// Source-control host settings
    #[serde(default)]
    pub github: GitHubConfig,

    /// Messaging endpoint settings
    #[serde(default)]
    pub napcat: NapCatConfig,

    /// Release note behaviour
    #[serde(default)]
    pub release: ReleaseConfig,

    /// Operator identities, in priority order. The first numeric entry receives alerts.
    #[serde(default)]
    pub superusers: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct GitHubConfig {
    /// GitHub personal access token
    pub token: Option<String>,

    /// GitHub API base URL
    #[serde(default = "default_github_base_url")]
    pub base_url: String,

    /// Repository owner
    #[serde(default = "default_repo_owner")]
    pub owner: String,

    /// Repository name
    #[serde(default = "default_repo_name")]
    pub repo: String,

    /// Name of the tag that marks the last published deployment
    #[serde(default = "default_marker_tag")]
    pub marker_tag: String,

    /// Number of recent commits listed when no marker tag exists yet
    #[serde(default = "default_bootstrap_limit")]
    pub bootstrap_limit: usize,

    /// Per-request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct NapCatConfig {
    /// Base URL of the NapCat HTTP API
    #[serde(default)]
    pub api_base: String,

    /// Access token configured in NapCat's HTTP server, if any
    pub access_token: Option<String>,

    /// Per-request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ReleaseConfig {
    /// Currently deployed version identifier
    pub version: Option<String>,

    /// Maximum number of commit bullets in a release note
    #[serde(default = "default_max_commits_display")]
    pub max_commits_display: usize,

    /// Maximum length of a single commit line, in characters
    #[serde(default = "default_max_message_length")]
    pub max_message_length: usize,

    /// Delay before the startup check runs in serve mode
    #[serde(default = "default_startup_delay_secs")]
    pub startup_delay_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            github: GitHubConfig::default(),
            napcat: NapCatConfig::default(),
            release: ReleaseConfig::default(),
            superusers: Vec::new(),
        }
    }
}

impl Default for GitHubConfig {
    fn default() -> Self {
        Self {
            token: None,
            base_url: default_github_base_url(),
            owner: default_repo_owner(),
            repo: default_repo_name(),
            marker_tag: default_marker_tag(),
            bootstrap_limit: default_bootstrap_limit(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl Default for NapCatConfig {
    fn default() -> Self {
        Self {
            api_base: String::new(),
            access_token: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl Default for ReleaseConfig {
    fn default() -> Self {
        Self {
            version: None,
            max_commits_display: default_max_commits_display(),
            max_message_length: default_max_message_length(),
            startup_delay_secs: default_startup_delay_secs(),
        }
    }
}

fn default_github_base_url() -> String {
    "https://api.github.com".to_string()
}

fn default_repo_owner() -> String {
    "trytodupe".to_string()
}

fn default_repo_name() -> String {
    "ttd-bot".to_string()
}

fn default_marker_tag() -> String {
    "last-deployed".to_string()
}

fn default_bootstrap_limit() -> usize {
    10
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_max_commits_display() -> usize {
    10
}

fn default_max_message_length() -> usize {
    60
}

fn default_startup_delay_secs() -> u64 {
    5
}

impl Config {
    /// Load configuration from a file, then apply environment overrides.
    ///
    /// Searches for configuration files in this order:
    /// 1. Specified path
    /// 2. ./release-herald.toml
    /// 3. ./release-herald.json
    /// 4. ./release-herald.yaml
    /// 5. ./release-herald.yml
    ///
    /// Falls back to defaults if no file is found.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = Self::load_file(path)?;
        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    fn load_file(path: Option<&Path>) -> Result<Self> {
        if let Some(path) = path {
            if path.exists() {
                return Self::load_from_path(path);
            }
            log::warn!("Config file {} not found, using defaults", path.display());
            return Ok(Self::default());
        }

        let candidates = [
            "release-herald.toml",
            "release-herald.json",
            "release-herald.yaml",
            "release-herald.yml",
        ];

        for candidate in &candidates {
            let path = Path::new(candidate);
            if path.exists() {
                return Self::load_from_path(path);
            }
        }

        Ok(Self::default())
    }

    /// Load configuration from a specific file path.
    fn load_from_path(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let extension = path.extension().and_then(|ext| ext.to_str()).unwrap_or("");

        match extension {
            "toml" => toml::from_str(&contents)
                .with_context(|| format!("Failed to parse TOML config: {}", path.display())),
            "json" => serde_json::from_str(&contents)
                .with_context(|| format!("Failed to parse JSON config: {}", path.display())),
            "yaml" | "yml" => serde_yaml::from_str(&contents)
                .with_context(|| format!("Failed to parse YAML config: {}", path.display())),
            _ => toml::from_str(&contents)
                .or_else(|_| serde_json::from_str(&contents))
                .or_else(|_| serde_yaml::from_str(&contents))
                .with_context(|| format!("Failed to parse config file: {}", path.display())),
        }
    }

    /// Override values with environment variables.
    ///
    /// `lookup` resolves a variable name to its value; empty values are ignored.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        if let Some(version) = get("VERSION") {
            self.release.version = Some(version.trim().to_string());
        }
        if let Some(token) = get("GITHUB_TOKEN") {
            self.github.token = Some(token.trim().to_string());
        }
        if let Some(base_url) = get("GITHUB_API_BASE") {
            self.github.base_url = base_url.trim().to_string();
        }
        if let Some(owner) = get("GITHUB_REPO_OWNER") {
            self.github.owner = owner.trim().to_string();
        }
        if let Some(repo) = get("GITHUB_REPO_NAME") {
            self.github.repo = repo.trim().to_string();
        }
        if let Some(tag) = get("LAST_DEPLOYED_TAG") {
            self.github.marker_tag = tag.trim().to_string();
        }
        if let Some(api_base) = get("NAPCAT_API_BASE") {
            self.napcat.api_base = api_base.trim().to_string();
        }
        if let Some(token) = get("NAPCAT_ACCESS_TOKEN") {
            self.napcat.access_token = Some(token.trim().to_string());
        }
        if let Some(value) = get("MAX_COMMITS_DISPLAY") {
            self.release.max_commits_display = parse_number("MAX_COMMITS_DISPLAY", &value)?;
        }
        if let Some(value) = get("MAX_MESSAGE_LENGTH") {
            self.release.max_message_length = parse_number("MAX_MESSAGE_LENGTH", &value)?;
        }
        if let Some(value) = get("BOOTSTRAP_COMMIT_LIMIT") {
            self.github.bootstrap_limit = parse_number("BOOTSTRAP_COMMIT_LIMIT", &value)?;
        }
        if let Some(value) = get("HTTP_TIMEOUT_SECS") {
            let secs = parse_number("HTTP_TIMEOUT_SECS", &value)?;
            self.github.timeout_secs = secs;
            self.napcat.timeout_secs = secs;
        }
        if let Some(value) = get("STARTUP_DELAY_SECS") {
            self.release.startup_delay_secs = parse_number("STARTUP_DELAY_SECS", &value)?;
        }
        if let Some(value) = get("SUPERUSERS") {
            self.superusers = parse_superusers(&value);
        }

        Ok(())
    }

    /// The operator who receives private alerts, if one is configured.
    pub fn primary_superuser(&self) -> Option<u64> {
        let primary = self
            .superusers
            .iter()
            .find(|candidate| !candidate.is_empty() && candidate.chars().all(|c| c.is_ascii_digit()))
            .and_then(|candidate| candidate.parse().ok());

        if primary.is_none() {
            log::warn!("No valid superuser found for release-note alerts");
        }
        primary
    }
}

fn parse_number<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| anyhow::anyhow!("{key} must be a non-negative integer, got '{value}'"))
}

/// Parse a superuser list from a JSON array, a JSON string, or a comma/space separated list.
pub fn parse_superusers(value: &str) -> Vec<String> {
    let raw = value.trim();
    if raw.is_empty() {
        return Vec::new();
    }

    let clean = |item: &str| item.trim().trim_matches(|c| c == '"' || c == '\'').to_string();

    match serde_json::from_str::<serde_json::Value>(raw) {
        Ok(serde_json::Value::Array(items)) => items
            .iter()
            .map(|item| match item {
                serde_json::Value::String(s) => clean(s),
                other => clean(&other.to_string()),
            })
            .filter(|item| !item.is_empty())
            .collect(),
        Ok(serde_json::Value::String(s)) if !s.trim().is_empty() => vec![clean(&s)],
        _ => raw
            .trim_start_matches(&['[', '('][..])
            .trim_end_matches(&[']', ')'][..])
            .split(|c: char| c == ',' || c.is_whitespace())
            .map(clean)
            .filter(|item| !item.is_empty())
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.github.base_url, "https://api.github.com");
        assert_eq!(config.github.marker_tag, "last-deployed");
        assert_eq!(config.github.bootstrap_limit, 10);
        assert_eq!(config.release.max_commits_display, 10);
        assert_eq!(config.release.max_message_length, 60);
        assert!(config.release.version.is_none());
        assert!(config.superusers.is_empty());
    }

    #[test]
    fn test_env_overrides() {
        let mut config = Config::default();
        config
            .apply_env(env(&[
                ("VERSION", "v1.4.0"),
                ("GITHUB_TOKEN", "ghp_test"),
                ("GITHUB_REPO_OWNER", "acme"),
                ("GITHUB_REPO_NAME", "bot"),
                ("LAST_DEPLOYED_TAG", "prod-deployed"),
                ("NAPCAT_API_BASE", "http://napcat:3000"),
                ("MAX_COMMITS_DISPLAY", "5"),
                ("MAX_MESSAGE_LENGTH", "40"),
                ("SUPERUSERS", "[\"1669790626\", \"1777777777\"]"),
            ]))
            .unwrap();

        assert_eq!(config.release.version.as_deref(), Some("v1.4.0"));
        assert_eq!(config.github.token.as_deref(), Some("ghp_test"));
        assert_eq!(config.github.owner, "acme");
        assert_eq!(config.github.repo, "bot");
        assert_eq!(config.github.marker_tag, "prod-deployed");
        assert_eq!(config.napcat.api_base, "http://napcat:3000");
        assert_eq!(config.release.max_commits_display, 5);
        assert_eq!(config.release.max_message_length, 40);
        assert_eq!(config.primary_superuser(), Some(1669790626));
    }

    #[test]
    fn test_empty_env_values_are_ignored() {
        let mut config = Config::default();
        config
            .apply_env(env(&[("LAST_DEPLOYED_TAG", "  "), ("GITHUB_TOKEN", "")]))
            .unwrap();
        assert_eq!(config.github.marker_tag, "last-deployed");
        assert!(config.github.token.is_none());
    }

    #[test]
    fn test_invalid_number_is_rejected() {
        let mut config = Config::default();
        let result = config.apply_env(env(&[("MAX_COMMITS_DISPLAY", "ten")]));
        assert!(result.unwrap_err().to_string().contains("MAX_COMMITS_DISPLAY"));
    }

    #[test]
    fn test_parse_superusers_formats() {
        assert_eq!(parse_superusers("[\"1\", \"2\"]"), vec!["1", "2"]);
        assert_eq!(parse_superusers("[1, 2]"), vec!["1", "2"]);
        assert_eq!(parse_superusers("\"42\""), vec!["42"]);
        assert_eq!(parse_superusers("1, 2 3"), vec!["1", "2", "3"]);
        assert_eq!(parse_superusers("['7', '8']"), vec!["7", "8"]);
        assert!(parse_superusers("   ").is_empty());
    }

    #[test]
    fn test_primary_superuser_skips_non_numeric() {
        let config = Config {
            superusers: vec!["admin".to_string(), "1669790627".to_string()],
            ..Config::default()
        };
        assert_eq!(config.primary_superuser(), Some(1669790627));

        let config = Config {
            superusers: vec!["admin".to_string()],
            ..Config::default()
        };
        assert_eq!(config.primary_superuser(), None);
    }

    #[test]
    fn test_load_toml_config() {
        let mut temp_file = NamedTempFile::with_suffix(".toml").unwrap();
        let toml_content = r#"
superusers = ["1669790626"]

[github]
owner = "acme"
repo = "bot"
marker-tag = "deployed"

[napcat]
api-base = "http://127.0.0.1:3000"

[release]
max-commits-display = 3
"#;
        write!(temp_file, "{}", toml_content).unwrap();

        let config = Config::load_from_path(temp_file.path()).unwrap();
        assert_eq!(config.github.owner, "acme");
        assert_eq!(config.github.marker_tag, "deployed");
        assert_eq!(config.github.base_url, "https://api.github.com");
        assert_eq!(config.napcat.api_base, "http://127.0.0.1:3000");
        assert_eq!(config.release.max_commits_display, 3);
        assert_eq!(config.release.max_message_length, 60);
        assert_eq!(config.superusers, vec!["1669790626"]);
    }

    #[test]
    fn test_load_json_config() {
        let mut temp_file = NamedTempFile::with_suffix(".json").unwrap();
        let json_content = r#"{
  "github": { "token": "ghp_json", "owner": "json-owner" },
  "release": { "version": "v2" }
}"#;
        write!(temp_file, "{}", json_content).unwrap();

        let config = Config::load_from_path(temp_file.path()).unwrap();
        assert_eq!(config.github.token, Some("ghp_json".to_string()));
        assert_eq!(config.github.owner, "json-owner");
        assert_eq!(config.release.version, Some("v2".to_string()));
    }

    #[test]
    fn test_load_nonexistent_config() {
        let config = Config::load_file(Some(Path::new("nonexistent.toml"))).unwrap();
        assert_eq!(config.github.marker_tag, "last-deployed");
    }
}
