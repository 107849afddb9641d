//! Notifier configuration: a YAML file plus the GitLab token from the
//! environment.
//!
//! # File shape
//!
//! ```yaml
//! gitlab:
//!   url: https://gitlab.example.com
//! groups:
//!   - id: 10
//!     slackWebhook: https://hooks.slack.com/services/T/B/X
//! projects:
//!   - id: 200
//!     slackWebhook: https://hooks.slack.com/services/T/B/Y
//! ```
//!
//! `schedule` and `digest` sections are optional; see [`ScheduleSettings`]
//! and [`DigestSettings`] for defaults.
//!
//! # Environment variables
//!
//! - `GITLAB_TOKEN` (required) = access token for the GitLab API
//! - `MR_NOTIFY_CONFIG` (optional) = config file path, `config.yaml` by default

use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono_tz::Tz;
use git_provider::{DEFAULT_PER_PAGE, MAX_PER_PAGE};
use serde::Deserialize;

use crate::errors::ConfigError;

pub const TOKEN_VAR: &str = "GITLAB_TOKEN";
pub const CONFIG_PATH_VAR: &str = "MR_NOTIFY_CONFIG";
pub const DEFAULT_CONFIG_PATH: &str = "config.yaml";

/// Root of the YAML config file.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotifyConfig {
    pub gitlab: GitLabSettings,
    #[serde(default)]
    pub groups: Vec<GroupTarget>,
    #[serde(default)]
    pub projects: Vec<ProjectTarget>,
    #[serde(default)]
    pub schedule: ScheduleSettings,
    #[serde(default)]
    pub digest: DigestSettings,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GitLabSettings {
    /// Instance URL; `/api/v4` is appended when missing.
    pub url: String,
    /// Per-request timeout in seconds. No timeout when unset.
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

/// A group whose projects (and subgroups' projects) share one webhook.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupTarget {
    pub id: u64,
    pub slack_webhook: String,
    /// Walk all descendant subgroups instead of direct children only.
    #[serde(default)]
    pub recursive: bool,
}

/// A single project notified on its own webhook.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectTarget {
    pub id: u64,
    pub slack_webhook: String,
}

/// When notification cycles run.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ScheduleSettings {
    /// Seconds between cycles (default: one day).
    pub interval_secs: u64,
    /// Run a cycle immediately at startup instead of after one interval.
    pub run_on_start: bool,
    /// Run one cycle and exit.
    pub once: bool,
}

impl Default for ScheduleSettings {
    fn default() -> Self {
        Self {
            interval_secs: 24 * 60 * 60,
            run_on_start: true,
            once: false,
        }
    }
}

impl ScheduleSettings {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

/// How digests are built and delivered.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DigestSettings {
    /// IANA zone used for "Created at" (default `UTC`).
    pub timezone: String,
    /// Notification targets processed at once (default 1, sequential).
    pub concurrency: usize,
    /// GitLab page size, 1..=100.
    pub per_page: u32,
    /// Log summaries instead of posting them.
    pub dry_run: bool,
}

impl Default for DigestSettings {
    fn default() -> Self {
        Self {
            timezone: "UTC".into(),
            concurrency: 1,
            per_page: DEFAULT_PER_PAGE,
            dry_run: false,
        }
    }
}

impl DigestSettings {
    /// Parsed time zone. Call after [`NotifyConfig::validate`].
    pub fn tz(&self) -> Result<Tz, ConfigError> {
        self.timezone
            .trim()
            .parse::<Tz>()
            .map_err(|e| ConfigError::invalid("digest.timezone", e.to_string()))
    }
}

impl NotifyConfig {
    /// Parses a config from YAML text and validates it.
    pub fn from_yaml_str(yaml: &str) -> Result<Self, ConfigError> {
        let cfg: NotifyConfig = serde_yaml::from_str(yaml)?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Reads, parses and validates a config file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_yaml_str(&contents)
    }

    /// Validates config values.
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_http_url("gitlab.url", &self.gitlab.url)?;
        if self.gitlab.timeout_secs == Some(0) {
            return Err(ConfigError::invalid("gitlab.timeoutSecs", "must be > 0"));
        }

        if self.groups.is_empty() && self.projects.is_empty() {
            return Err(ConfigError::invalid(
                "groups/projects",
                "at least one group or project is required",
            ));
        }
        for (i, g) in self.groups.iter().enumerate() {
            if g.id == 0 {
                return Err(ConfigError::invalid(format!("groups[{i}].id"), "must be > 0"));
            }
            check_http_url(&format!("groups[{i}].slackWebhook"), &g.slack_webhook)?;
        }
        for (i, p) in self.projects.iter().enumerate() {
            if p.id == 0 {
                return Err(ConfigError::invalid(format!("projects[{i}].id"), "must be > 0"));
            }
            check_http_url(&format!("projects[{i}].slackWebhook"), &p.slack_webhook)?;
        }

        if self.schedule.interval_secs == 0 {
            return Err(ConfigError::invalid("schedule.intervalSecs", "must be > 0"));
        }
        if self.digest.concurrency == 0 {
            return Err(ConfigError::invalid("digest.concurrency", "must be > 0"));
        }
        if !(1..=MAX_PER_PAGE).contains(&self.digest.per_page) {
            return Err(ConfigError::invalid(
                "digest.perPage",
                format!("expected 1..={MAX_PER_PAGE}"),
            ));
        }
        self.digest.tz()?;

        Ok(())
    }
}

fn check_http_url(field: &str, value: &str) -> Result<(), ConfigError> {
    let v = value.trim();
    if v.is_empty() {
        return Err(ConfigError::invalid(field, "must not be empty"));
    }
    if !(v.starts_with("http://") || v.starts_with("https://")) {
        return Err(ConfigError::invalid(
            field,
            "must start with http:// or https://",
        ));
    }
    Ok(())
}

/// Everything the binary needs to build a notifier.
#[derive(Debug, Clone)]
pub struct Settings {
    pub config_path: PathBuf,
    pub config: NotifyConfig,
    pub token: String,
}

impl Settings {
    /// Loads the config file named by `MR_NOTIFY_CONFIG` and the token from
    /// `GITLAB_TOKEN`.
    pub fn from_env() -> Result<Self, ConfigError> {
        let path = std::env::var(CONFIG_PATH_VAR)
            .ok()
            .filter(|p| !p.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());
        let token = must_env(TOKEN_VAR)?;
        Self::load(PathBuf::from(path), token)
    }

    pub fn load(config_path: PathBuf, token: String) -> Result<Self, ConfigError> {
        if token.trim().is_empty() {
            return Err(ConfigError::MissingVar(TOKEN_VAR));
        }
        let config = NotifyConfig::load(&config_path)?;
        Ok(Self {
            config_path,
            config,
            token,
        })
    }
}

/// Reads a required, non-empty environment variable.
fn must_env(name: &'static str) -> Result<String, ConfigError> {
    match std::env::var(name) {
        Ok(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(ConfigError::MissingVar(name)),
    }
}
