//! One notification cycle: build a digest per configured group and
//! standalone project, then deliver it to that target's webhook.
//!
//! A failure while building or posting one target's digest is logged and
//! the cycle moves on to the next target.

use std::time::Duration;

use chat_webhook::SlackWebhookClient;
use chrono_tz::Tz;
use futures::{StreamExt, stream};
use git_provider::{GitLabClient, GitLabConfig};
use tracing::{error, info, instrument, warn};

use crate::collect::{collect_project_ids, fetch_merge_requests_with_approvals, resolve_group_ids};
use crate::config::{GroupTarget, NotifyConfig, ProjectTarget, Settings};
use crate::errors::{DigestError, DigestResult};
use crate::summary::{ProjectDigest, group_by_project, render_summary};

/// What happened to one target's digest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delivery {
    /// Posted to the webhook.
    Sent,
    /// Logged only (`digest.dryRun`).
    DryRun,
    /// Nothing to report, e.g. a group without projects.
    NothingToSend,
}

/// Outcome counts for a full cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub sent: usize,
    pub dry_run: usize,
    pub nothing_to_send: usize,
    /// Targets skipped because a GitLab call failed.
    pub fetch_failed: usize,
    /// Targets whose webhook post failed.
    pub delivery_failed: usize,
}

impl CycleReport {
    fn record(&mut self, outcome: &DigestResult<Delivery>) {
        match outcome {
            Ok(Delivery::Sent) => self.sent += 1,
            Ok(Delivery::DryRun) => self.dry_run += 1,
            Ok(Delivery::NothingToSend) => self.nothing_to_send += 1,
            Err(DigestError::Delivery(_)) => self.delivery_failed += 1,
            Err(_) => self.fetch_failed += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.sent + self.dry_run + self.nothing_to_send + self.fetch_failed + self.delivery_failed
    }
}

#[derive(Debug, Clone, Copy)]
enum Target<'a> {
    Group(&'a GroupTarget),
    Project(&'a ProjectTarget),
}

/// Owns both API clients and the configuration for the lifetime of the
/// process.
#[derive(Debug, Clone)]
pub struct Notifier {
    gitlab: GitLabClient,
    slack: SlackWebhookClient,
    config: NotifyConfig,
    tz: Tz,
}

impl Notifier {
    /// Builds both clients from loaded settings.
    pub fn from_settings(settings: &Settings) -> DigestResult<Self> {
        let cfg = &settings.config;
        let gitlab = GitLabClient::from_config(GitLabConfig {
            url: cfg.gitlab.url.clone(),
            token: settings.token.clone(),
            timeout: cfg.gitlab.timeout_secs.map(Duration::from_secs),
            per_page: cfg.digest.per_page,
        })?;

        Self::new(gitlab, SlackWebhookClient::default(), cfg.clone())
    }

    pub fn new(
        gitlab: GitLabClient,
        slack: SlackWebhookClient,
        config: NotifyConfig,
    ) -> DigestResult<Self> {
        let tz = config.digest.tz()?;
        Ok(Self {
            gitlab,
            slack,
            config,
            tz,
        })
    }

    pub fn config(&self) -> &NotifyConfig {
        &self.config
    }

    /// Notifies every group, then every standalone project.
    ///
    /// At most `digest.concurrency` targets are processed at once; the
    /// cycle itself never fails.
    pub async fn run_cycle(&self) -> CycleReport {
        let targets: Vec<Target<'_>> = self
            .config
            .groups
            .iter()
            .map(Target::Group)
            .chain(self.config.projects.iter().map(Target::Project))
            .collect();

        info!(
            groups = self.config.groups.len(),
            projects = self.config.projects.len(),
            "notification cycle started"
        );

        let outcomes: Vec<DigestResult<Delivery>> = stream::iter(targets)
            .map(|target| self.run_target(target))
            .buffered(self.config.digest.concurrency.max(1))
            .collect()
            .await;

        let mut report = CycleReport::default();
        for outcome in &outcomes {
            report.record(outcome);
        }

        info!(
            sent = report.sent,
            dry_run = report.dry_run,
            nothing_to_send = report.nothing_to_send,
            fetch_failed = report.fetch_failed,
            delivery_failed = report.delivery_failed,
            "notification cycle finished"
        );
        report
    }

    async fn run_target(&self, target: Target<'_>) -> DigestResult<Delivery> {
        let outcome = match target {
            Target::Group(group) => self.notify_group(group).await,
            Target::Project(project) => self.notify_project(project).await,
        };

        if let Err(err) = &outcome {
            match (target, err) {
                (Target::Group(g), DigestError::Delivery(e)) => {
                    error!(group = g.id, error = %e, "digest delivery failed")
                }
                (Target::Group(g), e) => warn!(group = g.id, error = %e, "group skipped"),
                (Target::Project(p), DigestError::Delivery(e)) => {
                    error!(project = p.id, error = %e, "digest delivery failed")
                }
                (Target::Project(p), e) => warn!(project = p.id, error = %e, "project skipped"),
            }
        }
        outcome
    }

    /// Builds and delivers the digest of a group and its subgroups.
    #[instrument(skip_all, fields(group = group.id))]
    pub async fn notify_group(&self, group: &GroupTarget) -> DigestResult<Delivery> {
        let group_ids = resolve_group_ids(&self.gitlab, group.id, group.recursive).await?;
        let project_ids = collect_project_ids(&self.gitlab, &group_ids).await?;
        info!(
            groups = group_ids.len(),
            projects = project_ids.len(),
            "group expanded"
        );

        let text = self.build_summary(&project_ids).await?;
        self.deliver(&group.slack_webhook, &text).await
    }

    /// Builds and delivers the digest of a single project.
    #[instrument(skip_all, fields(project = project.id))]
    pub async fn notify_project(&self, project: &ProjectTarget) -> DigestResult<Delivery> {
        let text = self.build_summary(&[project.id]).await?;
        self.deliver(&project.slack_webhook, &text).await
    }

    /// Fetches, groups and renders the digest for the given projects.
    ///
    /// A project that no longer exists is left out of the digest; any other
    /// name lookup failure aborts the whole digest.
    pub async fn build_summary(&self, project_ids: &[u64]) -> DigestResult<String> {
        let mrs = fetch_merge_requests_with_approvals(&self.gitlab, project_ids).await?;

        let mut digests = Vec::new();
        for (project_id, merge_requests) in group_by_project(project_ids, mrs) {
            let project_name = match self.gitlab.get_project(project_id).await {
                Ok(name) => name,
                Err(err) if err.is_not_found() => {
                    warn!(project = project_id, "project not found, leaving it out");
                    continue;
                }
                Err(err) => return Err(err.into()),
            };
            digests.push(ProjectDigest {
                project_name,
                merge_requests,
            });
        }

        Ok(render_summary(&digests, &self.tz))
    }

    async fn deliver(&self, webhook: &str, text: &str) -> DigestResult<Delivery> {
        if text.is_empty() {
            warn!("digest is empty, nothing posted");
            return Ok(Delivery::NothingToSend);
        }

        if self.config.digest.dry_run {
            info!(summary = %text, "dry run, digest not posted");
            return Ok(Delivery::DryRun);
        }

        self.slack.post_message(webhook, text).await?;
        info!(chars = text.len(), "digest posted");
        Ok(Delivery::Sent)
    }
}
