//! Slack-flavoured rendering of a merge request digest.
//!
//! One block per project, ordered by project id. A project without open
//! merge requests gets a single celebratory line; it never hides the other
//! projects of the same digest.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use git_provider::MergeRequestWithApprovals;

const LINE_ICON: &str = ":arrow_forward:";
const NO_APPROVALS: &str = "None";
const CREATED_AT_FORMAT: &str = "%-d %B %Y, %H:%M %Z";

/// Merge requests of one project, ready to render.
#[derive(Debug, Clone)]
pub struct ProjectDigest {
    pub project_name: String,
    pub merge_requests: Vec<MergeRequestWithApprovals>,
}

/// Buckets merge requests by project id.
///
/// Every id in `project_ids` gets a bucket, even an empty one. Duplicate
/// merge requests stay duplicated inside their bucket.
pub fn group_by_project(
    project_ids: &[u64],
    merge_requests: Vec<MergeRequestWithApprovals>,
) -> BTreeMap<u64, Vec<MergeRequestWithApprovals>> {
    let mut by_project: BTreeMap<u64, Vec<MergeRequestWithApprovals>> =
        project_ids.iter().map(|&id| (id, Vec::new())).collect();

    for mr in merge_requests {
        by_project.entry(mr.project_id()).or_default().push(mr);
    }
    by_project
}

/// Renders the whole digest as one message.
pub fn render_summary(projects: &[ProjectDigest], tz: &Tz) -> String {
    let mut summary = String::new();

    for (i, project) in projects.iter().enumerate() {
        if project.merge_requests.is_empty() {
            summary.push_str(&nothing_open_message(&project.project_name));
            if i + 1 < projects.len() {
                summary.push_str("\n\n");
            }
            continue;
        }

        for mr in &project.merge_requests {
            summary.push_str(&format_merge_request(&project.project_name, mr, tz));
        }
    }

    summary
}

/// The line posted for a project with no open merge requests.
pub fn nothing_open_message(project_name: &str) -> String {
    format!(":tada: There are no open merge requests for {project_name} ! :tada:")
}

/// One merge request entry, terminated by a blank line.
pub fn format_merge_request(
    project_name: &str,
    mr: &MergeRequestWithApprovals,
    tz: &Tz,
) -> String {
    let m = &mr.merge_request;
    format!(
        "{LINE_ICON} {project_name} <{}|{}>\n*Author:* {}\n*Created at:* {}\n*Approved by:* {}\n\n",
        m.web_url,
        m.title,
        m.author_name,
        format_created_at(&m.created_at, tz),
        approved_by_field(mr.approved_by()),
    )
}

/// Comma-joined approver names, or `None` when nobody approved yet.
pub fn approved_by_field(names: &[String]) -> String {
    if names.is_empty() {
        NO_APPROVALS.to_string()
    } else {
        names.join(", ")
    }
}

/// `D Month YYYY, HH:MM TZ`, e.g. `5 March 2024, 09:07 UTC`.
pub fn format_created_at(ts: &DateTime<Utc>, tz: &Tz) -> String {
    ts.with_timezone(tz).format(CREATED_AT_FORMAT).to_string()
}
