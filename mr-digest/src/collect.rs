//! Fetch stage of the digest: group expansion, project enumeration and
//! merge request + approval lookup.
//!
//! Everything here is sequential and fails fast: the first remote error
//! aborts the current notification target.

use std::collections::{HashSet, VecDeque};

use git_provider::{GitLabClient, MergeRequestWithApprovals, RemoteResult};
use tracing::debug;

/// Returns `group_id` followed by its subgroups.
///
/// Only direct children are listed unless `recursive` is set, in which case
/// descendants are walked breadth-first. A group id is expanded at most once.
pub async fn resolve_group_ids(
    client: &GitLabClient,
    group_id: u64,
    recursive: bool,
) -> RemoteResult<Vec<u64>> {
    let mut ids = vec![group_id];
    let mut seen = HashSet::from([group_id]);
    let mut queue = VecDeque::from([group_id]);

    while let Some(parent) = queue.pop_front() {
        for child in client.all_subgroups(parent).await? {
            if !seen.insert(child) {
                continue;
            }
            ids.push(child);
            if recursive {
                queue.push_back(child);
            }
        }
    }

    debug!(group = group_id, resolved = ids.len(), "group ids resolved");
    Ok(ids)
}

/// Lists the project ids of every group, in group order.
///
/// A project reachable from several groups is listed once per group.
pub async fn collect_project_ids(
    client: &GitLabClient,
    group_ids: &[u64],
) -> RemoteResult<Vec<u64>> {
    let mut project_ids = Vec::new();
    for &group_id in group_ids {
        let projects = client.all_group_projects(group_id).await?;
        debug!(group = group_id, projects = projects.len(), "group projects listed");
        project_ids.extend(projects.into_iter().map(|p| p.id));
    }
    Ok(project_ids)
}

/// Fetches open merge requests for each project and joins each one with
/// its approvals.
pub async fn fetch_merge_requests_with_approvals(
    client: &GitLabClient,
    project_ids: &[u64],
) -> RemoteResult<Vec<MergeRequestWithApprovals>> {
    let mut joined = Vec::new();

    for &project_id in project_ids {
        let mrs = client.all_open_merge_requests(project_id).await?;
        debug!(project = project_id, open = mrs.len(), "open merge requests listed");

        for merge_request in mrs {
            let approvals = client
                .get_approval_configuration(project_id, merge_request.iid)
                .await?;
            joined.push(MergeRequestWithApprovals {
                merge_request,
                approvals,
            });
        }
    }

    Ok(joined)
}
