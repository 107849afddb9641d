//! Provider-agnostic data model for projects, merge requests and approvals.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Page size used when callers do not pick one.
pub const DEFAULT_PER_PAGE: u32 = 50;

/// Largest page size GitLab accepts.
pub const MAX_PER_PAGE: u32 = 100;

/// Page request sent with every list call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageOptions {
    /// 1-based page number.
    pub page: u32,
    pub per_page: u32,
}

impl PageOptions {
    /// First page at the given size.
    pub fn first(per_page: u32) -> Self {
        Self {
            page: 1,
            per_page: per_page.clamp(1, MAX_PER_PAGE),
        }
    }
}

impl Default for PageOptions {
    fn default() -> Self {
        Self::first(DEFAULT_PER_PAGE)
    }
}

/// Pagination state reported by the server for one page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageInfo {
    pub current_page: u32,
    pub total_pages: u32,
    pub next_page: Option<u32>,
}

impl PageInfo {
    /// True once `current_page >= total_pages`.
    pub fn is_last(&self) -> bool {
        self.current_page >= self.total_pages
    }

    /// Page to request after this one.
    ///
    /// Falls back to `current_page + 1` when the server's hint is missing or
    /// does not move forward.
    pub fn following(&self) -> u32 {
        match self.next_page {
            Some(next) if next > self.current_page => next,
            _ => self.current_page + 1,
        }
    }
}

/// One page of items plus the server's pagination state.
#[derive(Debug, Clone)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub info: PageInfo,
}

/// Minimal project listing entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectSummary {
    pub id: u64,
    pub name: String,
}

/// Lifecycle state of a merge request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum MergeRequestState {
    Opened,
    Closed,
    Merged,
    Locked,
    /// Any state string this client does not know about.
    Other(String),
}

impl MergeRequestState {
    /// Maps GitLab's `state` field.
    pub fn from_api(state: &str) -> Self {
        match state {
            "opened" => Self::Opened,
            "closed" => Self::Closed,
            "merged" => Self::Merged,
            "locked" => Self::Locked,
            other => Self::Other(other.to_string()),
        }
    }
}

/// High-level metadata for a merge request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MergeRequest {
    /// Project-scoped merge request number.
    pub iid: u64,
    pub project_id: u64,
    pub title: String,
    pub author_name: String,
    pub created_at: DateTime<Utc>,
    pub web_url: String,
    pub state: MergeRequestState,
}

/// Who has approved a merge request so far.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalInfo {
    /// Display names in the order the server returned them.
    pub approved_by: Vec<String>,
}

/// A merge request joined with its approval state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MergeRequestWithApprovals {
    pub merge_request: MergeRequest,
    pub approvals: ApprovalInfo,
}

impl MergeRequestWithApprovals {
    pub fn project_id(&self) -> u64 {
        self.merge_request.project_id
    }

    pub fn approved_by(&self) -> &[String] {
        &self.approvals.approved_by
    }
}
