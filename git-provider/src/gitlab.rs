//! GitLab provider (REST v4) for groups, projects, merge requests and approvals.
//!
//! Endpoints used:
//!   * GET /groups/:id/projects
//!   * GET /groups/:id/subgroups
//!   * GET /projects/:id
//!   * GET /projects/:id/merge_requests?state=opened
//!   * GET /projects/:id/merge_requests/:iid/approvals
//!
//! List endpoints are paginated through the `x-page`, `x-total-pages` and
//! `x-next-page` response headers.

use std::time::Duration;

use chrono::{DateTime, Utc};
use reqwest::header::{HeaderMap, RETRY_AFTER};
use reqwest::{Client, Response, StatusCode};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::errors::{ClientConfigError, GitProviderResult, RemoteError, RemoteResult};
use crate::pagination::collect_pages;
use crate::types::*;

const API_SUFFIX: &str = "/api/v4";

/// Connection settings for [`GitLabClient`].
#[derive(Debug, Clone)]
pub struct GitLabConfig {
    /// Instance URL, e.g. "https://gitlab.com" or "https://gitlab.com/api/v4".
    pub url: String,
    /// Personal/project access token sent as `PRIVATE-TOKEN`.
    pub token: String,
    /// Per-request timeout; `None` keeps reqwest's default (no timeout).
    pub timeout: Option<Duration>,
    /// Page size for exhaustive listings.
    pub per_page: u32,
}

impl GitLabConfig {
    pub fn new(url: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            token: token.into(),
            timeout: None,
            per_page: DEFAULT_PER_PAGE,
        }
    }
}

/// GitLab HTTP client wrapper.
#[derive(Debug, Clone)]
pub struct GitLabClient {
    http: Client,
    base_api: String, // e.g. "https://gitlab.com/api/v4"
    token: String,    // "PRIVATE-TOKEN"
    per_page: u32,
}

impl GitLabClient {
    /// Builds a client with its own HTTP instance.
    pub fn from_config(cfg: GitLabConfig) -> GitProviderResult<Self> {
        let base_api = normalize_base_api(&cfg.url)?;
        if cfg.token.trim().is_empty() {
            return Err(ClientConfigError::MissingToken.into());
        }

        let mut builder =
            Client::builder().user_agent(concat!("mr-notify/", env!("CARGO_PKG_VERSION")));
        if let Some(timeout) = cfg.timeout {
            builder = builder.timeout(timeout);
        }
        let http = builder
            .build()
            .map_err(|e| ClientConfigError::HttpClient(e.to_string()))?;

        Ok(Self::new(http, base_api, cfg.token).with_per_page(cfg.per_page))
    }

    /// Constructs a GitLab client with a shared HTTP instance and auth token.
    ///
    /// `base_api` is used verbatim.
    pub fn new(http: Client, base_api: String, token: String) -> Self {
        debug!("Creating GitLabClient with base_api={}", base_api);
        Self {
            http,
            base_api,
            token,
            per_page: DEFAULT_PER_PAGE,
        }
    }

    /// Overrides the page size used by the `all_*` helpers.
    pub fn with_per_page(mut self, per_page: u32) -> Self {
        self.per_page = per_page.clamp(1, MAX_PER_PAGE);
        self
    }

    /// Lists one page of projects directly inside a group.
    pub async fn list_group_projects(
        &self,
        group_id: u64,
        opts: PageOptions,
    ) -> RemoteResult<Page<ProjectSummary>> {
        let url = format!("{}/groups/{}/projects", self.base_api, group_id);
        debug!("GitLab list_group_projects: {} page={}", url, opts.page);

        let page: Page<GitLabProject> = self.get_page(&url, &[], opts).await?;
        Ok(map_page(page, |p| ProjectSummary {
            id: p.id,
            name: p.name,
        }))
    }

    /// Lists one page of direct subgroup ids of a group.
    pub async fn list_subgroups(
        &self,
        group_id: u64,
        opts: PageOptions,
    ) -> RemoteResult<Page<u64>> {
        let url = format!("{}/groups/{}/subgroups", self.base_api, group_id);
        debug!("GitLab list_subgroups: {} page={}", url, opts.page);

        let page: Page<GitLabGroup> = self.get_page(&url, &[], opts).await?;
        Ok(map_page(page, |g| g.id))
    }

    /// Lists one page of open, non-draft merge requests, most recently
    /// updated first.
    pub async fn list_open_merge_requests(
        &self,
        project_id: u64,
        opts: PageOptions,
    ) -> RemoteResult<Page<MergeRequest>> {
        let url = format!("{}/projects/{}/merge_requests", self.base_api, project_id);
        debug!("GitLab list_open_merge_requests: {} page={}", url, opts.page);

        let filters = [
            ("state", "opened"),
            ("order_by", "updated_at"),
            ("sort", "desc"),
            ("wip", "no"),
        ];
        let page: Page<GitLabMergeRequest> = self.get_page(&url, &filters, opts).await?;
        Ok(map_page(page, GitLabMergeRequest::into_domain))
    }

    /// Fetches who approved a merge request.
    pub async fn get_approval_configuration(
        &self,
        project_id: u64,
        mr_iid: u64,
    ) -> RemoteResult<ApprovalInfo> {
        let url = format!(
            "{}/projects/{}/merge_requests/{}/approvals",
            self.base_api, project_id, mr_iid
        );
        debug!("GitLab get_approval_configuration: {}", url);

        let resp: GitLabApprovals = self.get_json(&url).await?;
        Ok(ApprovalInfo {
            approved_by: resp.approved_by.into_iter().map(|a| a.user.name).collect(),
        })
    }

    /// Fetches a project's display name.
    ///
    /// Returns [`RemoteError::NotFound`] when the project no longer exists.
    pub async fn get_project(&self, project_id: u64) -> RemoteResult<String> {
        let url = format!("{}/projects/{}", self.base_api, project_id);
        debug!("GitLab get_project: {}", url);

        let resp: GitLabProject = self.get_json(&url).await?;
        Ok(resp.name)
    }

    /// All projects of a group, following pagination to the end.
    pub async fn all_group_projects(&self, group_id: u64) -> RemoteResult<Vec<ProjectSummary>> {
        collect_pages(self.per_page, move |opts| {
            self.list_group_projects(group_id, opts)
        })
        .await
    }

    /// All direct subgroup ids of a group.
    pub async fn all_subgroups(&self, group_id: u64) -> RemoteResult<Vec<u64>> {
        collect_pages(self.per_page, move |opts| self.list_subgroups(group_id, opts)).await
    }

    /// All open merge requests of a project.
    pub async fn all_open_merge_requests(
        &self,
        project_id: u64,
    ) -> RemoteResult<Vec<MergeRequest>> {
        collect_pages(self.per_page, move |opts| {
            self.list_open_merge_requests(project_id, opts)
        })
        .await
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &str) -> RemoteResult<T> {
        let resp = self
            .http
            .get(url)
            .header("PRIVATE-TOKEN", &self.token)
            .send()
            .await?;

        Ok(ensure_success(resp)?.json().await?)
    }

    async fn get_page<T: DeserializeOwned>(
        &self,
        url: &str,
        filters: &[(&str, &str)],
        opts: PageOptions,
    ) -> RemoteResult<Page<T>> {
        let resp = self
            .http
            .get(url)
            .query(filters)
            .query(&[("page", opts.page), ("per_page", opts.per_page)])
            .header("PRIVATE-TOKEN", &self.token)
            .send()
            .await?;

        let resp = ensure_success(resp)?;
        let info = parse_page_info(resp.headers(), opts.page);
        let items: Vec<T> = resp.json().await?;

        Ok(Page { items, info })
    }
}

/// Appends `/api/v4` to an instance URL unless it is already there.
pub fn normalize_base_api(url: &str) -> Result<String, ClientConfigError> {
    let trimmed = url.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        return Err(ClientConfigError::InvalidBaseUrl("empty url".into()));
    }
    if !(trimmed.starts_with("http://") || trimmed.starts_with("https://")) {
        return Err(ClientConfigError::InvalidBaseUrl(format!(
            "{trimmed}: expected http:// or https://"
        )));
    }

    if trimmed.ends_with(API_SUFFIX) {
        Ok(trimmed.to_string())
    } else {
        Ok(format!("{trimmed}{API_SUFFIX}"))
    }
}

/// Reads GitLab pagination headers.
///
/// `x-total-pages` is omitted by GitLab for very large collections; in that
/// case the presence of `x-next-page` decides whether another page exists.
fn parse_page_info(headers: &HeaderMap, requested_page: u32) -> PageInfo {
    let get_header = |name: &str| -> Option<u32> {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.trim().parse().ok())
    };

    let current_page = get_header("x-page").unwrap_or(requested_page);
    let next_page = get_header("x-next-page");
    let total_pages = get_header("x-total-pages").unwrap_or(match next_page {
        Some(_) => current_page + 1,
        None => current_page,
    });

    PageInfo {
        current_page,
        total_pages,
        next_page,
    }
}

fn ensure_success(resp: Response) -> RemoteResult<Response> {
    if resp.status() == StatusCode::TOO_MANY_REQUESTS {
        let retry_after_secs = resp
            .headers()
            .get(RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.trim().parse().ok());
        return Err(RemoteError::RateLimited { retry_after_secs });
    }
    Ok(resp.error_for_status()?)
}

fn map_page<A, B>(page: Page<A>, f: impl FnMut(A) -> B) -> Page<B> {
    Page {
        items: page.items.into_iter().map(f).collect(),
        info: page.info,
    }
}

/// GitLab project response (subset).
#[derive(Debug, Deserialize)]
struct GitLabProject {
    id: u64,
    name: String,
}

#[derive(Debug, Deserialize)]
struct GitLabGroup {
    id: u64,
}

/// GitLab MR response (subset).
#[derive(Debug, Deserialize)]
struct GitLabMergeRequest {
    iid: u64,
    project_id: u64,
    title: String,
    web_url: String,
    state: String,
    created_at: DateTime<Utc>,
    author: GitLabUser,
}

impl GitLabMergeRequest {
    fn into_domain(self) -> MergeRequest {
        MergeRequest {
            iid: self.iid,
            project_id: self.project_id,
            title: self.title,
            author_name: self.author.name,
            created_at: self.created_at,
            web_url: self.web_url,
            state: MergeRequestState::from_api(&self.state),
        }
    }
}

#[derive(Debug, Deserialize)]
struct GitLabUser {
    name: String,
}

#[derive(Debug, Deserialize)]
struct GitLabApprovals {
    #[serde(default)]
    approved_by: Vec<GitLabApprover>,
}

#[derive(Debug, Deserialize)]
struct GitLabApprover {
    user: GitLabUser,
}
