//! Read-only GitLab client used to build merge request digests.
//!
//! The crate exposes one concrete client, [`GitLabClient`], plus a small
//! provider-agnostic model in [`types`]. Every list call is paginated; the
//! `all_*` helpers walk the pages sequentially via [`collect_pages`].

mod errors;
pub mod gitlab;
pub mod pagination;
pub mod types;

pub use errors::{ClientConfigError, GitProviderError, GitProviderResult, RemoteError, RemoteResult};
pub use gitlab::{GitLabClient, GitLabConfig};
pub use pagination::collect_pages;
pub use types::*;
