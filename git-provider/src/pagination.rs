//! Page-by-page driver shared by every list endpoint.
//!
//! The caller requests page 1 and keeps following the server's next page
//! until `current_page >= total_pages`. Pages are fetched one at a time.

use std::future::Future;

use tracing::trace;

use crate::errors::RemoteResult;
use crate::types::{Page, PageOptions};

/// Fetches every page through `fetch` and concatenates the items.
///
/// The first error stops iteration and is returned as is.
pub async fn collect_pages<T, F, Fut>(per_page: u32, mut fetch: F) -> RemoteResult<Vec<T>>
where
    F: FnMut(PageOptions) -> Fut,
    Fut: Future<Output = RemoteResult<Page<T>>>,
{
    let mut opts = PageOptions::first(per_page);
    let mut items = Vec::new();

    loop {
        let page = fetch(opts).await?;
        trace!(
            page = page.info.current_page,
            total = page.info.total_pages,
            count = page.items.len(),
            "page fetched"
        );
        items.extend(page.items);

        if page.info.is_last() {
            break;
        }
        opts.page = page.info.following();
    }

    Ok(items)
}
