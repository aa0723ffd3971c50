//! Quota-bounded pagination of one query signature
//!
//! This module handles the page walk of a single query, including:
//! - Computing how many pages the quota allows
//! - Issuing page requests with bounded concurrency
//! - Containing per-page failures so one bad page does not lose the rest

use crate::api::{ApiClient, Item, SearchQuery, SearchResult};
use crate::MeliError;
use futures::stream::{self, StreamExt};

/// Number of page requests needed to walk `total` results under `quota`
///
/// `min(ceil(total / limit), ceil(quota / limit))`. A zero limit yields zero
/// pages.
pub fn page_count(total: u64, limit: u64, quota: u64) -> u64 {
    if limit == 0 {
        return 0;
    }
    ceil_div(total, limit).min(ceil_div(quota, limit))
}

fn ceil_div(a: u64, b: u64) -> u64 {
    a / b + u64::from(a % b != 0)
}

/// Items collected by one paginated walk
#[derive(Debug, Default)]
pub struct FetchOutcome {
    /// Items of every page that answered, in page order
    pub items: Vec<Item>,

    /// Page requests issued
    pub pages_requested: u64,

    /// Pages that failed or could not be decoded
    pub failed_pages: u64,

    /// Pages that answered without a `results` field
    pub missing_results: u64,
}

/// Walks the pages of a query up to the quota
#[derive(Clone)]
pub struct PaginatedFetcher {
    client: ApiClient,
    quota: u64,
    max_in_flight: usize,
}

impl PaginatedFetcher {
    /// Creates a fetcher
    ///
    /// # Arguments
    ///
    /// * `client` - Authenticated API client
    /// * `quota` - Maximum number of items reachable through one query signature
    /// * `max_in_flight` - Maximum page requests running at once (at least 1)
    pub fn new(client: ApiClient, quota: u64, max_in_flight: usize) -> Self {
        Self {
            client,
            quota,
            max_in_flight: max_in_flight.max(1),
        }
    }

    pub fn quota(&self) -> u64 {
        self.quota
    }

    /// Issues the unpaged request of a query to learn its total and page size
    pub async fn probe(&self, query: &SearchQuery) -> Result<SearchResult, MeliError> {
        self.client.search(query).await
    }

    /// Fetches every page of `query` reachable under the quota
    ///
    /// Pages are requested at `offset = i * limit`. A page that fails or
    /// lacks `results` is logged and counted, and the walk continues.
    /// Authentication errors abort the walk.
    ///
    /// # Arguments
    ///
    /// * `query` - Query whose quota identity is walked
    /// * `total` - Result count reported for that query
    /// * `limit` - Page size reported for that query
    ///
    /// # Returns
    ///
    /// * `Ok(FetchOutcome)` - Items of every page that answered
    /// * `Err(MeliError)` - Authentication failed, or the page size is unusable
    pub async fn fetch_all(
        &self,
        query: &SearchQuery,
        total: u64,
        limit: u64,
    ) -> Result<FetchOutcome, MeliError> {
        if limit == 0 && total > 0 {
            return Err(MeliError::Payload {
                url: format!("search {}", query),
                message: "page limit of 0 with a non-empty result set".to_string(),
            });
        }

        let iterations = page_count(total, limit, self.quota);
        tracing::debug!(
            "Fetching {} page(s) of {} (total {}, limit {})",
            iterations,
            query,
            total,
            limit
        );

        let mut outcome = FetchOutcome::default();
        let mut pages = stream::iter(0..iterations)
            .map(|i| {
                let page = query.page(i * limit, limit);
                async move {
                    let result = self.client.search(&page).await;
                    (page, result)
                }
            })
            .buffered(self.max_in_flight);

        while let Some((page, result)) = pages.next().await {
            outcome.pages_requested += 1;
            match result {
                Ok(SearchResult {
                    results: Some(items),
                    ..
                }) => {
                    tracing::trace!("{} returned {} item(s)", page, items.len());
                    outcome.items.extend(items);
                }
                Ok(_) => {
                    tracing::warn!("Page without results: {}", page);
                    outcome.missing_results += 1;
                }
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    tracing::warn!("Page failed: {}: {}", page, e);
                    outcome.failed_pages += 1;
                }
            }
        }

        Ok(outcome)
    }
}
