//! Fetcher: pulls both catalog listings for one run
//!
//! - **Category listings**: one request per [`CategoryKey`], all in flight at
//!   once. A failed category never cancels its siblings; each yields its own
//!   [`CategoryOutcome`].
//! - **Candidate listing**: page-by-page, strictly sequential, until the first
//!   empty page or the page ceiling. IDs are deduplicated across pages, first
//!   occurrence wins.
//!
//! Every request goes through the same [`RetryPolicy`].

pub mod retry;
pub mod source;

pub use retry::RetryPolicy;
pub use source::{CatalogSource, HttpCatalogSource};

use crate::catalog::{decode_records, RawRecord, TitleId};
use crate::classifier::CategoryKey;
use crate::error::FetchError;
use futures::future::join_all;
use std::collections::btree_map::Entry;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info, warn};
use wtn_common::config::ApiConfig;

/// Where the two listings live and how far to page
#[derive(Debug, Clone)]
pub struct Endpoints {
    pub category_url: String,
    pub finished_url: String,
    pub page_size: u32,
    pub max_pages: u32,
}

impl Endpoints {
    pub fn category(&self, key: CategoryKey) -> String {
        format!("{}?week={}", self.category_url, key.api_key())
    }

    /// Pages are 1-based
    pub fn candidate_page(&self, page: u32) -> String {
        format!(
            "{}?page={}&pageSize={}",
            self.finished_url, page, self.page_size
        )
    }
}

impl From<&ApiConfig> for Endpoints {
    fn from(api: &ApiConfig) -> Self {
        Self {
            category_url: api.category_url.clone(),
            finished_url: api.finished_url.clone(),
            page_size: api.page_size.max(1),
            max_pages: api.max_pages.max(1),
        }
    }
}

/// Terminal result of one category request
#[derive(Debug, Clone)]
pub enum CategoryOutcome {
    Fetched(Vec<RawRecord>),
    Failed(FetchError),
}

#[derive(Debug, Clone)]
pub struct CategoryResult {
    pub key: CategoryKey,
    pub outcome: CategoryOutcome,
}

impl CategoryResult {
    pub fn fetched(key: CategoryKey, records: Vec<RawRecord>) -> Self {
        Self {
            key,
            outcome: CategoryOutcome::Fetched(records),
        }
    }

    pub fn failed(key: CategoryKey, error: FetchError) -> Self {
        Self {
            key,
            outcome: CategoryOutcome::Failed(error),
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self.outcome, CategoryOutcome::Failed(_))
    }
}

/// Deduplicated candidate listing
#[derive(Debug, Clone, Default)]
pub struct CandidateListing {
    pub records: BTreeMap<TitleId, RawRecord>,
    /// Pages that returned a listing (the terminating empty page included)
    pub pages_fetched: u32,
    /// Pagination stopped at the ceiling rather than on an empty page
    pub hit_page_ceiling: bool,
    /// Set when a page failed after retries; `records` holds the pages before it
    pub failure: Option<FetchError>,
}

impl CandidateListing {
    pub fn is_complete(&self) -> bool {
        self.failure.is_none()
    }
}

/// Catalog fetcher with an explicit retry policy
pub struct Fetcher {
    source: Arc<dyn CatalogSource>,
    retry: RetryPolicy,
    endpoints: Endpoints,
}

impl Fetcher {
    pub fn new(source: Arc<dyn CatalogSource>, retry: RetryPolicy, endpoints: Endpoints) -> Self {
        Self {
            source,
            retry,
            endpoints,
        }
    }

    pub fn endpoints(&self) -> &Endpoints {
        &self.endpoints
    }

    /// Fetch one URL under the retry policy
    ///
    /// Exhausted retries surface the last error; the caller decides whether
    /// that is fatal.
    pub async fn fetch(&self, url: &str) -> Result<Vec<serde_json::Value>, FetchError> {
        self.retry.run(url, || self.source.fetch(url)).await
    }

    /// Fetch every category listing concurrently
    ///
    /// Results come back in [`CategoryKey::ALL`] order, one per key.
    pub async fn fetch_categories(&self) -> Vec<CategoryResult> {
        let requests = CategoryKey::ALL.iter().map(|&key| async move {
            let url = self.endpoints.category(key);
            match self.fetch(&url).await {
                Ok(values) => {
                    let records = decode_records(&values, &format!("category:{}", key.api_key()));
                    debug!(
                        category = key.api_key(),
                        label = key.display_label(),
                        count = records.len(),
                        "Category listing fetched"
                    );
                    CategoryResult::fetched(key, records)
                }
                Err(e) => {
                    warn!(
                        category = key.api_key(),
                        error = %e,
                        "Category listing unavailable this run"
                    );
                    CategoryResult::failed(key, e)
                }
            }
        });

        join_all(requests).await
    }

    /// Walk the candidate listing page by page
    ///
    /// Stops on the first empty page. Hitting `max_pages` is logged as a
    /// warning and the pages gathered so far are kept. A page that still
    /// fails after retries ends pagination the same way: the failure is
    /// recorded on the listing and the earlier pages are kept.
    pub async fn fetch_candidates(&self) -> CandidateListing {
        let mut listing = CandidateListing::default();

        for page in 1..=self.endpoints.max_pages {
            let url = self.endpoints.candidate_page(page);
            let values = match self.fetch(&url).await {
                Ok(values) => values,
                Err(e) => {
                    warn!(
                        page,
                        error = %e,
                        kept = listing.records.len(),
                        "Candidate listing unavailable past this page this run"
                    );
                    listing.failure = Some(e);
                    break;
                }
            };
            listing.pages_fetched = page;

            if values.is_empty() {
                debug!(page, "Candidate listing exhausted");
                break;
            }

            let records = decode_records(&values, &format!("candidate:page {}", page));
            let mut duplicates = 0usize;
            for record in records {
                match listing.records.entry(record.id) {
                    Entry::Vacant(slot) => {
                        slot.insert(record);
                    }
                    Entry::Occupied(_) => duplicates += 1,
                }
            }
            if duplicates > 0 {
                debug!(page, duplicates, "Ignored records repeated from earlier pages");
            }

            if page == self.endpoints.max_pages {
                listing.hit_page_ceiling = true;
                warn!(
                    max_pages = self.endpoints.max_pages,
                    "Candidate listing still returning data at page ceiling; stopping"
                );
            }
        }

        info!(
            pages = listing.pages_fetched,
            candidates = listing.records.len(),
            complete = listing.is_complete(),
            "Candidate listing fetched"
        );

        listing
    }
}
