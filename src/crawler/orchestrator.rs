//! Per-category crawl state machine
//!
//! A category is first queried without filters. When its total fits the
//! quota, one paginated pass covers it. Otherwise the advertised facets are
//! pruned and turned into a lazy partition stream; partitions are fetched one
//! at a time and the persisted distinct-item count is checked after each, so
//! the walk stops as soon as the category is covered.

use crate::api::{ApiClient, CategoryId, FilterCombination, Item, SearchQuery};
use crate::config::CrawlerConfig;
use crate::crawler::fetcher::{FetchOutcome, PaginatedFetcher};
use crate::crawler::optimizer::optimize_filters;
use crate::crawler::partition::{build_dimensions, PartitionStrategy};
use crate::state::{CategoryStatus, CrawlPhase};
use crate::storage::{CategoryOutcome, CrawlPath, ItemRecord, SharedStorage};
use crate::MeliError;

/// Tracks the phase of one category crawl and rejects illegal moves
#[derive(Debug)]
struct PhaseTracker {
    category: String,
    phase: CrawlPhase,
}

impl PhaseTracker {
    fn new(category: &CategoryId) -> Self {
        Self {
            category: category.to_string(),
            phase: CrawlPhase::Start,
        }
    }

    fn advance(&mut self, next: CrawlPhase) -> Result<(), MeliError> {
        if !self.phase.can_transition_to(next) {
            return Err(MeliError::InvalidTransition {
                from: self.phase,
                to: next,
            });
        }
        tracing::trace!("{}: {} -> {}", self.category, self.phase, next);
        self.phase = next;
        Ok(())
    }
}

/// Result of crawling one category
#[derive(Debug, Clone)]
pub struct CategoryReport {
    pub category: CategoryId,
    pub path: CrawlPath,
    pub phase: CrawlPhase,
    pub status: CategoryStatus,

    /// Total reported by the unfiltered category query
    pub advertised_total: u64,

    /// Distinct items persisted for the category when the crawl ended
    pub distinct_items: u64,

    /// Distinct-item count after each fetch pass, in order
    pub coverage_trace: Vec<u64>,

    pub partitions_tried: u64,
    pub pages_requested: u64,
    pub failed_pages: u64,
    pub missing_results: u64,

    /// Items dropped because they carried no id
    pub skipped_items: u64,

    pub message: Option<String>,
}

impl CategoryReport {
    fn new(category: &CategoryId) -> Self {
        Self {
            category: category.clone(),
            path: CrawlPath::Unknown,
            phase: CrawlPhase::Start,
            status: CategoryStatus::Failed,
            advertised_total: 0,
            distinct_items: 0,
            coverage_trace: Vec::new(),
            partitions_tried: 0,
            pages_requested: 0,
            failed_pages: 0,
            missing_results: 0,
            skipped_items: 0,
            message: None,
        }
    }

    /// Builds a failed report for a category whose crawl raised an error
    pub fn failed(category: &CategoryId, error: &MeliError) -> Self {
        let mut report = Self::new(category);
        report.message = Some(error.to_string());
        report
    }

    fn absorb(&mut self, fetched: &FetchOutcome) {
        self.pages_requested += fetched.pages_requested;
        self.failed_pages += fetched.failed_pages;
        self.missing_results += fetched.missing_results;
    }

    /// Fraction of the advertised total observed by distinct id
    pub fn coverage(&self) -> f64 {
        if self.advertised_total == 0 {
            1.0
        } else {
            self.distinct_items as f64 / self.advertised_total as f64
        }
    }

    pub fn to_outcome(&self, run_id: i64) -> CategoryOutcome {
        CategoryOutcome {
            run_id,
            site_id: self.category.site().code().to_string(),
            category_id: self.category.local_id().to_string(),
            path: self.path,
            advertised_total: self.advertised_total,
            distinct_items: self.distinct_items,
            partitions_tried: self.partitions_tried,
            failed_pages: self.failed_pages + self.missing_results,
            status: self.status,
            message: self.message.clone(),
        }
    }
}

/// Crawls single categories to coverage
pub struct CrawlOrchestrator {
    fetcher: PaginatedFetcher,
    storage: SharedStorage,
    strategy: PartitionStrategy,
    coverage_threshold: f64,
    quota: u64,
    run_date: String,
}

impl CrawlOrchestrator {
    /// Creates an orchestrator
    ///
    /// # Arguments
    ///
    /// * `client` - Authenticated API client
    /// * `storage` - Sink for items; also answers the distinct-item count
    /// * `settings` - Quota, threshold, strategy and page concurrency
    /// * `run_date` - Date (YYYY-MM-DD) items are stored under
    pub fn new(
        client: ApiClient,
        storage: SharedStorage,
        settings: &CrawlerConfig,
        run_date: impl Into<String>,
    ) -> Self {
        Self {
            fetcher: PaginatedFetcher::new(
                client,
                settings.quota,
                settings.max_concurrent_pages as usize,
            ),
            storage,
            strategy: settings.partition_strategy.into(),
            coverage_threshold: settings.coverage_threshold,
            quota: settings.quota,
            run_date: run_date.into(),
        }
    }

    pub fn run_date(&self) -> &str {
        &self.run_date
    }

    /// True once `distinct` reaches `total * threshold`
    pub fn is_covered(&self, distinct: u64, total: u64) -> bool {
        distinct as f64 >= total as f64 * self.coverage_threshold
    }

    /// Crawls one category until it is covered or its partitions run out
    ///
    /// Errors of the unfiltered query or of a single partition are contained
    /// in the report. Only authentication errors, storage failures and
    /// phase violations are returned as `Err`.
    ///
    /// # Arguments
    ///
    /// * `category` - The category to crawl
    ///
    /// # Returns
    ///
    /// * `Ok(CategoryReport)` - The crawl ended (covered, under-covered or failed)
    /// * `Err(MeliError)` - The crawl was aborted
    pub async fn crawl_category(&self, category: &CategoryId) -> Result<CategoryReport, MeliError> {
        let mut tracker = PhaseTracker::new(category);
        let mut report = CategoryReport::new(category);

        let result = self.drive(category, &mut tracker, &mut report).await;
        if let Err(e) = &result {
            if !tracker.phase.is_terminal() {
                tracker.advance(CrawlPhase::Aborted)?;
            }
            tracing::error!("Crawl of {} aborted in phase {}: {}", category, tracker.phase, e);
        }
        report.phase = tracker.phase;
        result.map(|_| report)
    }

    async fn drive(
        &self,
        category: &CategoryId,
        tracker: &mut PhaseTracker,
        report: &mut CategoryReport,
    ) -> Result<(), MeliError> {
        tracker.advance(CrawlPhase::Fetching)?;

        let base_query = SearchQuery::category(category.clone());
        let base = match self.fetcher.probe(&base_query).await {
            Ok(base) => base,
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => {
                tracing::warn!("Base query of {} failed: {}", category, e);
                report.message = Some(e.to_string());
                report.status = CategoryStatus::Failed;
                return tracker.advance(CrawlPhase::Done);
            }
        };

        let total = base.total();
        report.advertised_total = total;
        tracing::info!("Category {}: {} item(s) advertised", category, total);

        if total <= self.quota {
            report.path = CrawlPath::Direct;
            tracker.advance(CrawlPhase::Direct)?;

            let fetched = match self.fetcher.fetch_all(&base_query, total, base.limit()).await {
                Ok(fetched) => fetched,
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    tracing::warn!("Direct pass of {} failed: {}", category, e);
                    report.message = Some(e.to_string());
                    report.status = CategoryStatus::Failed;
                    return tracker.advance(CrawlPhase::Done);
                }
            };
            report.absorb(&fetched);
            let distinct = self.persist(category, &fetched.items, report)?;

            report.status = if self.is_covered(distinct, total) {
                CategoryStatus::Complete
            } else {
                tracing::warn!(
                    "Category {} under-covered on direct pass: {}/{} distinct",
                    category,
                    distinct,
                    total
                );
                CategoryStatus::UnderCovered
            };
            return tracker.advance(CrawlPhase::Done);
        }

        report.path = CrawlPath::Partitioned;
        let filters = optimize_filters(&base.available_filters, total);
        let dimensions = build_dimensions(&filters, &base.available_sorts);
        tracing::debug!(
            "Category {} exceeds quota ({} > {}); {} candidate partition(s) over {} dimension(s)",
            category,
            total,
            self.quota,
            self.strategy.partition_count(&dimensions),
            dimensions.len()
        );

        let mut covered = false;
        for (index, combination) in self
            .strategy
            .partitions(&filters, &base.available_sorts)
            .enumerate()
        {
            tracker.advance(CrawlPhase::Partitioning(index))?;
            report.partitions_tried += 1;

            let Some(distinct) = self.crawl_partition(category, combination, report).await? else {
                continue;
            };

            if self.is_covered(distinct, total) {
                tracing::info!(
                    "Category {} covered after {} partition(s): {}/{} distinct",
                    category,
                    report.partitions_tried,
                    distinct,
                    total
                );
                covered = true;
                break;
            }
        }

        if covered {
            report.status = CategoryStatus::Covered;
        } else {
            report.distinct_items = self.distinct_count(category)?;
            report.status = CategoryStatus::UnderCovered;
            report.message = Some(format!(
                "partitions exhausted after {} attempt(s)",
                report.partitions_tried
            ));
            tracing::warn!(
                "Category {} under-covered: {}/{} distinct after {} partition(s)",
                category,
                report.distinct_items,
                total,
                report.partitions_tried
            );
        }

        tracker.advance(CrawlPhase::Done)
    }

    /// Fetches and persists one partition
    ///
    /// Returns the distinct count after persisting, or None when the
    /// partition's own query failed and was skipped.
    async fn crawl_partition(
        &self,
        category: &CategoryId,
        combination: FilterCombination,
        report: &mut CategoryReport,
    ) -> Result<Option<u64>, MeliError> {
        let query = SearchQuery::category(category.clone()).with_assignments(combination);

        let probe = match self.fetcher.probe(&query).await {
            Ok(probe) => probe,
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => {
                tracing::warn!("Skipping partition {}: {}", query, e);
                return Ok(None);
            }
        };

        tracing::debug!("Partition {}: {} item(s)", query, probe.total());
        let fetched = match self.fetcher.fetch_all(&query, probe.total(), probe.limit()).await {
            Ok(fetched) => fetched,
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => {
                tracing::warn!("Skipping partition {}: {}", query, e);
                return Ok(None);
            }
        };

        report.absorb(&fetched);
        self.persist(category, &fetched.items, report).map(Some)
    }

    /// Stores a batch and returns the category's distinct count afterwards
    fn persist(
        &self,
        category: &CategoryId,
        items: &[Item],
        report: &mut CategoryReport,
    ) -> Result<u64, MeliError> {
        let records: Vec<ItemRecord> = items
            .iter()
            .filter_map(|item| ItemRecord::from_item(item, category, &self.run_date))
            .collect();

        let skipped = (items.len() - records.len()) as u64;
        if skipped > 0 {
            tracing::warn!("{} item(s) without id in {}", skipped, category);
            report.skipped_items += skipped;
        }

        let mut storage = self
            .storage
            .lock()
            .map_err(|_| MeliError::Storage("storage lock poisoned".to_string()))?;

        let inserted = storage.insert_items(&records)?;
        let distinct = storage.count_distinct_items(
            category.site().code(),
            category.local_id(),
            &self.run_date,
        )?;
        drop(storage);

        tracing::debug!(
            "{}: stored {} new of {} item(s), {} distinct",
            category,
            inserted,
            records.len(),
            distinct
        );

        report.distinct_items = distinct;
        report.coverage_trace.push(distinct);
        Ok(distinct)
    }

    fn distinct_count(&self, category: &CategoryId) -> Result<u64, MeliError> {
        let storage = self
            .storage
            .lock()
            .map_err(|_| MeliError::Storage("storage lock poisoned".to_string()))?;
        Ok(storage.count_distinct_items(
            category.site().code(),
            category.local_id(),
            &self.run_date,
        )?)
    }
}
