//! Crawler coordinator - run-level orchestration
//!
//! This module drives a whole run:
//! - Recording the run and its date
//! - Discovering and persisting base and leaf categories
//! - Crawling leaf categories on a bounded worker pool
//! - Recording one outcome per category and halting on fatal errors

use crate::api::{ApiClient, Category, CategoryId};
use crate::config::Config;
use crate::crawler::categories::{find_leaf_categories, CategoryTree};
use crate::crawler::context::CrawlContext;
use crate::crawler::orchestrator::{CategoryReport, CrawlOrchestrator};
use crate::state::CategoryStatus;
use crate::storage::{CategoryRecord, RunStatus, SharedStorage, Storage};
use crate::MeliError;
use futures::stream::{self, StreamExt};
use std::collections::{HashMap, HashSet};
use std::sync::MutexGuard;

/// Summary of a finished run
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    pub run_id: i64,
    pub run_date: String,
    pub base_categories: usize,
    pub leaf_categories: usize,
    pub by_status: HashMap<CategoryStatus, u64>,
    pub items_persisted: u64,
}

impl RunSummary {
    pub fn count(&self, status: CategoryStatus) -> u64 {
        self.by_status.get(&status).copied().unwrap_or(0)
    }
}

/// Main crawler coordinator structure
pub struct Coordinator {
    config: Config,
    client: ApiClient,
    storage: SharedStorage,
    orchestrator: CrawlOrchestrator,
    config_hash: String,
    run_date: String,
}

impl Coordinator {
    /// Creates a new coordinator instance
    ///
    /// # Arguments
    ///
    /// * `config` - The crawler configuration
    /// * `context` - Storage and authenticated client
    /// * `config_hash` - Hash recorded with the run
    /// * `run_date` - Date (YYYY-MM-DD) items of this run are stored under
    pub fn new(
        config: Config,
        context: CrawlContext,
        config_hash: impl Into<String>,
        run_date: impl Into<String>,
    ) -> Self {
        let run_date = run_date.into();
        let orchestrator = CrawlOrchestrator::new(
            context.client.clone(),
            context.storage.clone(),
            &config.crawler,
            run_date.clone(),
        );

        Self {
            config,
            client: context.client,
            storage: context.storage,
            orchestrator,
            config_hash: config_hash.into(),
            run_date,
        }
    }

    /// Runs a full crawl: base categories, leaf discovery, item crawl
    ///
    /// # Returns
    ///
    /// * `Ok(RunSummary)` - Every category has an outcome
    /// * `Err(MeliError)` - The run was aborted; the run row is marked failed
    pub async fn run(&self) -> Result<RunSummary, MeliError> {
        let run_id = self.lock()?.create_run(&self.config_hash, &self.run_date)?;
        tracing::info!("Starting crawl run {} on {}", run_id, self.run_date);

        match self.run_inner(run_id).await {
            Ok(summary) => Ok(summary),
            Err(e) => {
                self.fail_run(run_id);
                Err(e)
            }
        }
    }

    /// Crawls a single category as its own run
    pub async fn run_category(&self, category: &CategoryId) -> Result<RunSummary, MeliError> {
        let run_id = self.lock()?.create_run(&self.config_hash, &self.run_date)?;
        tracing::info!("Starting crawl run {} for category {}", run_id, category);

        let mut summary = RunSummary {
            run_id,
            run_date: self.run_date.clone(),
            leaf_categories: 1,
            ..RunSummary::default()
        };

        if let Err(e) = self.crawl_leaves(run_id, vec![category.clone()], &mut summary).await {
            self.fail_run(run_id);
            return Err(e);
        }

        self.finish(run_id, summary)
    }

    async fn run_inner(&self, run_id: i64) -> Result<RunSummary, MeliError> {
        let bases = self.base_categories().await?;
        let trees = self.discover(&bases).await?;

        let roots: Vec<&Category> = trees.iter().map(|t| &t.root).collect();
        let leaves: Vec<&Category> = trees.iter().flat_map(|t| t.leaves.iter()).collect();
        self.persist_categories(&roots, &leaves)?;

        let mut seen = HashSet::with_capacity(leaves.len());
        let mut leaf_ids = Vec::with_capacity(leaves.len());
        for leaf in &leaves {
            match CategoryId::parse(&leaf.id) {
                Ok(id) if seen.insert(id.clone()) => leaf_ids.push(id),
                Ok(_) => tracing::debug!("Leaf category {} reached twice", leaf.id),
                Err(e) => tracing::warn!("Skipping leaf category {}: {}", leaf.id, e),
            }
        }

        tracing::info!(
            "{} base categor(ies), {} leaf categor(ies) to crawl",
            trees.len(),
            leaf_ids.len()
        );

        let mut summary = RunSummary {
            run_id,
            run_date: self.run_date.clone(),
            base_categories: trees.len(),
            leaf_categories: leaf_ids.len(),
            ..RunSummary::default()
        };

        self.crawl_leaves(run_id, leaf_ids, &mut summary).await?;
        self.finish(run_id, summary)
    }

    /// Lists the site's base categories, restricted to the allow-list if set
    async fn base_categories(&self) -> Result<Vec<CategoryId>, MeliError> {
        let allow = &self.config.crawler.base_categories;
        let listed = self.client.get_site_categories().await?;

        let mut bases = Vec::new();
        for category in listed {
            if !allow.is_empty() && !allow.contains(&category.id) {
                continue;
            }
            match CategoryId::parse(&category.id) {
                Ok(id) => bases.push(id),
                Err(e) => tracing::warn!("Skipping base category {}: {}", category.id, e),
            }
        }

        for id in allow {
            if !bases.iter().any(|b| b.as_str() == id) {
                tracing::warn!("Base category {} is not listed by the site", id);
            }
        }

        Ok(bases)
    }

    /// Walks every base category on the worker pool
    async fn discover(&self, bases: &[CategoryId]) -> Result<Vec<CategoryTree>, MeliError> {
        let workers = self.workers();
        let mut walks = stream::iter(bases)
            .map(|base| async move { (base, find_leaf_categories(&self.client, base).await) })
            .buffered(workers);

        let mut trees = Vec::with_capacity(bases.len());
        while let Some((base, result)) = walks.next().await {
            match result {
                Ok(tree) => trees.push(tree),
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => tracing::warn!("Skipping base category {}: {}", base, e),
            }
        }
        Ok(trees)
    }

    fn persist_categories(&self, roots: &[&Category], leaves: &[&Category]) -> Result<(), MeliError> {
        let to_records = |categories: &[&Category]| -> Vec<CategoryRecord> {
            categories
                .iter()
                .filter_map(|c| match CategoryRecord::from_category(c, &self.run_date) {
                    Ok(record) => Some(record),
                    Err(e) => {
                        tracing::warn!("Not storing category {}: {}", c.id, e);
                        None
                    }
                })
                .collect()
        };

        let mut storage = self.lock()?;
        storage.insert_base_categories(&to_records(roots))?;
        storage.insert_categories(&to_records(leaves))?;
        Ok(())
    }

    /// Crawls categories on the worker pool, recording each outcome
    ///
    /// A fatal error stops the pool: categories not yet finished get no
    /// outcome.
    async fn crawl_leaves(
        &self,
        run_id: i64,
        categories: Vec<CategoryId>,
        summary: &mut RunSummary,
    ) -> Result<(), MeliError> {
        let total = categories.len();
        let mut crawls = stream::iter(categories)
            .map(|category| async move {
                let result = self.orchestrator.crawl_category(&category).await;
                (category, result)
            })
            .buffer_unordered(self.workers());

        let mut finished = 0;
        while let Some((category, result)) = crawls.next().await {
            let report = match result {
                Ok(report) => report,
                Err(e) if e.is_fatal() => {
                    tracing::error!("Halting run {}: {}", run_id, e);
                    return Err(e);
                }
                Err(e) => CategoryReport::failed(&category, &e),
            };

            self.lock()?.record_outcome(&report.to_outcome(run_id))?;
            *summary.by_status.entry(report.status).or_insert(0) += 1;

            finished += 1;
            tracing::info!(
                "[{}/{}] {} {} ({}/{} distinct, {:.1}%)",
                finished,
                total,
                report.category,
                report.status,
                report.distinct_items,
                report.advertised_total,
                report.coverage() * 100.0
            );
        }

        Ok(())
    }

    fn finish(&self, run_id: i64, mut summary: RunSummary) -> Result<RunSummary, MeliError> {
        let mut storage = self.lock()?;
        summary.items_persisted = storage.count_items_for_run_date(&self.run_date)?;
        storage.complete_run(run_id)?;
        drop(storage);

        tracing::info!(
            "Run {} completed: {} complete, {} covered, {} under-covered, {} failed, {} item rows",
            run_id,
            summary.count(CategoryStatus::Complete),
            summary.count(CategoryStatus::Covered),
            summary.count(CategoryStatus::UnderCovered),
            summary.count(CategoryStatus::Failed),
            summary.items_persisted
        );
        Ok(summary)
    }

    fn fail_run(&self, run_id: i64) {
        let result = self
            .lock()
            .and_then(|mut s| Ok(s.update_run_status(run_id, RunStatus::Failed)?));
        if let Err(e) = result {
            tracing::error!("Failed to mark run {} as failed: {}", run_id, e);
        }
    }

    fn workers(&self) -> usize {
        (self.config.crawler.max_concurrent_categories as usize).max(1)
    }

    fn lock(&self) -> Result<MutexGuard<'_, dyn Storage + Send + 'static>, MeliError> {
        self.storage
            .lock()
            .map_err(|_| MeliError::Storage("storage lock poisoned".to_string()))
    }
}

/// Today's date in the form items are stored under
pub fn today() -> String {
    chrono::Local::now().format("%Y-%m-%d").to_string()
}

/// Runs a crawl with an authenticated context
///
/// This is the main entry point for a crawl once a token is installed. With
/// `category` set only that category is crawled; otherwise the full run
/// walks every base category of the site.
///
/// # Arguments
///
/// * `config` - The crawler configuration
/// * `context` - Storage and authenticated client
/// * `config_hash` - Hash recorded with the run
/// * `category` - Optional single category to crawl
///
/// # Returns
///
/// * `Ok(RunSummary)` - Crawl completed
/// * `Err(MeliError)` - Crawl aborted
///
/// # Example
///
/// ```no_run
/// use meli_crawler::config::load_config_with_hash;
/// use meli_crawler::crawler::{run_crawl, CrawlContext};
/// use std::path::Path;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let (config, hash) = load_config_with_hash(Path::new("config.toml"))?;
/// let context = CrawlContext::open(&config)?;
/// context.load_stored_token().await?;
/// run_crawl(config, context, &hash, None).await?;
/// # Ok(())
/// # }
/// ```
pub async fn run_crawl(
    config: Config,
    context: CrawlContext,
    config_hash: &str,
    category: Option<CategoryId>,
) -> Result<RunSummary, MeliError> {
    let coordinator = Coordinator::new(config, context, config_hash, today());
    match category {
        Some(category) => coordinator.run_category(&category).await,
        None => coordinator.run().await,
    }
}
