//! Crawler module for quota-aware catalog enumeration
//!
//! This module contains the core crawling logic, including:
//! - Facet pruning and lazy partition generation
//! - Quota-bounded pagination with bounded concurrency
//! - The per-category state machine with coverage checks
//! - Category discovery and overall run coordination

mod categories;
mod context;
mod coordinator;
mod fetcher;
mod optimizer;
mod orchestrator;
mod partition;

pub use categories::{find_leaf_categories, CategoryTree};
pub use context::CrawlContext;
pub use coordinator::{run_crawl, today, Coordinator, RunSummary};
pub use fetcher::{page_count, FetchOutcome, PaginatedFetcher};
pub use optimizer::optimize_filters;
pub use orchestrator::{CategoryReport, CrawlOrchestrator};
pub use partition::{
    build_dimensions, CartesianProduct, Dimension, IncreasingArity, PartitionStrategy, Partitions,
    SORT_KEY,
};
