//! Storage module for persisting crawl data
//!
//! This module handles all database operations for the crawler, including:
//! - SQLite database initialization and schema management
//! - OAuth token persistence
//! - Bulk item and category persistence
//! - Distinct-item counts used as the coverage ground truth
//! - Run and per-category outcome tracking

mod schema;
mod sqlite;
mod traits;

pub use sqlite::SqliteStorage;
pub use traits::{Storage, StorageError, StorageResult};

use crate::api::{split_site_prefix, Category, CategoryId, Item};
use crate::state::CategoryStatus;
use crate::MeliError;

use std::path::Path;
use std::sync::{Arc, Mutex};

/// Storage shared between the token store, the orchestrator and the workers
pub type SharedStorage = Arc<Mutex<dyn Storage + Send>>;

/// Initializes or opens a storage database
///
/// # Arguments
///
/// * `path` - Path to the SQLite database file
///
/// # Returns
///
/// * `Ok(SqliteStorage)` - Successfully initialized storage
/// * `Err(MeliError)` - Failed to initialize storage
pub fn open_storage(path: &Path) -> Result<SqliteStorage, MeliError> {
    SqliteStorage::new(path)
}

/// Wraps a storage backend for sharing across tasks
pub fn share<S: Storage + Send + 'static>(storage: S) -> SharedStorage {
    Arc::new(Mutex::new(storage))
}

/// An item row: `(site_id, item_id, run_date, category_id, item_json)`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemRecord {
    pub site_id: String,
    pub item_id: String,
    pub run_date: String,
    pub category_id: String,
    pub item_json: String,
}

impl ItemRecord {
    /// Formats a search result item for the category it was found in
    ///
    /// Ids are stored without their site prefix. Returns None for items
    /// without an `id`.
    pub fn from_item(item: &Item, category: &CategoryId, run_date: &str) -> Option<Self> {
        let raw_id = item.get("id")?.as_str()?;
        let item_id = split_site_prefix(raw_id)
            .map(|(_, local)| local)
            .unwrap_or(raw_id);
        let site_id = item
            .get("site_id")
            .and_then(|v| v.as_str())
            .unwrap_or_else(|| category.site().code());

        Some(Self {
            site_id: site_id.to_string(),
            item_id: item_id.to_string(),
            run_date: run_date.to_string(),
            category_id: category.local_id().to_string(),
            item_json: item.to_string(),
        })
    }
}

/// A category row: `(site_id, category_id, run_date, category_json)`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryRecord {
    pub site_id: String,
    pub category_id: String,
    pub run_date: String,
    pub category_json: String,
}

impl CategoryRecord {
    pub fn from_category(category: &Category, run_date: &str) -> Result<Self, MeliError> {
        let (site_id, local_id) = split_site_prefix(&category.id)
            .ok_or_else(|| MeliError::Storage(format!("Malformed category id '{}'", category.id)))?;

        Ok(Self {
            site_id: site_id.to_string(),
            category_id: local_id.to_string(),
            run_date: run_date.to_string(),
            category_json: serde_json::to_string(category)?,
        })
    }
}

/// How a category was enumerated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CrawlPath {
    /// Not decided (the base query failed)
    Unknown,
    Direct,
    Partitioned,
}

impl CrawlPath {
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Unknown => "unknown",
            Self::Direct => "direct",
            Self::Partitioned => "partitioned",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "unknown" => Some(Self::Unknown),
            "direct" => Some(Self::Direct),
            "partitioned" => Some(Self::Partitioned),
            _ => None,
        }
    }
}

/// Outcome of one category crawl within a run
#[derive(Debug, Clone, PartialEq)]
pub struct CategoryOutcome {
    pub run_id: i64,
    pub site_id: String,
    pub category_id: String,
    pub path: CrawlPath,
    pub advertised_total: u64,
    pub distinct_items: u64,
    pub partitions_tried: u64,
    pub failed_pages: u64,
    pub status: CategoryStatus,
    pub message: Option<String>,
}

impl CategoryOutcome {
    /// Fraction of the advertised total observed by distinct id
    pub fn coverage(&self) -> f64 {
        if self.advertised_total == 0 {
            1.0
        } else {
            self.distinct_items as f64 / self.advertised_total as f64
        }
    }
}

/// Represents a crawl run
#[derive(Debug, Clone)]
pub struct RunRecord {
    pub id: i64,
    pub started_at: String,
    pub finished_at: Option<String>,
    pub config_hash: String,
    pub run_date: String,
    pub status: RunStatus,
}

/// Status of a crawl run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Running,
    Completed,
    Failed,
}

impl RunStatus {
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "running" => Some(Self::Running),
            "completed" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}
