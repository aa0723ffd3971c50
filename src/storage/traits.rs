//! Storage traits and error types
//!
//! This module defines the trait interface for storage backends and
//! associated error types.

use crate::auth::AccessToken;
use crate::state::CategoryStatus;
use crate::storage::{CategoryOutcome, CategoryRecord, ItemRecord, RunRecord, RunStatus};
use std::collections::HashMap;
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Run not found: {0}")]
    RunNotFound(i64),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Trait for storage backend implementations
///
/// This is the persistence sink of the crawler: it stores item batches and
/// answers the distinct-item count that decides whether a category is
/// covered.
pub trait Storage {
    // ===== Run Management =====

    /// Creates a new crawl run
    ///
    /// # Arguments
    ///
    /// * `config_hash` - Hash of the configuration file
    /// * `run_date` - Date (YYYY-MM-DD) that items of this run are stored under
    ///
    /// # Returns
    ///
    /// The ID of the newly created run
    fn create_run(&mut self, config_hash: &str, run_date: &str) -> StorageResult<i64>;

    /// Gets a run by ID
    fn get_run(&self, run_id: i64) -> StorageResult<RunRecord>;

    /// Gets the most recent run
    fn get_latest_run(&self) -> StorageResult<Option<RunRecord>>;

    /// Updates the status of a run
    fn update_run_status(&mut self, run_id: i64, status: RunStatus) -> StorageResult<()>;

    /// Marks a run as completed with a finish timestamp
    fn complete_run(&mut self, run_id: i64) -> StorageResult<()>;

    // ===== Tokens =====

    /// Stores a newly issued token
    fn save_token(&mut self, token: &AccessToken) -> StorageResult<()>;

    /// Loads the token with the latest expiry, if any
    fn load_latest_token(&self) -> StorageResult<Option<AccessToken>>;

    // ===== Categories =====

    /// Bulk-inserts base categories, returning how many rows were new
    fn insert_base_categories(&mut self, records: &[CategoryRecord]) -> StorageResult<usize>;

    /// Bulk-inserts leaf categories, returning how many rows were new
    fn insert_categories(&mut self, records: &[CategoryRecord]) -> StorageResult<usize>;

    // ===== Items =====

    /// Bulk-inserts items, returning how many rows were new
    ///
    /// Rows that repeat `(site_id, item_id, run_date, category_id)` are
    /// ignored.
    fn insert_items(&mut self, records: &[ItemRecord]) -> StorageResult<usize>;

    /// Counts distinct items stored for a category on a run date
    fn count_distinct_items(
        &self,
        site_id: &str,
        category_id: &str,
        run_date: &str,
    ) -> StorageResult<u64>;

    /// Counts all items stored on a run date
    fn count_items_for_run_date(&self, run_date: &str) -> StorageResult<u64>;

    // ===== Outcomes =====

    /// Records the outcome of a category crawl
    fn record_outcome(&mut self, outcome: &CategoryOutcome) -> StorageResult<()>;

    /// Gets all outcomes recorded for a run
    fn get_outcomes(&self, run_id: i64) -> StorageResult<Vec<CategoryOutcome>>;

    /// Counts outcomes of a run by status
    fn count_outcomes_by_status(&self, run_id: i64)
        -> StorageResult<HashMap<CategoryStatus, u64>>;
}
