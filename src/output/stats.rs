//! Statistics generation from crawl database
//!
//! This module provides functionality for extracting and displaying
//! run statistics from the storage layer.

use crate::state::CategoryStatus;
use crate::storage::{CategoryOutcome, RunRecord, Storage};
use crate::MeliError;
use chrono::{DateTime, Utc};
use std::collections::HashMap;

/// Statistics of the latest run
#[derive(Debug, Clone)]
pub struct RunStatistics {
    pub run: RunRecord,

    /// Run duration, when the run has finished
    pub duration_seconds: Option<u64>,

    /// Item rows stored under the run's date
    pub items_persisted: u64,

    /// Count of category outcomes by status
    pub outcomes_by_status: HashMap<CategoryStatus, u64>,

    /// Categories that ended below the coverage threshold
    pub under_covered: Vec<CategoryOutcome>,

    /// Categories whose crawl failed
    pub failed: Vec<CategoryOutcome>,
}

impl RunStatistics {
    pub fn total_categories(&self) -> u64 {
        self.outcomes_by_status.values().sum()
    }
}

/// Loads statistics of the latest run from storage
///
/// # Arguments
///
/// * `storage` - The storage backend to query
///
/// # Returns
///
/// * `Ok(Some(RunStatistics))` - Statistics of the latest run
/// * `Ok(None)` - The database holds no runs
/// * `Err(MeliError)` - Failed to query statistics
pub fn load_statistics(storage: &dyn Storage) -> Result<Option<RunStatistics>, MeliError> {
    let Some(run) = storage.get_latest_run()? else {
        return Ok(None);
    };

    let duration_seconds = match (
        run.started_at.parse::<DateTime<Utc>>(),
        run.finished_at.as_deref().map(str::parse::<DateTime<Utc>>),
    ) {
        (Ok(started), Some(Ok(finished))) => Some((finished - started).num_seconds().max(0) as u64),
        _ => None,
    };

    let items_persisted = storage.count_items_for_run_date(&run.run_date)?;
    let outcomes_by_status = storage.count_outcomes_by_status(run.id)?;

    let (under_covered, failed): (Vec<_>, Vec<_>) = storage
        .get_outcomes(run.id)?
        .into_iter()
        .filter(|o| !o.status.is_success())
        .partition(|o| o.status == CategoryStatus::UnderCovered);

    Ok(Some(RunStatistics {
        run,
        duration_seconds,
        items_persisted,
        outcomes_by_status,
        under_covered,
        failed,
    }))
}

/// Prints statistics to stdout in a formatted manner
///
/// # Arguments
///
/// * `stats` - The statistics to display
pub fn print_statistics(stats: &RunStatistics) {
    println!("=== Crawl Statistics ===\n");

    println!("Run {}:", stats.run.id);
    println!("  Date: {}", stats.run.run_date);
    println!("  Status: {}", stats.run.status.to_db_string());
    println!("  Started: {}", stats.run.started_at);
    if let Some(finished) = &stats.run.finished_at {
        println!("  Finished: {}", finished);
    }
    if let Some(seconds) = stats.duration_seconds {
        println!("  Duration: {}s", seconds);
    }
    println!("  Items persisted: {}", stats.items_persisted);
    println!();

    let total = stats.total_categories();
    println!("Categories by Status ({}):", total);
    for status in CategoryStatus::all() {
        let count = stats.outcomes_by_status.get(&status).copied().unwrap_or(0);
        let percentage = if total > 0 {
            (count as f64 / total as f64) * 100.0
        } else {
            0.0
        };
        println!("  {}: {} ({:.1}%)", status, count, percentage);
    }
    println!();

    if !stats.under_covered.is_empty() {
        println!("Under-covered Categories ({}):", stats.under_covered.len());
        for outcome in &stats.under_covered {
            println!(
                "  - {}{}: {}/{} distinct ({:.1}%), {} partition(s)",
                outcome.site_id,
                outcome.category_id,
                outcome.distinct_items,
                outcome.advertised_total,
                outcome.coverage() * 100.0,
                outcome.partitions_tried
            );
        }
        println!();
    }

    if !stats.failed.is_empty() {
        println!("Failed Categories ({}):", stats.failed.len());
        for outcome in &stats.failed {
            println!(
                "  - {}{}: {}",
                outcome.site_id,
                outcome.category_id,
                outcome.message.as_deref().unwrap_or("unknown error")
            );
        }
        println!();
    }
}
