//! Output module for run reports
//!
//! This module handles:
//! - Loading statistics of the latest run from storage
//! - Printing them for the `--stats` mode

pub mod stats;

pub use stats::{load_statistics, print_statistics, RunStatistics};
