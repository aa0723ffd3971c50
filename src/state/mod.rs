//! State module for tracking crawl progress
//!
//! # Components
//!
//! - `CrawlPhase`: the phase a category crawl is in (start, direct, partitioning, done...)
//! - `CategoryStatus`: the recorded outcome of a finished category crawl

mod category_status;
mod crawl_phase;

// Re-export main types
pub use category_status::CategoryStatus;
pub use crawl_phase::CrawlPhase;
