//! Final outcome of crawling one category
//!
//! Outcomes are recorded per run so under-covered and failed categories can
//! be reviewed without stopping the rest of the run.

use std::fmt;

/// Recorded outcome of a category crawl
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CategoryStatus {
    /// Total was under quota and a single paginated pass covered it
    Complete,

    /// Partitioned, and distinct coverage reached the threshold
    Covered,

    /// Partition stream ran out before coverage reached the threshold
    UnderCovered,

    /// The category could not be crawled (base query failed, storage error)
    Failed,
}

impl CategoryStatus {
    /// Returns true if the category is considered fully retrieved
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Complete | Self::Covered)
    }

    /// Converts the status to its database string representation
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Complete => "complete",
            Self::Covered => "covered",
            Self::UnderCovered => "under_covered",
            Self::Failed => "failed",
        }
    }

    /// Parses a status from its database string representation
    ///
    /// Returns None if the string doesn't match any known status.
    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "complete" => Some(Self::Complete),
            "covered" => Some(Self::Covered),
            "under_covered" => Some(Self::UnderCovered),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }

    pub fn all() -> [Self; 4] {
        [Self::Complete, Self::Covered, Self::UnderCovered, Self::Failed]
    }
}

impl fmt::Display for CategoryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.to_db_string())
    }
}
