//! Phases of a single category crawl
//!
//! ```text
//! Start -> Fetching -> Direct ---------------> Done
//!                   \-> Partitioning(0..n) --> Done
//!          (any non-terminal phase) ---------> Aborted
//! ```

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CrawlPhase {
    /// Nothing requested yet
    Start,

    /// The unfiltered category query is in flight
    Fetching,

    /// Total is under quota; one paginated pass covers the category
    Direct,

    /// Processing the partition with the given zero-based index
    Partitioning(usize),

    /// Finished (covered or best effort)
    Done,

    /// Stopped by a fatal error
    Aborted,
}

impl CrawlPhase {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Aborted)
    }

    /// Returns true if moving from `self` to `next` is a legal transition
    pub fn can_transition_to(&self, next: CrawlPhase) -> bool {
        use CrawlPhase::*;

        if next == Aborted {
            return !self.is_terminal();
        }

        match (*self, next) {
            (Start, Fetching) => true,
            (Fetching, Direct) | (Fetching, Partitioning(0)) => true,
            (Direct, Done) => true,
            (Partitioning(i), Partitioning(j)) => j == i + 1,
            (Partitioning(_), Done) => true,
            // a partitioned category whose partition stream is empty
            (Fetching, Done) => true,
            _ => false,
        }
    }
}

impl fmt::Display for CrawlPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Start => f.write_str("start"),
            Self::Fetching => f.write_str("fetching"),
            Self::Direct => f.write_str("direct"),
            Self::Partitioning(i) => write!(f, "partitioning({})", i),
            Self::Done => f.write_str("done"),
            Self::Aborted => f.write_str("aborted"),
        }
    }
}
