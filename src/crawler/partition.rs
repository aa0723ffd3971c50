//! Lazy generation of filter combinations
//!
//! Each optimized filter is one dimension whose coordinates are its value ids.
//! The sort options form one more dimension keyed `sort`. Two orderings are
//! available:
//!
//! - increasing arity: every single-dimension assignment first, then every
//!   pair of dimensions, and so on up to all dimensions at once
//! - cartesian: only full assignments, one value for every dimension
//!
//! Both are deterministic for a given input and yield each combination once.

use crate::api::{FacetFilter, FilterCombination, SortOption};
use crate::config::PartitionStrategyConfig;

/// Query key under which sort options are assigned
pub const SORT_KEY: &str = "sort";

/// One axis of the partition space
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dimension {
    pub key: String,
    pub values: Vec<String>,
}

/// Builds the dimensions in filter order, followed by the sort dimension
///
/// Repeated keys are merged into the first dimension with that key, and
/// dimensions without values are dropped.
pub fn build_dimensions(filters: &[FacetFilter], sorts: &[SortOption]) -> Vec<Dimension> {
    let mut dimensions: Vec<Dimension> = Vec::new();

    let pairs = filters
        .iter()
        .flat_map(|f| f.values.iter().map(move |v| (f.id.as_str(), v.id.as_str())))
        .chain(sorts.iter().map(|s| (SORT_KEY, s.id.as_str())));

    for (key, value) in pairs {
        match dimensions.iter_mut().find(|d| d.key == key) {
            Some(dimension) => dimension.values.push(value.to_string()),
            None => dimensions.push(Dimension {
                key: key.to_string(),
                values: vec![value.to_string()],
            }),
        }
    }

    dimensions.retain(|d| !d.values.is_empty());
    dimensions
}

/// Order in which partitions are tried
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PartitionStrategy {
    #[default]
    IncreasingArity,
    Cartesian,
}

impl PartitionStrategy {
    /// Returns the lazy partition stream for the given filters and sorts
    pub fn partitions(&self, filters: &[FacetFilter], sorts: &[SortOption]) -> Partitions {
        let dimensions = build_dimensions(filters, sorts);
        match self {
            Self::IncreasingArity => Partitions::IncreasingArity(IncreasingArity::new(dimensions)),
            Self::Cartesian => Partitions::Cartesian(CartesianProduct::new(dimensions)),
        }
    }

    /// Number of combinations the stream would yield, saturating at `u64::MAX`
    pub fn partition_count(&self, dimensions: &[Dimension]) -> u64 {
        match self {
            // every non-empty subset of dimensions times its value product
            Self::IncreasingArity => dimensions
                .iter()
                .fold(1u64, |acc, d| acc.saturating_mul(d.values.len() as u64 + 1))
                .saturating_sub(1),
            Self::Cartesian => {
                if dimensions.is_empty() {
                    0
                } else {
                    dimensions
                        .iter()
                        .fold(1u64, |acc, d| acc.saturating_mul(d.values.len() as u64))
                }
            }
        }
    }
}

impl From<PartitionStrategyConfig> for PartitionStrategy {
    fn from(config: PartitionStrategyConfig) -> Self {
        match config {
            PartitionStrategyConfig::IncreasingArity => Self::IncreasingArity,
            PartitionStrategyConfig::Cartesian => Self::Cartesian,
        }
    }
}

/// Partition stream of either strategy
#[derive(Debug, Clone)]
pub enum Partitions {
    IncreasingArity(IncreasingArity),
    Cartesian(CartesianProduct),
}

impl Iterator for Partitions {
    type Item = FilterCombination;

    fn next(&mut self) -> Option<Self::Item> {
        match self {
            Self::IncreasingArity(it) => it.next(),
            Self::Cartesian(it) => it.next(),
        }
    }
}

/// Mixed-radix counter over the values of a set of dimensions
///
/// The last position varies fastest.
#[derive(Debug, Clone)]
struct Odometer {
    radices: Vec<usize>,
    digits: Vec<usize>,
}

impl Odometer {
    fn new(radices: Vec<usize>) -> Self {
        let digits = vec![0; radices.len()];
        Self { radices, digits }
    }

    /// Moves to the next position; returns false after the last one
    fn advance(&mut self) -> bool {
        for pos in (0..self.digits.len()).rev() {
            self.digits[pos] += 1;
            if self.digits[pos] < self.radices[pos] {
                return true;
            }
            self.digits[pos] = 0;
        }
        false
    }
}

fn combination_at(dimensions: &[Dimension], chosen: &[usize], digits: &[usize]) -> FilterCombination {
    chosen
        .iter()
        .zip(digits)
        .map(|(&d, &v)| {
            let dimension = &dimensions[d];
            (dimension.key.clone(), dimension.values[v].clone())
        })
        .collect()
}

/// All assignments over 1, then 2, ... then all dimensions
///
/// Within one arity, dimension subsets come in lexicographic order of their
/// positions, and each subset's value product is walked with its last
/// dimension varying fastest.
#[derive(Debug, Clone)]
pub struct IncreasingArity {
    dimensions: Vec<Dimension>,
    chosen: Vec<usize>,
    odometer: Odometer,
    done: bool,
}

impl IncreasingArity {
    pub fn new(mut dimensions: Vec<Dimension>) -> Self {
        dimensions.retain(|d| !d.values.is_empty());
        let done = dimensions.is_empty();
        let mut it = Self {
            dimensions,
            chosen: vec![0],
            odometer: Odometer::new(Vec::new()),
            done,
        };
        it.reset_odometer();
        it
    }

    fn reset_odometer(&mut self) {
        let radices = self
            .chosen
            .iter()
            .filter_map(|&d| self.dimensions.get(d).map(|dim| dim.values.len()))
            .collect();
        self.odometer = Odometer::new(radices);
    }

    /// Advances `chosen` to the next k-subset, or to the first (k+1)-subset
    fn advance_subset(&mut self) -> bool {
        let n = self.dimensions.len();
        let k = self.chosen.len();

        // rightmost position that can still move
        let movable = (0..k).rev().find(|&i| self.chosen[i] < n - k + i);
        match movable {
            Some(i) => {
                self.chosen[i] += 1;
                for j in i + 1..k {
                    self.chosen[j] = self.chosen[j - 1] + 1;
                }
                true
            }
            None if k < n => {
                self.chosen = (0..=k).collect();
                true
            }
            None => false,
        }
    }
}

impl Iterator for IncreasingArity {
    type Item = FilterCombination;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        let combination = combination_at(&self.dimensions, &self.chosen, &self.odometer.digits);

        if !self.odometer.advance() {
            if self.advance_subset() {
                self.reset_odometer();
            } else {
                self.done = true;
            }
        }

        Some(combination)
    }
}

/// Full assignments only: one value from every dimension
#[derive(Debug, Clone)]
pub struct CartesianProduct {
    dimensions: Vec<Dimension>,
    chosen: Vec<usize>,
    odometer: Odometer,
    done: bool,
}

impl CartesianProduct {
    pub fn new(mut dimensions: Vec<Dimension>) -> Self {
        dimensions.retain(|d| !d.values.is_empty());
        let radices = dimensions.iter().map(|d| d.values.len()).collect();
        Self {
            done: dimensions.is_empty(),
            chosen: (0..dimensions.len()).collect(),
            odometer: Odometer::new(radices),
            dimensions,
        }
    }
}

impl Iterator for CartesianProduct {
    type Item = FilterCombination;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        let combination = combination_at(&self.dimensions, &self.chosen, &self.odometer.digits);
        if !self.odometer.advance() {
            self.done = true;
        }
        Some(combination)
    }
}
