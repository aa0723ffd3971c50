//! Facet pruning ahead of partitioning
//!
//! A facet value whose result count already reaches the query total cannot
//! narrow the query, and neither can a filter left without values.

use crate::api::FacetFilter;

/// Keeps only the facet values that strictly reduce the result set
///
/// Filters keep their input order, and so do the values inside each filter.
/// Filters whose values are all dropped are removed.
///
/// # Arguments
///
/// * `filters` - Filters advertised by the unfiltered category query
/// * `total` - Result count of that query
pub fn optimize_filters(filters: &[FacetFilter], total: u64) -> Vec<FacetFilter> {
    filters
        .iter()
        .filter_map(|filter| {
            let values: Vec<_> = filter
                .values
                .iter()
                .filter(|value| value.results < total)
                .cloned()
                .collect();

            if values.is_empty() {
                tracing::trace!("Dropping filter '{}': no narrowing value", filter.id);
                return None;
            }

            Some(FacetFilter {
                id: filter.id.clone(),
                name: filter.name.clone(),
                values,
            })
        })
        .collect()
}
