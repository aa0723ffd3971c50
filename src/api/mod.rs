//! Marketplace API access
//!
//! This module contains:
//! - The site registry and site-prefixed category ids
//! - Wire types of the search and category endpoints
//! - The authenticated request gateway

mod client;
mod sites;
mod types;

pub use client::{build_http_client, ApiClient};
pub use sites::{split_site_prefix, CategoryId, Site};
pub use types::{
    Category, CategoryRef, FacetFilter, FacetValue, FilterCombination, Item, Paging, SearchQuery,
    SearchResult, SortOption,
};
