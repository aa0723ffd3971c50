//! Request and response types of the marketplace REST API

use crate::api::sites::CategoryId;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// A search result item
///
/// Items are persisted verbatim, so they stay untyped JSON objects.
pub type Item = Value;

/// One candidate value of a facet filter
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FacetValue {
    pub id: String,

    #[serde(default)]
    pub name: String,

    /// Number of results the query would have with this value applied
    #[serde(default)]
    pub results: u64,
}

/// A narrowing dimension reported by the search endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FacetFilter {
    pub id: String,

    #[serde(default)]
    pub name: String,

    #[serde(default)]
    pub values: Vec<FacetValue>,
}

/// A sort order the search endpoint accepts
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortOption {
    pub id: String,

    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Paging {
    #[serde(default)]
    pub total: u64,

    #[serde(default)]
    pub offset: u64,

    #[serde(default)]
    pub limit: u64,
}

/// Body of `GET /sites/{site}/search`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SearchResult {
    /// Missing on some upstream responses; callers treat that as an anomaly
    #[serde(default)]
    pub results: Option<Vec<Item>>,

    #[serde(default)]
    pub paging: Paging,

    #[serde(default)]
    pub available_filters: Vec<FacetFilter>,

    #[serde(default)]
    pub available_sorts: Vec<SortOption>,

    /// Filters already applied to this query
    #[serde(default)]
    pub filters: Vec<FacetFilter>,
}

impl SearchResult {
    pub fn total(&self) -> u64 {
        self.paging.total
    }

    pub fn limit(&self) -> u64 {
        self.paging.limit
    }
}

/// A reference to a child category
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryRef {
    pub id: String,

    #[serde(default)]
    pub name: String,
}

/// Body of `GET /categories/{id}`
///
/// Unknown fields are kept so the category can be persisted verbatim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Category {
    pub id: String,

    #[serde(default)]
    pub name: String,

    #[serde(default)]
    pub children_categories: Vec<CategoryRef>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Category {
    pub fn is_leaf(&self) -> bool {
        self.children_categories.is_empty()
    }
}

/// An assignment of facet values to filter ids, optionally with a sort key
///
/// Keys are unique and keep insertion order, so the same combination always
/// renders the same query string.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct FilterCombination {
    assignments: Vec<(String, String)>,
}

impl FilterCombination {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets `filter_id` to `value_id`, replacing any previous assignment
    pub fn assign(&mut self, filter_id: impl Into<String>, value_id: impl Into<String>) {
        let filter_id = filter_id.into();
        let value_id = value_id.into();
        match self.assignments.iter_mut().find(|(k, _)| *k == filter_id) {
            Some(slot) => slot.1 = value_id,
            None => self.assignments.push((filter_id, value_id)),
        }
    }

    pub fn with(mut self, filter_id: impl Into<String>, value_id: impl Into<String>) -> Self {
        self.assign(filter_id, value_id);
        self
    }

    pub fn get(&self, filter_id: &str) -> Option<&str> {
        self.assignments
            .iter()
            .find(|(k, _)| k == filter_id)
            .map(|(_, v)| v.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.assignments
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.assignments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assignments.is_empty()
    }
}

impl<K, V> FromIterator<(K, V)> for FilterCombination
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut combination = Self::new();
        for (k, v) in iter {
            combination.assign(k, v);
        }
        combination
    }
}

impl fmt::Display for FilterCombination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.assignments.is_empty() {
            return f.write_str("(unfiltered)");
        }
        for (i, (k, v)) in self.assignments.iter().enumerate() {
            if i > 0 {
                f.write_str("&")?;
            }
            write!(f, "{}={}", k, v)?;
        }
        Ok(())
    }
}

const PAGE_WINDOW_KEYS: [&str; 2] = ["offset", "limit"];

/// A search request: a quota identity (category + assignments) plus a page window
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchQuery {
    pub category: CategoryId,
    pub assignments: FilterCombination,
    pub offset: Option<u64>,
    pub limit: Option<u64>,
}

impl SearchQuery {
    /// The unfiltered query for a whole category
    pub fn category(category: CategoryId) -> Self {
        Self {
            category,
            assignments: FilterCombination::new(),
            offset: None,
            limit: None,
        }
    }

    pub fn with_assignments(mut self, assignments: FilterCombination) -> Self {
        self.assignments = assignments;
        self
    }

    /// Same quota identity, different page window
    pub fn page(&self, offset: u64, limit: u64) -> Self {
        Self {
            category: self.category.clone(),
            assignments: self.assignments.clone(),
            offset: Some(offset),
            limit: Some(limit),
        }
    }

    /// Query-string parameters in a stable order, each key at most once
    ///
    /// An assigned `category` facet replaces the base category. The page
    /// window always comes from `offset`/`limit`, never from assignments.
    pub fn to_params(&self) -> Vec<(String, String)> {
        let mut params = vec![("category".to_string(), self.category.to_string())];
        if let Some(offset) = self.offset {
            params.push(("offset".to_string(), offset.to_string()));
        }
        if let Some(limit) = self.limit {
            params.push(("limit".to_string(), limit.to_string()));
        }
        for (k, v) in self.assignments.iter() {
            if PAGE_WINDOW_KEYS.contains(&k) {
                tracing::debug!("Ignoring assignment {}={} on the page window", k, v);
                continue;
            }
            match params.iter_mut().find(|(key, _)| key == k) {
                Some(slot) => slot.1 = v.to_string(),
                None => params.push((k.to_string(), v.to_string())),
            }
        }
        params
    }
}

impl fmt::Display for SearchQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "category={} [{}]", self.category, self.assignments)?;
        if let (Some(offset), Some(limit)) = (self.offset, self.limit) {
            write!(f, " offset={} limit={}", offset, limit)?;
        }
        Ok(())
    }
}
