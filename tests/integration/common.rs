//! Shared fixtures: configuration, tokens and a synthetic marketplace
//!
//! The marketplace answers `/sites/MLB/search` from query parameters the way
//! the real endpoint does: it filters a deterministic item set by the facet
//! assignments, reports the remaining facets with their counts, and serves
//! the requested page window.

use chrono::{Duration, Utc};
use meli_crawler::auth::AccessToken;
use meli_crawler::config::{ApiConfig, Config, CrawlerConfig, OutputConfig};
use meli_crawler::crawler::CrawlContext;
use meli_crawler::storage::{share, SharedStorage, SqliteStorage};
use serde_json::{json, Value};
use std::collections::{HashMap, HashSet};
use wiremock::matchers::{method, path, path_regex};
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

pub const RUN_DATE: &str = "2024-05-01";

/// Facets every synthetic item carries
pub const FACETS: [&str; 2] = ["shipping", "condition"];

pub fn test_config(server_uri: &str) -> Config {
    Config {
        api: ApiConfig {
            client_id: "1234".to_string(),
            client_secret: "secret".to_string(),
            redirect_uri: "https://example.com/callback".to_string(),
            site_id: "MLB".to_string(),
            api_base: server_uri.to_string(),
            auth_base: Some(server_uri.to_string()),
        },
        crawler: CrawlerConfig::default(),
        output: OutputConfig {
            database_path: ":memory:".to_string(),
        },
    }
}

pub fn token(access: &str, expires_in_secs: i64) -> AccessToken {
    AccessToken {
        access_token: access.to_string(),
        refresh_token: Some("TG-refresh".to_string()),
        token_type: "bearer".to_string(),
        scope: "offline_access read".to_string(),
        user_id: Some(42),
        expires_in: expires_in_secs.max(0) as u64,
        expires_at: Utc::now() + Duration::seconds(expires_in_secs),
    }
}

/// Body of a successful `/oauth/token` response
pub fn token_body(access: &str) -> Value {
    json!({
        "access_token": access,
        "token_type": "bearer",
        "expires_in": 21600,
        "scope": "offline_access read",
        "user_id": 42,
        "refresh_token": "TG-rotated"
    })
}

/// Builds a context over an in-memory database with a valid token installed
pub async fn context(config: &Config) -> (CrawlContext, SharedStorage) {
    let storage = share(SqliteStorage::open_in_memory().unwrap());
    let context = CrawlContext::with_storage(config, storage.clone()).unwrap();
    context.tokens.set_token(token("APP_USR-valid", 21600)).await;
    (context, storage)
}

/// Search requests received so far that asked for a page window
pub async fn page_requests(server: &MockServer) -> Vec<Request> {
    search_requests(server)
        .await
        .into_iter()
        .filter(|r| r.url.query_pairs().any(|(k, _)| k == "offset"))
        .collect()
}

pub async fn search_requests(server: &MockServer) -> Vec<Request> {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .into_iter()
        .filter(|r| r.url.path().ends_with("/search"))
        .collect()
}

/// A category of the synthetic marketplace
#[derive(Debug, Clone)]
pub struct FakeCategory {
    pub id: String,
    pub size: u64,

    /// Total reported by the unfiltered query instead of the real size
    pub advertised_total: Option<u64>,

    /// Page offsets whose response omits `results`
    pub missing_results: HashSet<u64>,

    /// Page offsets answered with HTTP 500
    pub failing_pages: HashSet<u64>,
}

impl FakeCategory {
    pub fn new(id: &str, size: u64) -> Self {
        Self {
            id: id.to_string(),
            size,
            advertised_total: None,
            missing_results: HashSet::new(),
            failing_pages: HashSet::new(),
        }
    }

    pub fn advertising(mut self, total: u64) -> Self {
        self.advertised_total = Some(total);
        self
    }

    pub fn missing_results_at(mut self, offset: u64) -> Self {
        self.missing_results.insert(offset);
        self
    }

    pub fn failing_at(mut self, offset: u64) -> Self {
        self.failing_pages.insert(offset);
        self
    }
}

fn attribute(n: u64, facet: &str) -> &'static str {
    match facet {
        "shipping" => ["free", "paid"][(n % 2) as usize],
        "condition" => ["new", "used", "refurbished"][(n % 3) as usize],
        _ => "",
    }
}

fn price(n: u64) -> u64 {
    (n * 7919) % 1000
}

fn item_json(category: &str, n: u64) -> Value {
    json!({
        "id": format!("MLB{}", 1_000_000 + n),
        "site_id": "MLB",
        "category_id": category,
        "title": format!("Item {}", n),
        "price": price(n),
        "shipping": {"free_shipping": attribute(n, "shipping") == "free"},
        "condition": attribute(n, "condition"),
    })
}

/// Search endpoint of the synthetic marketplace
#[derive(Debug, Clone)]
pub struct Marketplace {
    categories: HashMap<String, FakeCategory>,
    limit: u64,
    sorts: Vec<String>,
}

impl Marketplace {
    pub fn new(limit: u64) -> Self {
        Self {
            categories: HashMap::new(),
            limit,
            sorts: vec!["price_asc".to_string(), "price_desc".to_string()],
        }
    }

    pub fn with_category(mut self, category: FakeCategory) -> Self {
        self.categories.insert(category.id.clone(), category);
        self
    }

    pub async fn mount(self, server: &MockServer) {
        Mock::given(method("GET"))
            .and(path("/sites/MLB/search"))
            .respond_with(self)
            .mount(server)
            .await;
    }

    fn search(&self, query: &HashMap<String, String>) -> ResponseTemplate {
        let Some(category) = query.get("category").and_then(|id| self.categories.get(id)) else {
            return ResponseTemplate::new(404).set_body_json(json!({"message": "category not found"}));
        };

        let assigned: Vec<(&str, &str)> = query
            .iter()
            .filter(|(k, _)| FACETS.contains(&k.as_str()))
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect();

        let mut matching: Vec<u64> = (0..category.size)
            .filter(|&n| assigned.iter().all(|(k, v)| attribute(n, k) == *v))
            .collect();
        match query.get("sort").map(String::as_str) {
            Some("price_asc") => matching.sort_by_key(|&n| (price(n), n)),
            Some("price_desc") => matching.sort_by_key(|&n| (std::cmp::Reverse(price(n)), n)),
            _ => {}
        }

        let total = if assigned.is_empty() {
            category.advertised_total.unwrap_or(category.size)
        } else {
            matching.len() as u64
        };

        let paged = query.contains_key("offset");
        let offset: u64 = query.get("offset").and_then(|v| v.parse().ok()).unwrap_or(0);
        let limit: u64 = query
            .get("limit")
            .and_then(|v| v.parse().ok())
            .unwrap_or(self.limit)
            .min(self.limit);

        if paged && category.failing_pages.contains(&offset) {
            return ResponseTemplate::new(500).set_body_json(json!({"message": "internal error"}));
        }

        let available_filters: Vec<Value> = FACETS
            .iter()
            .filter(|facet| !assigned.iter().any(|(k, _)| k == *facet))
            .map(|facet| {
                let mut counts: Vec<(&str, u64)> = Vec::new();
                for &n in &matching {
                    let value = attribute(n, facet);
                    match counts.iter_mut().find(|(v, _)| *v == value) {
                        Some(slot) => slot.1 += 1,
                        None => counts.push((value, 1)),
                    }
                }
                json!({
                    "id": facet,
                    "name": facet,
                    "values": counts
                        .iter()
                        .map(|(v, c)| json!({"id": v, "name": v, "results": c}))
                        .collect::<Vec<_>>()
                })
            })
            .collect();

        let results: Vec<Value> = matching
            .iter()
            .skip(offset as usize)
            .take(limit as usize)
            .map(|&n| item_json(&category.id, n))
            .collect();

        let mut body = json!({
            "site_id": "MLB",
            "paging": {"total": total, "offset": offset, "limit": limit},
            "results": results,
            "available_filters": available_filters,
            "available_sorts": self
                .sorts
                .iter()
                .map(|s| json!({"id": s, "name": s}))
                .collect::<Vec<_>>(),
            "filters": [{"id": "category", "name": "Categorias", "values": [{"id": category.id, "name": category.id}]}],
        });

        if paged && category.missing_results.contains(&offset) {
            if let Some(object) = body.as_object_mut() {
                object.remove("results");
            }
        }

        ResponseTemplate::new(200).set_body_json(body)
    }
}

impl Respond for Marketplace {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let query: HashMap<String, String> = request.url.query_pairs().into_owned().collect();
        self.search(&query)
    }
}

/// Category endpoints of the synthetic marketplace
#[derive(Debug, Clone, Default)]
pub struct CategoryTree {
    bases: Vec<String>,
    children: HashMap<String, Vec<String>>,
}

impl CategoryTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn base(mut self, id: &str) -> Self {
        self.bases.push(id.to_string());
        self
    }

    pub fn child(mut self, parent: &str, id: &str) -> Self {
        self.children
            .entry(parent.to_string())
            .or_default()
            .push(id.to_string());
        self
    }

    pub async fn mount(self, server: &MockServer) {
        let listing: Vec<Value> = self
            .bases
            .iter()
            .map(|id| json!({"id": id, "name": format!("Category {}", id)}))
            .collect();

        Mock::given(method("GET"))
            .and(path("/sites/MLB/categories"))
            .respond_with(ResponseTemplate::new(200).set_body_json(listing))
            .mount(server)
            .await;

        Mock::given(method("GET"))
            .and(path_regex(r"^/categories/[A-Z]{3}\d+$"))
            .respond_with(self)
            .mount(server)
            .await;
    }
}

impl Respond for CategoryTree {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let id = request.url.path().trim_start_matches("/categories/");
        let children: Vec<Value> = self
            .children
            .get(id)
            .map(|c| {
                c.iter()
                    .map(|child| json!({"id": child, "name": format!("Category {}", child)}))
                    .collect()
            })
            .unwrap_or_default();

        ResponseTemplate::new(200).set_body_json(json!({
            "id": id,
            "name": format!("Category {}", id),
            "total_items_in_this_category": 0,
            "children_categories": children,
        }))
    }
}
