use serde::Deserialize;

/// Main configuration structure for Meli-Crawler
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub api: ApiConfig,
    #[serde(default)]
    pub crawler: CrawlerConfig,
    pub output: OutputConfig,
}

/// Marketplace API credentials and endpoints
#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    /// OAuth application id
    #[serde(rename = "client-id", default)]
    pub client_id: String,

    /// OAuth application secret
    #[serde(rename = "client-secret", default)]
    pub client_secret: String,

    /// Redirect URI registered for the application
    #[serde(rename = "redirect-uri")]
    pub redirect_uri: String,

    /// Marketplace site code (e.g., "MLB")
    #[serde(rename = "site-id", default = "default_site_id")]
    pub site_id: String,

    /// Base URL of the REST API
    #[serde(rename = "api-base", default = "default_api_base")]
    pub api_base: String,

    /// Overrides the site's authorization host
    #[serde(rename = "auth-base", default)]
    pub auth_base: Option<String>,
}

/// Crawl behavior configuration
#[derive(Debug, Clone, Deserialize)]
pub struct CrawlerConfig {
    /// Maximum number of items reachable through one query signature
    #[serde(default = "default_quota")]
    pub quota: u64,

    /// Fraction of the advertised total that counts as full coverage
    #[serde(rename = "coverage-threshold", default = "default_coverage_threshold")]
    pub coverage_threshold: f64,

    /// Number of categories crawled in parallel
    #[serde(
        rename = "max-concurrent-categories",
        default = "default_max_concurrent_categories"
    )]
    pub max_concurrent_categories: u32,

    /// Number of page requests in flight for a single query
    #[serde(rename = "max-concurrent-pages", default = "default_max_concurrent_pages")]
    pub max_concurrent_pages: u32,

    /// How filter combinations are enumerated for oversized categories
    #[serde(rename = "partition-strategy", default)]
    pub partition_strategy: PartitionStrategyConfig,

    /// Seconds before expiry at which a token is already treated as expired
    #[serde(rename = "refresh-skew-secs", default = "default_refresh_skew_secs")]
    pub refresh_skew_secs: u64,

    /// Transport read timeout (seconds)
    #[serde(rename = "request-timeout-secs", default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Restricts the crawl to these base category ids
    #[serde(rename = "base-categories", default)]
    pub base_categories: Vec<String>,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            quota: default_quota(),
            coverage_threshold: default_coverage_threshold(),
            max_concurrent_categories: default_max_concurrent_categories(),
            max_concurrent_pages: default_max_concurrent_pages(),
            partition_strategy: PartitionStrategyConfig::default(),
            refresh_skew_secs: default_refresh_skew_secs(),
            request_timeout_secs: default_request_timeout_secs(),
            base_categories: Vec::new(),
        }
    }
}

/// Partition enumeration strategy as written in the config file
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PartitionStrategyConfig {
    /// Single filters first, then pairs, then triples...
    #[default]
    IncreasingArity,

    /// Full cartesian product of every filter and sort
    Cartesian,
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    /// Path to the SQLite database file
    #[serde(rename = "database-path")]
    pub database_path: String,
}

fn default_site_id() -> String {
    "MLB".to_string()
}

fn default_api_base() -> String {
    "https://api.mercadolibre.com".to_string()
}

fn default_quota() -> u64 {
    10_000
}

fn default_coverage_threshold() -> f64 {
    0.98
}

fn default_max_concurrent_categories() -> u32 {
    4
}

fn default_max_concurrent_pages() -> u32 {
    8
}

fn default_refresh_skew_secs() -> u64 {
    60
}

fn default_request_timeout_secs() -> u64 {
    30
}
