//! Meli-Crawler: quota-aware catalog crawler for the Mercado Libre search API
//!
//! The search API caps every query signature at a fixed number of reachable
//! items. This crate enumerates whole categories anyway by splitting oversized
//! queries into facet-filtered partitions, paging each partition under the
//! quota and stopping once the persisted distinct-item count covers the
//! category.

pub mod api;
pub mod auth;
pub mod config;
pub mod crawler;
pub mod output;
pub mod state;
pub mod storage;

use thiserror::Error;

/// Main error type for Meli-Crawler operations
#[derive(Debug, Error)]
pub enum MeliError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Authentication error: {0}")]
    Auth(#[from] AuthError),

    #[error("HTTP error for {url}: {source}")]
    Http { url: String, source: reqwest::Error },

    #[error("Unexpected status {status} for {url}")]
    Status { url: String, status: u16 },

    #[error("Malformed payload from {url}: {message}")]
    Payload { url: String, message: String },

    #[error("Invalid crawl phase transition: {from} -> {to}")]
    InvalidTransition {
        from: state::CrawlPhase,
        to: state::CrawlPhase,
    },

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Storage error: {0}")]
    StorageError(#[from] storage::StorageError),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Storage error: {0}")]
    Storage(String),
}

impl MeliError {
    /// Returns true if the error must abort the whole run
    ///
    /// Only authentication failures are fatal: every other error raised while
    /// crawling a category is contained to that category.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Auth(_))
    }
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),
}

/// Authentication and authorization errors
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Unknown site code: {0}")]
    InvalidSite(String),

    #[error("No access token available, run the authorization flow first")]
    MissingToken,

    #[error("Access token has no refresh token")]
    MissingRefreshToken,

    #[error("Authorization callback is invalid: {0}")]
    InvalidCallback(String),

    #[error("Authorization state mismatch")]
    StateMismatch,

    #[error("Token request failed: {0}")]
    TokenRequest(String),

    #[error("Token endpoint rejected the request with status {status}: {body}")]
    TokenRejected { status: u16, body: String },
}

/// Result type alias for Meli-Crawler operations
pub type Result<T> = std::result::Result<T, MeliError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Result type alias for authentication operations
pub type AuthResult<T> = std::result::Result<T, AuthError>;

// Re-export commonly used types
pub use api::{ApiClient, CategoryId, Site};
pub use auth::{AccessToken, TokenStore};
pub use config::Config;
pub use crawler::{CrawlOrchestrator, PaginatedFetcher, PartitionStrategy};
pub use state::{CategoryStatus, CrawlPhase};
