//! Authenticated gateway to the marketplace REST API
//!
//! All authenticated requests go through [`ApiClient::get_json`], which runs
//! the token guard immediately before dispatch.

use crate::api::sites::{CategoryId, Site};
use crate::api::types::{Category, CategoryRef, SearchQuery, SearchResult};
use crate::auth::TokenStore;
use crate::MeliError;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

/// Builds the HTTP client shared by the API gateway and the token endpoint
///
/// # Arguments
///
/// * `timeout_secs` - Read timeout for every request
///
/// # Returns
///
/// * `Ok(Client)` - Successfully built HTTP client
/// * `Err(reqwest::Error)` - Failed to build client
pub fn build_http_client(timeout_secs: u64) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(concat!("meli-crawler/", env!("CARGO_PKG_VERSION")))
        .timeout(Duration::from_secs(timeout_secs))
        .connect_timeout(Duration::from_secs(10))
        .gzip(true)
        .brotli(true)
        .build()
}

/// Marketplace API client bound to one site
#[derive(Clone)]
pub struct ApiClient {
    http: Client,
    api_base: String,
    site: Site,
    tokens: Arc<TokenStore>,
}

impl ApiClient {
    pub fn new(http: Client, api_base: &str, site: Site, tokens: Arc<TokenStore>) -> Self {
        Self {
            http,
            api_base: api_base.trim_end_matches('/').to_string(),
            site,
            tokens,
        }
    }

    pub fn site(&self) -> Site {
        self.site
    }

    pub fn tokens(&self) -> &Arc<TokenStore> {
        &self.tokens
    }

    /// Issues an authenticated GET and returns the parsed JSON body
    ///
    /// The token guard runs first: an expired token is refreshed before the
    /// request is dispatched, and a failed refresh aborts the call with an
    /// authentication error.
    pub async fn get_json(&self, path: &str, params: &[(String, String)]) -> Result<Value, MeliError> {
        let token = self.tokens.valid_token().await?;
        let url = format!("{}{}", self.api_base, path);

        tracing::trace!("GET {} {:?}", url, params);
        let response = self
            .http
            .get(&url)
            .bearer_auth(token)
            .query(params)
            .send()
            .await
            .map_err(|source| MeliError::Http {
                url: url.clone(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(MeliError::Status {
                url,
                status: status.as_u16(),
            });
        }

        response.json::<Value>().await.map_err(|e| MeliError::Payload {
            url,
            message: e.to_string(),
        })
    }

    async fn get_typed<T: DeserializeOwned>(
        &self,
        path: &str,
        params: &[(String, String)],
    ) -> Result<T, MeliError> {
        let value = self.get_json(path, params).await?;
        serde_json::from_value(value).map_err(|e| MeliError::Payload {
            url: format!("{}{}", self.api_base, path),
            message: e.to_string(),
        })
    }

    /// `GET /sites/{site}/search`
    pub async fn search(&self, query: &SearchQuery) -> Result<SearchResult, MeliError> {
        let path = format!("/sites/{}/search", self.site);
        self.get_typed(&path, &query.to_params()).await
    }

    /// `GET /categories/{id}`
    pub async fn get_category(&self, id: &CategoryId) -> Result<Category, MeliError> {
        self.get_typed(&format!("/categories/{}", id), &[]).await
    }

    /// `GET /sites/{site}/categories`: the site's base categories
    pub async fn get_site_categories(&self) -> Result<Vec<CategoryRef>, MeliError> {
        let path = format!("/sites/{}/categories", self.site);
        self.get_typed(&path, &[]).await
    }
}
