//! Wiring of the shared crawl services
//!
//! Storage, token store and API client are built once from the
//! configuration and shared by every worker.

use crate::api::{build_http_client, ApiClient, Site};
use crate::auth::{AccessToken, OAuthClient, TokenStore};
use crate::config::Config;
use crate::storage::{open_storage, share, SharedStorage};
use crate::MeliError;
use chrono::Duration;
use std::path::Path;
use std::sync::Arc;

/// Services shared by the coordinator and its workers
#[derive(Clone)]
pub struct CrawlContext {
    pub storage: SharedStorage,
    pub tokens: Arc<TokenStore>,
    pub client: ApiClient,
}

impl CrawlContext {
    /// Opens the configured database and builds the clients around it
    pub fn open(config: &Config) -> Result<Self, MeliError> {
        let storage = open_storage(Path::new(&config.output.database_path))?;
        Self::with_storage(config, share(storage))
    }

    /// Builds the clients around an already opened storage
    ///
    /// # Arguments
    ///
    /// * `config` - Validated configuration
    /// * `storage` - Storage that receives refreshed tokens and crawl data
    ///
    /// # Returns
    ///
    /// * `Ok(CrawlContext)` - Ready to crawl once a token is installed
    /// * `Err(MeliError)` - Unknown site code or HTTP client failure
    pub fn with_storage(config: &Config, storage: SharedStorage) -> Result<Self, MeliError> {
        let site = Site::from_code(&config.api.site_id)?;
        let http = build_http_client(config.crawler.request_timeout_secs)?;

        let auth_base = config
            .api
            .auth_base
            .clone()
            .unwrap_or_else(|| site.auth_base().to_string());

        let oauth = OAuthClient::new(
            http.clone(),
            config.api.client_id.clone(),
            config.api.client_secret.clone(),
            config.api.redirect_uri.clone(),
            &auth_base,
            &config.api.api_base,
        );

        let skew = Duration::seconds(config.crawler.refresh_skew_secs.min(3600) as i64);
        let tokens = Arc::new(TokenStore::new(oauth, skew).with_persistence(storage.clone()));
        let client = ApiClient::new(http, &config.api.api_base, site, tokens.clone());

        Ok(Self {
            storage,
            tokens,
            client,
        })
    }

    /// Installs the latest persisted token, if there is one
    ///
    /// An expired token is still installed: its refresh credential is used
    /// on the first request.
    pub async fn load_stored_token(&self) -> Result<bool, MeliError> {
        let token = {
            let storage = self
                .storage
                .lock()
                .map_err(|_| MeliError::Storage("storage lock poisoned".to_string()))?;
            storage.load_latest_token()?
        };

        match token {
            Some(token) => {
                tracing::info!("Loaded stored access token (expires {})", token.expires_at);
                self.tokens.set_token(token).await;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Persists and installs a newly issued token
    pub async fn install_token(&self, token: AccessToken) -> Result<(), MeliError> {
        {
            let mut storage = self
                .storage
                .lock()
                .map_err(|_| MeliError::Storage("storage lock poisoned".to_string()))?;
            storage.save_token(&token)?;
        }
        self.tokens.set_token(token).await;
        Ok(())
    }
}
