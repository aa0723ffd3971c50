//! Holder of the current access token
//!
//! Every authenticated request passes through [`TokenStore::valid_token`],
//! which refreshes an expired token before handing out its value. Refreshes
//! are exclusive: callers that find the token expired while another caller is
//! refreshing wait for that refresh and reuse its result.

use crate::auth::oauth::OAuthClient;
use crate::auth::token::AccessToken;
use crate::storage::SharedStorage;
use crate::{AuthError, AuthResult};
use chrono::{DateTime, Duration, Utc};
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::RwLock;

pub struct TokenStore {
    current: RwLock<Option<AccessToken>>,
    oauth: OAuthClient,
    persistence: Option<SharedStorage>,
    skew: Duration,
    refreshes: AtomicU64,
}

impl TokenStore {
    /// Creates an empty store
    ///
    /// # Arguments
    ///
    /// * `oauth` - Client for the token endpoint
    /// * `skew` - Margin before expiry at which a token is no longer handed out
    pub fn new(oauth: OAuthClient, skew: Duration) -> Self {
        Self {
            current: RwLock::new(None),
            oauth,
            persistence: None,
            skew,
            refreshes: AtomicU64::new(0),
        }
    }

    /// Persists every refreshed token to the given storage
    pub fn with_persistence(mut self, storage: SharedStorage) -> Self {
        self.persistence = Some(storage);
        self
    }

    pub fn oauth(&self) -> &OAuthClient {
        &self.oauth
    }

    /// Installs a token obtained outside the refresh path (initial
    /// authorization or a token loaded from storage)
    pub async fn set_token(&self, token: AccessToken) {
        *self.current.write().await = Some(token);
    }

    /// Returns the current token without checking its expiry
    pub async fn current_token(&self) -> AuthResult<AccessToken> {
        self.current
            .read()
            .await
            .clone()
            .ok_or(AuthError::MissingToken)
    }

    /// Returns true if there is no token or it is expired at `at` (skew included)
    pub async fn is_expired(&self, at: DateTime<Utc>) -> bool {
        match self.current.read().await.as_ref() {
            Some(token) => token.is_expired(at + self.skew),
            None => true,
        }
    }

    /// Number of refreshes performed by this store
    pub fn refresh_count(&self) -> u64 {
        self.refreshes.load(Ordering::SeqCst)
    }

    /// Exchanges the current refresh credential for a new token
    ///
    /// Failures are returned to the caller as authentication errors and leave
    /// the current token in place.
    pub async fn refresh(&self) -> AuthResult<AccessToken> {
        let mut guard = self.current.write().await;
        self.refresh_locked(&mut guard).await
    }

    /// The pre-call guard: returns a token value that is valid right now,
    /// refreshing first if the current one is expired
    pub async fn valid_token(&self) -> AuthResult<String> {
        {
            let guard = self.current.read().await;
            match guard.as_ref() {
                Some(token) if !token.is_expired(Utc::now() + self.skew) => {
                    return Ok(token.access_token.clone());
                }
                Some(_) => {}
                None => return Err(AuthError::MissingToken),
            }
        }

        let mut guard = self.current.write().await;

        // another caller may have refreshed while we waited for the lock
        if let Some(token) = guard.as_ref() {
            if !token.is_expired(Utc::now() + self.skew) {
                return Ok(token.access_token.clone());
            }
        }

        let token = self.refresh_locked(&mut guard).await?;
        Ok(token.access_token)
    }

    async fn refresh_locked(&self, slot: &mut Option<AccessToken>) -> AuthResult<AccessToken> {
        let previous = slot.as_ref().ok_or(AuthError::MissingToken)?;

        tracing::info!("Refreshing access token (expired at {})", previous.expires_at);
        let token = self.oauth.refresh(previous).await.map_err(|e| {
            tracing::error!("Token refresh failed: {}", e);
            e
        })?;

        self.refreshes.fetch_add(1, Ordering::SeqCst);
        self.persist(&token);
        *slot = Some(token.clone());

        tracing::debug!("Access token refreshed, valid until {}", token.expires_at);
        Ok(token)
    }

    fn persist(&self, token: &AccessToken) {
        let Some(storage) = &self.persistence else {
            return;
        };

        let result = match storage.lock() {
            Ok(mut storage) => storage.save_token(token).map_err(|e| e.to_string()),
            Err(_) => Err("storage lock poisoned".to_string()),
        };

        if let Err(e) = result {
            // the token is still usable in memory; the next run re-authorizes
            tracing::error!("Failed to persist refreshed token: {}", e);
        }
    }
}
