//! OAuth2 endpoint calls: authorization URL, code exchange and refresh

use crate::auth::token::{AccessToken, TokenResponse};
use crate::{AuthError, AuthResult};
use chrono::Utc;
use reqwest::Client;
use url::Url;

/// An authorization URL together with the `state` it was issued with
#[derive(Debug, Clone)]
pub struct AuthorizationRequest {
    pub url: String,
    pub state: String,
}

/// Talks to the authorization server and the token endpoint
#[derive(Debug, Clone)]
pub struct OAuthClient {
    http: Client,
    client_id: String,
    client_secret: String,
    redirect_uri: String,
    auth_base: String,
    token_url: String,
}

impl OAuthClient {
    /// Creates a client for the given site's authorization host and the API's
    /// token endpoint (`{api_base}/oauth/token`)
    pub fn new(
        http: Client,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        redirect_uri: impl Into<String>,
        auth_base: &str,
        api_base: &str,
    ) -> Self {
        Self {
            http,
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            redirect_uri: redirect_uri.into(),
            auth_base: auth_base.trim_end_matches('/').to_string(),
            token_url: format!("{}/oauth/token", api_base.trim_end_matches('/')),
        }
    }

    /// Builds the URL the user must visit to grant access
    pub fn authorization_url(&self) -> AuthResult<AuthorizationRequest> {
        let state = uuid::Uuid::new_v4().to_string();
        let mut url = Url::parse(&format!("{}/authorization", self.auth_base))
            .map_err(|e| AuthError::InvalidCallback(format!("invalid authorization base: {}", e)))?;

        url.query_pairs_mut()
            .append_pair("response_type", "code")
            .append_pair("client_id", &self.client_id)
            .append_pair("redirect_uri", &self.redirect_uri)
            .append_pair("state", &state);

        Ok(AuthorizationRequest {
            url: url.into(),
            state,
        })
    }

    /// Exchanges the code carried by the callback URL for a token
    ///
    /// The callback's `state` must match the one issued with the
    /// authorization URL.
    pub async fn exchange_code(
        &self,
        callback_url: &str,
        expected_state: &str,
    ) -> AuthResult<AccessToken> {
        let code = extract_code(callback_url, expected_state)?;

        self.request_token(&[
            ("grant_type", "authorization_code"),
            ("client_id", &self.client_id),
            ("client_secret", &self.client_secret),
            ("code", &code),
            ("redirect_uri", &self.redirect_uri),
        ])
        .await
    }

    /// Exchanges a refresh credential for a new token
    pub async fn refresh(&self, previous: &AccessToken) -> AuthResult<AccessToken> {
        let refresh_token = previous
            .refresh_token
            .as_deref()
            .ok_or(AuthError::MissingRefreshToken)?;

        let token = self
            .request_token(&[
                ("grant_type", "refresh_token"),
                ("client_id", &self.client_id),
                ("client_secret", &self.client_secret),
                ("refresh_token", refresh_token),
            ])
            .await?;

        Ok(token.inherit_refresh_token(previous))
    }

    async fn request_token(&self, form: &[(&str, &str)]) -> AuthResult<AccessToken> {
        let issued_at = Utc::now();

        let response = self
            .http
            .post(&self.token_url)
            .header("accept", "application/json")
            .form(form)
            .send()
            .await
            .map_err(|e| AuthError::TokenRequest(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AuthError::TokenRejected {
                status: status.as_u16(),
                body,
            });
        }

        let body: TokenResponse = response
            .json()
            .await
            .map_err(|e| AuthError::TokenRequest(format!("invalid token response: {}", e)))?;

        Ok(AccessToken::from_response(body, issued_at))
    }
}

/// Pulls the authorization code out of a callback URL
fn extract_code(callback_url: &str, expected_state: &str) -> AuthResult<String> {
    let url = Url::parse(callback_url.trim())
        .map_err(|e| AuthError::InvalidCallback(e.to_string()))?;

    let mut code = None;
    let mut state = None;
    for (key, value) in url.query_pairs() {
        match key.as_ref() {
            "code" => code = Some(value.into_owned()),
            "state" => state = Some(value.into_owned()),
            _ => {}
        }
    }

    if state.as_deref() != Some(expected_state) {
        return Err(AuthError::StateMismatch);
    }

    code.filter(|c| !c.is_empty())
        .ok_or_else(|| AuthError::InvalidCallback("callback has no code parameter".to_string()))
}
