use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Upper bound on a token lifetime; larger `expires_in` values are clamped
const MAX_LIFETIME_SECS: i64 = 10 * 365 * 24 * 3600;

/// Body returned by `POST /oauth/token`
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,

    #[serde(default = "default_token_type")]
    pub token_type: String,

    pub expires_in: u64,

    #[serde(default)]
    pub scope: String,

    #[serde(default)]
    pub user_id: Option<u64>,

    #[serde(default)]
    pub refresh_token: Option<String>,
}

fn default_token_type() -> String {
    "bearer".to_string()
}

/// A bearer credential with its expiry instant
///
/// Tokens are never mutated: a refresh produces a new value that supersedes
/// the old one.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessToken {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub token_type: String,
    pub scope: String,
    pub user_id: Option<u64>,
    pub expires_in: u64,
    pub expires_at: DateTime<Utc>,
}

impl AccessToken {
    /// Builds a token from an endpoint response received at `issued_at`
    pub fn from_response(response: TokenResponse, issued_at: DateTime<Utc>) -> Self {
        let seconds = i64::try_from(response.expires_in)
            .unwrap_or(MAX_LIFETIME_SECS)
            .min(MAX_LIFETIME_SECS);
        let lifetime = Duration::seconds(seconds);
        Self {
            access_token: response.access_token,
            refresh_token: response.refresh_token,
            token_type: response.token_type,
            scope: response.scope,
            user_id: response.user_id,
            expires_in: response.expires_in,
            expires_at: issued_at + lifetime,
        }
    }

    /// Returns true once `at` has reached the expiry instant
    pub fn is_expired(&self, at: DateTime<Utc>) -> bool {
        at >= self.expires_at
    }

    /// Keeps the previous refresh token when a refresh response omits one
    pub(crate) fn inherit_refresh_token(mut self, previous: &AccessToken) -> Self {
        if self.refresh_token.is_none() {
            self.refresh_token = previous.refresh_token.clone();
        }
        self
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessToken")
            .field("access_token", &"<redacted>")
            .field(
                "refresh_token",
                &self.refresh_token.as_ref().map(|_| "<redacted>"),
            )
            .field("token_type", &self.token_type)
            .field("scope", &self.scope)
            .field("user_id", &self.user_id)
            .field("expires_at", &self.expires_at)
            .finish()
    }
}
