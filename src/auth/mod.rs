//! OAuth2 authentication for the marketplace API
//!
//! - `AccessToken`: the bearer credential and its expiry
//! - `OAuthClient`: authorization URL, code exchange and refresh requests
//! - `TokenStore`: the single current token and its exclusive refresh path

mod oauth;
mod store;
mod token;

pub use oauth::{AuthorizationRequest, OAuthClient};
pub use store::TokenStore;
pub use token::{AccessToken, TokenResponse};
