//! Token guard, refresh and authorization flow against a mocked token endpoint

use crate::common::{context, test_config, token, token_body};
use futures::future::join_all;
use meli_crawler::api::CategoryId;
use meli_crawler::crawler::CrawlContext;
use meli_crawler::storage::{share, SqliteStorage};
use meli_crawler::{AuthError, MeliError};
use wiremock::matchers::{body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn test_concurrent_callers_share_one_refresh() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/oauth/token"))
        .and(body_string_contains("grant_type=refresh_token"))
        .and(body_string_contains("refresh_token=TG-refresh"))
        .respond_with(ResponseTemplate::new(200).set_body_json(token_body("APP_USR-fresh")))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/sites/MLB/categories"))
        .and(header("authorization", "Bearer APP_USR-fresh"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([])))
        .mount(&server)
        .await;

    let config = test_config(&server.uri());
    let (context, storage) = context(&config).await;
    context.tokens.set_token(token("APP_USR-stale", -60)).await;

    let calls = (0..16).map(|_| context.client.get_site_categories());
    let results = join_all(calls).await;

    assert!(results.iter().all(|r| r.is_ok()));
    assert_eq!(context.tokens.refresh_count(), 1);

    let current = context.tokens.current_token().await.unwrap();
    assert_eq!(current.access_token, "APP_USR-fresh");
    assert_eq!(current.refresh_token.as_deref(), Some("TG-rotated"));

    let stored = storage.lock().unwrap().load_latest_token().unwrap().unwrap();
    assert_eq!(stored.access_token, "APP_USR-fresh");
}

#[tokio::test]
async fn test_token_inside_skew_is_refreshed() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/oauth/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(token_body("APP_USR-fresh")))
        .expect(1)
        .mount(&server)
        .await;

    let config = test_config(&server.uri());
    let (context, _storage) = context(&config).await;

    // still valid for 30s, but inside the 60s skew
    context.tokens.set_token(token("APP_USR-closing", 30)).await;
    assert_eq!(context.tokens.valid_token().await.unwrap(), "APP_USR-fresh");
    assert_eq!(context.tokens.valid_token().await.unwrap(), "APP_USR-fresh");
}

#[tokio::test]
async fn test_refresh_rejection_is_fatal() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/oauth/token"))
        .respond_with(ResponseTemplate::new(400).set_body_string("invalid_grant"))
        .mount(&server)
        .await;

    let config = test_config(&server.uri());
    let (context, _storage) = context(&config).await;
    context.tokens.set_token(token("APP_USR-stale", -60)).await;

    let err = context.client.get_site_categories().await.unwrap_err();
    assert!(err.is_fatal());
    assert!(matches!(
        err,
        MeliError::Auth(AuthError::TokenRejected { status: 400, .. })
    ));

    // the failed refresh leaves the old token in place
    let current = context.tokens.current_token().await.unwrap();
    assert_eq!(current.access_token, "APP_USR-stale");
    assert_eq!(context.tokens.refresh_count(), 0);
}

#[tokio::test]
async fn test_missing_token_is_fatal() {
    let server = MockServer::start().await;
    let config = test_config(&server.uri());
    let storage = share(SqliteStorage::open_in_memory().unwrap());
    let context = CrawlContext::with_storage(&config, storage).unwrap();

    let err = context.client.get_site_categories().await.unwrap_err();
    assert!(matches!(err, MeliError::Auth(AuthError::MissingToken)));
    assert!(server.received_requests().await.unwrap_or_default().is_empty());
}

#[tokio::test]
async fn test_authorization_code_exchange() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/oauth/token"))
        .and(body_string_contains("grant_type=authorization_code"))
        .and(body_string_contains("code=TG-abc"))
        .respond_with(ResponseTemplate::new(200).set_body_json(token_body("APP_USR-granted")))
        .expect(1)
        .mount(&server)
        .await;

    let config = test_config(&server.uri());
    let storage = share(SqliteStorage::open_in_memory().unwrap());
    let context = CrawlContext::with_storage(&config, storage.clone()).unwrap();

    let request = context.tokens.oauth().authorization_url().unwrap();
    assert!(request.url.starts_with(&server.uri()));

    let callback = format!("https://example.com/callback?code=TG-abc&state={}", request.state);
    let granted = context
        .tokens
        .oauth()
        .exchange_code(&callback, &request.state)
        .await
        .unwrap();
    context.install_token(granted).await.unwrap();

    assert_eq!(context.tokens.valid_token().await.unwrap(), "APP_USR-granted");

    // a second process over the same database picks the token up
    let reopened = CrawlContext::with_storage(&config, storage).unwrap();
    assert!(reopened.load_stored_token().await.unwrap());
    assert_eq!(reopened.tokens.valid_token().await.unwrap(), "APP_USR-granted");
}

#[tokio::test]
async fn test_state_mismatch_sends_nothing() {
    let server = MockServer::start().await;
    let config = test_config(&server.uri());
    let (context, _storage) = context(&config).await;

    let request = context.tokens.oauth().authorization_url().unwrap();
    let err = context
        .tokens
        .oauth()
        .exchange_code("https://example.com/callback?code=TG-abc&state=forged", &request.state)
        .await
        .unwrap_err();

    assert!(matches!(err, AuthError::StateMismatch));
    assert!(server.received_requests().await.unwrap_or_default().is_empty());
}

#[tokio::test]
async fn test_unknown_site_rejected_before_any_request() {
    let server = MockServer::start().await;

    let err = CategoryId::parse("XXX1384").unwrap_err();
    assert!(matches!(err, AuthError::InvalidSite(_)));

    let mut config = test_config(&server.uri());
    config.api.site_id = "XXX".to_string();
    let storage = share(SqliteStorage::open_in_memory().unwrap());
    let err = CrawlContext::with_storage(&config, storage).err().unwrap();
    assert!(matches!(err, MeliError::Auth(AuthError::InvalidSite(_))));

    assert!(server.received_requests().await.unwrap_or_default().is_empty());
}
