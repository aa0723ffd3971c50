//! Pagination bounds and category discovery

use crate::common::{context, page_requests, test_config, CategoryTree, FakeCategory, Marketplace};
use meli_crawler::api::{CategoryId, SearchQuery};
use meli_crawler::crawler::{find_leaf_categories, page_count, PaginatedFetcher};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn test_fetch_never_exceeds_quota() {
    let server = MockServer::start().await;
    Marketplace::new(10)
        .with_category(FakeCategory::new("MLB1648", 1000))
        .mount(&server)
        .await;

    let config = test_config(&server.uri());
    let (context, _storage) = context(&config).await;
    let fetcher = PaginatedFetcher::new(context.client.clone(), 100, 4);

    let query = SearchQuery::category(CategoryId::parse("MLB1648").unwrap());
    let outcome = fetcher.fetch_all(&query, 1000, 10).await.unwrap();

    assert_eq!(outcome.pages_requested, page_count(1000, 10, 100));
    assert_eq!(outcome.pages_requested, 10);
    assert_eq!(outcome.items.len(), 100);

    let requests = page_requests(&server).await;
    assert_eq!(requests.len(), 10);

    let mut offsets: Vec<u64> = requests
        .iter()
        .filter_map(|r| {
            r.url
                .query_pairs()
                .find(|(k, _)| k == "offset")
                .and_then(|(_, v)| v.parse().ok())
        })
        .collect();
    offsets.sort_unstable();
    assert_eq!(offsets, (0..10).map(|i| i * 10).collect::<Vec<u64>>());
}

#[tokio::test]
async fn test_fetch_keeps_page_order() {
    let server = MockServer::start().await;
    Marketplace::new(10)
        .with_category(FakeCategory::new("MLB1648", 45))
        .mount(&server)
        .await;

    let config = test_config(&server.uri());
    let (context, _storage) = context(&config).await;
    let fetcher = PaginatedFetcher::new(context.client.clone(), 10_000, 8);

    let query = SearchQuery::category(CategoryId::parse("MLB1648").unwrap());
    let probe = fetcher.probe(&query).await.unwrap();
    assert_eq!(probe.total(), 45);
    assert_eq!(probe.limit(), 10);

    let outcome = fetcher
        .fetch_all(&query, probe.total(), probe.limit())
        .await
        .unwrap();
    assert_eq!(outcome.pages_requested, 5);

    let ids: Vec<&str> = outcome
        .items
        .iter()
        .filter_map(|item| item["id"].as_str())
        .collect();
    let expected: Vec<String> = (0..45).map(|n| format!("MLB{}", 1_000_000 + n)).collect();
    assert_eq!(ids, expected);
}

#[tokio::test]
async fn test_zero_limit_is_rejected() {
    let server = MockServer::start().await;
    let config = test_config(&server.uri());
    let (context, _storage) = context(&config).await;
    let fetcher = PaginatedFetcher::new(context.client.clone(), 10_000, 4);

    let query = SearchQuery::category(CategoryId::parse("MLB1648").unwrap());
    assert!(fetcher.fetch_all(&query, 10, 0).await.is_err());
    assert!(fetcher.fetch_all(&query, 0, 0).await.unwrap().items.is_empty());
    assert!(page_requests(&server).await.is_empty());
}

#[tokio::test]
async fn test_leaf_discovery_skips_broken_subtree() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/categories/MLB1002"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;
    CategoryTree::new()
        .base("MLB1000")
        .child("MLB1000", "MLB1001")
        .child("MLB1000", "MLB1002")
        .child("MLB1000", "MLB1004")
        .child("MLB1002", "MLB1003")
        .mount(&server)
        .await;

    let config = test_config(&server.uri());
    let (context, _storage) = context(&config).await;

    let tree = find_leaf_categories(&context.client, &CategoryId::parse("MLB1000").unwrap())
        .await
        .unwrap();

    assert_eq!(tree.root.id, "MLB1000");
    let leaves: Vec<&str> = tree.leaves.iter().map(|c| c.id.as_str()).collect();
    assert_eq!(leaves, vec!["MLB1001", "MLB1004"]);
}

#[tokio::test]
async fn test_leaf_base_is_its_own_leaf() {
    let server = MockServer::start().await;
    CategoryTree::new().base("MLB2000").mount(&server).await;

    let config = test_config(&server.uri());
    let (context, _storage) = context(&config).await;

    let tree = find_leaf_categories(&context.client, &CategoryId::parse("MLB2000").unwrap())
        .await
        .unwrap();
    assert_eq!(tree.leaves.len(), 1);
    assert_eq!(tree.leaves[0].id, "MLB2000");
}
