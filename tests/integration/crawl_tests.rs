//! End-to-end category crawls against the synthetic marketplace

use crate::common::{
    context, page_requests, search_requests, test_config, token, CategoryTree, FakeCategory,
    Marketplace, RUN_DATE,
};
use meli_crawler::api::CategoryId;
use meli_crawler::crawler::{Coordinator, CrawlOrchestrator};
use meli_crawler::state::{CategoryStatus, CrawlPhase};
use meli_crawler::storage::{CrawlPath, RunStatus};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn category(id: &str) -> CategoryId {
    CategoryId::parse(id).unwrap()
}

#[tokio::test]
async fn test_direct_path_under_quota() {
    let server = MockServer::start().await;
    Marketplace::new(50)
        .with_category(FakeCategory::new("MLB1384", 7287))
        .mount(&server)
        .await;

    let config = test_config(&server.uri());
    let (context, storage) = context(&config).await;
    let orchestrator =
        CrawlOrchestrator::new(context.client.clone(), storage.clone(), &config.crawler, RUN_DATE);

    let report = orchestrator.crawl_category(&category("MLB1384")).await.unwrap();

    assert_eq!(report.path, CrawlPath::Direct);
    assert_eq!(report.phase, CrawlPhase::Done);
    assert_eq!(report.status, CategoryStatus::Complete);
    assert_eq!(report.advertised_total, 7287);
    assert_eq!(report.distinct_items, 7287);
    assert_eq!(report.pages_requested, 146);
    assert_eq!(report.partitions_tried, 0);

    // one probe plus ceil(7287 / 50) pages
    assert_eq!(page_requests(&server).await.len(), 146);
    assert_eq!(search_requests(&server).await.len(), 147);

    let stored = storage
        .lock()
        .unwrap()
        .count_distinct_items("MLB", "1384", RUN_DATE)
        .unwrap();
    assert_eq!(stored, 7287);
}

#[tokio::test]
async fn test_partitioned_path_reaches_coverage() {
    let server = MockServer::start().await;
    Marketplace::new(50)
        .with_category(FakeCategory::new("MLB5672", 13087))
        .mount(&server)
        .await;

    let config = test_config(&server.uri());
    let (context, storage) = context(&config).await;
    let orchestrator =
        CrawlOrchestrator::new(context.client.clone(), storage, &config.crawler, RUN_DATE);

    let report = orchestrator.crawl_category(&category("MLB5672")).await.unwrap();

    assert_eq!(report.path, CrawlPath::Partitioned);
    assert_eq!(report.status, CategoryStatus::Covered);
    assert_eq!(report.phase, CrawlPhase::Done);
    assert!(report.distinct_items as f64 >= 13087.0 * 0.98);

    // shipping=free then shipping=paid split the category in two
    assert_eq!(report.partitions_tried, 2);
    assert_eq!(report.coverage_trace, vec![6544, 13087]);

    let filtered: Vec<_> = search_requests(&server)
        .await
        .into_iter()
        .filter(|r| r.url.query_pairs().any(|(k, _)| k == "shipping"))
        .collect();
    assert!(!filtered.is_empty());
    assert!(search_requests(&server)
        .await
        .iter()
        .all(|r| !r.url.query_pairs().any(|(k, _)| k == "condition")));
}

#[tokio::test]
async fn test_partitions_exhausted_under_covered() {
    let server = MockServer::start().await;
    Marketplace::new(10)
        .with_category(FakeCategory::new("MLB1000", 150).advertising(1000))
        .mount(&server)
        .await;

    let mut config = test_config(&server.uri());
    config.crawler.quota = 100;
    let (context, storage) = context(&config).await;
    let orchestrator =
        CrawlOrchestrator::new(context.client.clone(), storage, &config.crawler, RUN_DATE);

    let report = orchestrator.crawl_category(&category("MLB1000")).await.unwrap();

    assert_eq!(report.path, CrawlPath::Partitioned);
    assert_eq!(report.status, CategoryStatus::UnderCovered);
    assert_eq!(report.phase, CrawlPhase::Done);
    assert_eq!(report.distinct_items, 150);

    // (2 + 1) * (3 + 1) * (2 + 1) - 1 combinations of shipping, condition and sort
    assert_eq!(report.partitions_tried, 35);
    assert_eq!(
        report.message.as_deref(),
        Some("partitions exhausted after 35 attempt(s)")
    );

    assert_eq!(report.coverage_trace.len(), 35);
    assert!(report.coverage_trace.windows(2).all(|w| w[0] <= w[1]));
    assert_eq!(report.coverage_trace.last(), Some(&150));
}

#[tokio::test]
async fn test_degraded_pages_are_counted() {
    let server = MockServer::start().await;
    Marketplace::new(10)
        .with_category(
            FakeCategory::new("MLB1051", 100)
                .missing_results_at(30)
                .failing_at(50),
        )
        .mount(&server)
        .await;

    let config = test_config(&server.uri());
    let (context, storage) = context(&config).await;
    let orchestrator =
        CrawlOrchestrator::new(context.client.clone(), storage, &config.crawler, RUN_DATE);

    let report = orchestrator.crawl_category(&category("MLB1051")).await.unwrap();

    assert_eq!(report.path, CrawlPath::Direct);
    assert_eq!(report.pages_requested, 10);
    assert_eq!(report.missing_results, 1);
    assert_eq!(report.failed_pages, 1);
    assert_eq!(report.distinct_items, 80);
    assert_eq!(report.status, CategoryStatus::UnderCovered);
    assert_eq!(report.to_outcome(1).failed_pages, 2);
}

#[tokio::test]
async fn test_failed_base_query_is_contained() {
    let server = MockServer::start().await;
    Marketplace::new(10).mount(&server).await;

    let config = test_config(&server.uri());
    let (context, storage) = context(&config).await;
    let orchestrator =
        CrawlOrchestrator::new(context.client.clone(), storage, &config.crawler, RUN_DATE);

    let report = orchestrator.crawl_category(&category("MLB404")).await.unwrap();

    assert_eq!(report.status, CategoryStatus::Failed);
    assert_eq!(report.phase, CrawlPhase::Done);
    assert_eq!(report.path, CrawlPath::Unknown);
    assert!(report.message.unwrap().contains("404"));
}

#[tokio::test]
async fn test_recrawl_is_idempotent() {
    let server = MockServer::start().await;
    Marketplace::new(10)
        .with_category(FakeCategory::new("MLB1430", 95))
        .mount(&server)
        .await;

    let config = test_config(&server.uri());
    let (context, storage) = context(&config).await;
    let orchestrator =
        CrawlOrchestrator::new(context.client.clone(), storage.clone(), &config.crawler, RUN_DATE);

    let first = orchestrator.crawl_category(&category("MLB1430")).await.unwrap();
    let rows_after_first = storage
        .lock()
        .unwrap()
        .count_items_for_run_date(RUN_DATE)
        .unwrap();

    let second = orchestrator.crawl_category(&category("MLB1430")).await.unwrap();
    let rows_after_second = storage
        .lock()
        .unwrap()
        .count_items_for_run_date(RUN_DATE)
        .unwrap();

    assert_eq!(first.distinct_items, 95);
    assert_eq!(second.distinct_items, 95);
    assert_eq!(rows_after_first, rows_after_second);
    assert_eq!(second.status, CategoryStatus::Complete);
}

#[tokio::test]
async fn test_full_run_walks_leaf_categories() {
    let server = MockServer::start().await;
    CategoryTree::new()
        .base("MLB1000")
        .base("MLB2000")
        .base("MLB3000")
        .child("MLB1000", "MLB1001")
        .child("MLB1000", "MLB1002")
        .child("MLB1002", "MLB1003")
        .mount(&server)
        .await;
    Marketplace::new(10)
        .with_category(FakeCategory::new("MLB1001", 30))
        .with_category(FakeCategory::new("MLB1003", 40))
        .with_category(FakeCategory::new("MLB2000", 50))
        .mount(&server)
        .await;

    let mut config = test_config(&server.uri());
    config.crawler.base_categories = vec!["MLB1000".to_string(), "MLB2000".to_string()];
    let (context, storage) = context(&config).await;

    let coordinator = Coordinator::new(config, context, "hash", RUN_DATE);
    let summary = coordinator.run().await.unwrap();

    assert_eq!(summary.base_categories, 2);
    assert_eq!(summary.leaf_categories, 3);
    assert_eq!(summary.count(CategoryStatus::Complete), 3);
    assert_eq!(summary.items_persisted, 120);

    let storage = storage.lock().unwrap();
    let run = storage.get_run(summary.run_id).unwrap();
    assert_eq!(run.status, RunStatus::Completed);
    assert!(run.finished_at.is_some());

    let mut crawled: Vec<String> = storage
        .get_outcomes(summary.run_id)
        .unwrap()
        .into_iter()
        .map(|o| o.category_id)
        .collect();
    crawled.sort();
    assert_eq!(crawled, vec!["1001", "1003", "2000"]);

    // MLB3000 is outside the allow-list and never searched
    drop(storage);
    assert!(search_requests(&server)
        .await
        .iter()
        .all(|r| !r.url.query_pairs().any(|(_, v)| v == "MLB3000")));
}

#[tokio::test]
async fn test_refresh_failure_halts_run() {
    let server = MockServer::start().await;
    CategoryTree::new().base("MLB2000").mount(&server).await;
    Marketplace::new(10)
        .with_category(FakeCategory::new("MLB2000", 50))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/oauth/token"))
        .respond_with(
            ResponseTemplate::new(400).set_body_json(serde_json::json!({"error": "invalid_grant"})),
        )
        .mount(&server)
        .await;

    let config = test_config(&server.uri());
    let (context, storage) = context(&config).await;
    context.tokens.set_token(token("APP_USR-stale", -60)).await;

    let coordinator = Coordinator::new(config, context, "hash", RUN_DATE);
    let err = coordinator.run().await.unwrap_err();
    assert!(err.is_fatal());

    let storage = storage.lock().unwrap();
    let run = storage.get_latest_run().unwrap().unwrap();
    assert_eq!(run.status, RunStatus::Failed);
    assert!(storage.get_outcomes(run.id).unwrap().is_empty());
    drop(storage);

    assert!(search_requests(&server).await.is_empty());
}

#[tokio::test]
async fn test_shared_leaf_is_crawled_once() {
    let server = MockServer::start().await;
    CategoryTree::new()
        .base("MLB1000")
        .base("MLB2000")
        .child("MLB1000", "MLB1001")
        .child("MLB2000", "MLB1001")
        .child("MLB2000", "MLB2001")
        .mount(&server)
        .await;
    Marketplace::new(10)
        .with_category(FakeCategory::new("MLB1001", 20))
        .with_category(FakeCategory::new("MLB2001", 10))
        .mount(&server)
        .await;

    let config = test_config(&server.uri());
    let (context, storage) = context(&config).await;

    let coordinator = Coordinator::new(config, context, "hash", RUN_DATE);
    let summary = coordinator.run().await.unwrap();

    assert_eq!(summary.base_categories, 2);
    assert_eq!(summary.leaf_categories, 2);
    assert_eq!(summary.count(CategoryStatus::Complete), 2);

    let outcomes = storage.lock().unwrap().get_outcomes(summary.run_id).unwrap();
    assert_eq!(outcomes.len(), 2);

    let base_probes = search_requests(&server)
        .await
        .into_iter()
        .filter(|r| {
            r.url.query_pairs().any(|(k, v)| k == "category" && v == "MLB1001")
                && !r.url.query_pairs().any(|(k, _)| k == "offset")
        })
        .count();
    assert_eq!(base_probes, 1);
}
