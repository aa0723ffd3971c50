//! Integration tests for the crawler
//!
//! These tests use wiremock to stand in for the marketplace API and the
//! token endpoint, and an in-memory SQLite database as the sink.

#[allow(dead_code)]
mod common;

mod auth_tests;
mod crawl_tests;
mod fetcher_tests;
