//! Database schema definitions
//!
//! This module contains all SQL schema definitions for the Meli-Crawler database.

/// SQL schema for the database
pub const SCHEMA_SQL: &str = r#"
-- Track crawl runs
CREATE TABLE IF NOT EXISTS runs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    started_at TEXT NOT NULL,
    finished_at TEXT,
    config_hash TEXT NOT NULL,
    run_date TEXT NOT NULL,
    status TEXT NOT NULL
);

-- Every token ever issued; the latest one by expiry is current
CREATE TABLE IF NOT EXISTS oauth_token (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    access_token TEXT NOT NULL,
    token_type TEXT NOT NULL,
    expires_in INTEGER NOT NULL,
    scope TEXT NOT NULL,
    user_id INTEGER,
    refresh_token TEXT,
    expires_at TEXT NOT NULL,
    saved_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_oauth_token_expires ON oauth_token(expires_at);

-- Top-level categories of a site, per run date
CREATE TABLE IF NOT EXISTS base_categories (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    site_id TEXT NOT NULL,
    category_id TEXT NOT NULL,
    last_run TEXT NOT NULL,
    category_json TEXT NOT NULL,
    UNIQUE(site_id, category_id, last_run)
);

-- Leaf categories, per run date
CREATE TABLE IF NOT EXISTS categories (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    site_id TEXT NOT NULL,
    category_id TEXT NOT NULL,
    last_run TEXT NOT NULL,
    category_json TEXT NOT NULL,
    UNIQUE(site_id, category_id, last_run)
);

-- Items seen in a category on a run date; the same item found through
-- several partitions is stored once
CREATE TABLE IF NOT EXISTS items (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    site_id TEXT NOT NULL,
    item_id TEXT NOT NULL,
    last_run TEXT NOT NULL,
    category_id TEXT NOT NULL,
    item_json TEXT NOT NULL,
    UNIQUE(site_id, item_id, last_run, category_id)
);

CREATE INDEX IF NOT EXISTS idx_items_coverage ON items(site_id, category_id, last_run);

-- Outcome of each category crawl
CREATE TABLE IF NOT EXISTS category_outcomes (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    run_id INTEGER NOT NULL REFERENCES runs(id),
    site_id TEXT NOT NULL,
    category_id TEXT NOT NULL,
    path TEXT NOT NULL,
    advertised_total INTEGER NOT NULL,
    distinct_items INTEGER NOT NULL,
    partitions_tried INTEGER NOT NULL,
    failed_pages INTEGER NOT NULL,
    status TEXT NOT NULL,
    message TEXT,
    recorded_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_category_outcomes_run ON category_outcomes(run_id);
"#;

/// Initializes the database schema
pub fn initialize_schema(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA_SQL)?;
    Ok(())
}
