//! SQLite storage implementation
//!
//! This module provides a SQLite-based implementation of the Storage trait.

use crate::auth::AccessToken;
use crate::state::CategoryStatus;
use crate::storage::schema::initialize_schema;
use crate::storage::traits::{Storage, StorageError, StorageResult};
use crate::storage::{
    CategoryOutcome, CategoryRecord, CrawlPath, ItemRecord, RunRecord, RunStatus,
};
use crate::MeliError;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::collections::HashMap;
use std::path::Path;

/// SQLite storage backend
pub struct SqliteStorage {
    conn: Connection,
}

impl SqliteStorage {
    /// Creates a new SqliteStorage instance
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the SQLite database file
    ///
    /// # Returns
    ///
    /// * `Ok(SqliteStorage)` - Successfully opened/created database
    /// * `Err(MeliError)` - Failed to open database
    pub fn new(path: &Path) -> Result<Self, MeliError> {
        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
            PRAGMA temp_store = MEMORY;
            PRAGMA busy_timeout = 5000;
        ",
        )?;

        initialize_schema(&conn)?;

        Ok(Self { conn })
    }

    /// Creates an in-memory database
    pub fn open_in_memory() -> Result<Self, MeliError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        initialize_schema(&conn)?;
        Ok(Self { conn })
    }

    fn insert_category_rows(
        &mut self,
        table: &str,
        records: &[CategoryRecord],
    ) -> StorageResult<usize> {
        let tx = self.conn.transaction()?;
        let mut inserted = 0;
        {
            let sql = format!(
                "INSERT OR IGNORE INTO {} (site_id, category_id, last_run, category_json)
                 VALUES (?1, ?2, ?3, ?4)",
                table
            );
            let mut stmt = tx.prepare(&sql)?;
            for record in records {
                inserted += stmt.execute(params![
                    record.site_id,
                    record.category_id,
                    record.run_date,
                    record.category_json
                ])?;
            }
        }
        tx.commit()?;
        Ok(inserted)
    }
}

fn run_from_row(row: &Row<'_>) -> rusqlite::Result<RunRecord> {
    Ok(RunRecord {
        id: row.get(0)?,
        started_at: row.get(1)?,
        finished_at: row.get(2)?,
        config_hash: row.get(3)?,
        run_date: row.get(4)?,
        status: RunStatus::from_db_string(&row.get::<_, String>(5)?)
            .unwrap_or(RunStatus::Running),
    })
}

fn outcome_from_row(row: &Row<'_>) -> rusqlite::Result<CategoryOutcome> {
    Ok(CategoryOutcome {
        run_id: row.get(0)?,
        site_id: row.get(1)?,
        category_id: row.get(2)?,
        path: CrawlPath::from_db_string(&row.get::<_, String>(3)?).unwrap_or(CrawlPath::Unknown),
        advertised_total: row.get::<_, i64>(4)? as u64,
        distinct_items: row.get::<_, i64>(5)? as u64,
        partitions_tried: row.get::<_, i64>(6)? as u64,
        failed_pages: row.get::<_, i64>(7)? as u64,
        status: CategoryStatus::from_db_string(&row.get::<_, String>(8)?)
            .unwrap_or(CategoryStatus::Failed),
        message: row.get(9)?,
    })
}

impl Storage for SqliteStorage {
    // ===== Run Management =====

    fn create_run(&mut self, config_hash: &str, run_date: &str) -> StorageResult<i64> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO runs (started_at, config_hash, run_date, status) VALUES (?1, ?2, ?3, ?4)",
            params![now, config_hash, run_date, RunStatus::Running.to_db_string()],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn get_run(&self, run_id: i64) -> StorageResult<RunRecord> {
        self.conn
            .query_row(
                "SELECT id, started_at, finished_at, config_hash, run_date, status
                 FROM runs WHERE id = ?1",
                params![run_id],
                run_from_row,
            )
            .optional()?
            .ok_or(StorageError::RunNotFound(run_id))
    }

    fn get_latest_run(&self) -> StorageResult<Option<RunRecord>> {
        let run = self
            .conn
            .query_row(
                "SELECT id, started_at, finished_at, config_hash, run_date, status
                 FROM runs ORDER BY id DESC LIMIT 1",
                [],
                run_from_row,
            )
            .optional()?;
        Ok(run)
    }

    fn update_run_status(&mut self, run_id: i64, status: RunStatus) -> StorageResult<()> {
        let updated = self.conn.execute(
            "UPDATE runs SET status = ?1 WHERE id = ?2",
            params![status.to_db_string(), run_id],
        )?;
        if updated == 0 {
            return Err(StorageError::RunNotFound(run_id));
        }
        Ok(())
    }

    fn complete_run(&mut self, run_id: i64) -> StorageResult<()> {
        let now = Utc::now().to_rfc3339();
        let updated = self.conn.execute(
            "UPDATE runs SET status = ?1, finished_at = ?2 WHERE id = ?3",
            params![RunStatus::Completed.to_db_string(), now, run_id],
        )?;
        if updated == 0 {
            return Err(StorageError::RunNotFound(run_id));
        }
        Ok(())
    }

    // ===== Tokens =====

    fn save_token(&mut self, token: &AccessToken) -> StorageResult<()> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO oauth_token
             (access_token, token_type, expires_in, scope, user_id, refresh_token, expires_at, saved_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                token.access_token,
                token.token_type,
                token.expires_in as i64,
                token.scope,
                token.user_id.map(|id| id as i64),
                token.refresh_token,
                token.expires_at.to_rfc3339(),
                now
            ],
        )?;
        Ok(())
    }

    fn load_latest_token(&self) -> StorageResult<Option<AccessToken>> {
        let row = self
            .conn
            .query_row(
                "SELECT access_token, token_type, expires_in, scope, user_id, refresh_token, expires_at
                 FROM oauth_token ORDER BY expires_at DESC, id DESC LIMIT 1",
                [],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, i64>(2)?,
                        row.get::<_, String>(3)?,
                        row.get::<_, Option<i64>>(4)?,
                        row.get::<_, Option<String>>(5)?,
                        row.get::<_, String>(6)?,
                    ))
                },
            )
            .optional()?;

        let Some((access_token, token_type, expires_in, scope, user_id, refresh_token, expires_at)) =
            row
        else {
            return Ok(None);
        };

        let expires_at = expires_at
            .parse::<DateTime<Utc>>()
            .map_err(|e| StorageError::Serialization(format!("Bad token expiry: {}", e)))?;

        Ok(Some(AccessToken {
            access_token,
            refresh_token,
            token_type,
            scope,
            user_id: user_id.map(|id| id as u64),
            expires_in: expires_in as u64,
            expires_at,
        }))
    }

    // ===== Categories =====

    fn insert_base_categories(&mut self, records: &[CategoryRecord]) -> StorageResult<usize> {
        self.insert_category_rows("base_categories", records)
    }

    fn insert_categories(&mut self, records: &[CategoryRecord]) -> StorageResult<usize> {
        self.insert_category_rows("categories", records)
    }

    // ===== Items =====

    fn insert_items(&mut self, records: &[ItemRecord]) -> StorageResult<usize> {
        if records.is_empty() {
            return Ok(0);
        }

        let tx = self.conn.transaction()?;
        let mut inserted = 0;
        {
            let mut stmt = tx.prepare(
                "INSERT OR IGNORE INTO items (site_id, item_id, last_run, category_id, item_json)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
            )?;
            for record in records {
                inserted += stmt.execute(params![
                    record.site_id,
                    record.item_id,
                    record.run_date,
                    record.category_id,
                    record.item_json
                ])?;
            }
        }
        tx.commit()?;
        Ok(inserted)
    }

    fn count_distinct_items(
        &self,
        site_id: &str,
        category_id: &str,
        run_date: &str,
    ) -> StorageResult<u64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(DISTINCT item_id) FROM items
             WHERE site_id = ?1 AND category_id = ?2 AND last_run = ?3",
            params![site_id, category_id, run_date],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    fn count_items_for_run_date(&self, run_date: &str) -> StorageResult<u64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM items WHERE last_run = ?1",
            params![run_date],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    // ===== Outcomes =====

    fn record_outcome(&mut self, outcome: &CategoryOutcome) -> StorageResult<()> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO category_outcomes
             (run_id, site_id, category_id, path, advertised_total, distinct_items,
              partitions_tried, failed_pages, status, message, recorded_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            params![
                outcome.run_id,
                outcome.site_id,
                outcome.category_id,
                outcome.path.to_db_string(),
                outcome.advertised_total as i64,
                outcome.distinct_items as i64,
                outcome.partitions_tried as i64,
                outcome.failed_pages as i64,
                outcome.status.to_db_string(),
                outcome.message,
                now
            ],
        )?;
        Ok(())
    }

    fn get_outcomes(&self, run_id: i64) -> StorageResult<Vec<CategoryOutcome>> {
        let mut stmt = self.conn.prepare(
            "SELECT run_id, site_id, category_id, path, advertised_total, distinct_items,
             partitions_tried, failed_pages, status, message
             FROM category_outcomes WHERE run_id = ?1 ORDER BY id",
        )?;

        let outcomes = stmt
            .query_map(params![run_id], outcome_from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(outcomes)
    }

    fn count_outcomes_by_status(
        &self,
        run_id: i64,
    ) -> StorageResult<HashMap<CategoryStatus, u64>> {
        let mut stmt = self.conn.prepare(
            "SELECT status, COUNT(*) FROM category_outcomes WHERE run_id = ?1 GROUP BY status",
        )?;

        let mut summary = HashMap::new();
        let rows = stmt.query_map(params![run_id], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
        })?;

        for row in rows {
            let (status_str, count) = row?;
            if let Some(status) = CategoryStatus::from_db_string(&status_str) {
                summary.insert(status, count as u64);
            }
        }

        Ok(summary)
    }
}
