//! Database connection management
//!
//! This module provides the SQLite connection wrapper used throughout tipstore,
//! and its implementation of the [`Store`] contract.

use std::time::Duration;

use anyhow::{anyhow, Result};
use rusqlite::types::Value;
use rusqlite::{Connection, InterruptHandle, ToSql, Transaction};

use super::store::{Store, StoreError, StoreTransaction};

/// Default time a statement waits on a locked database before failing
pub const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Core database connection wrapper
///
/// `DatabaseConn` provides a thin wrapper around SQLite connections,
/// handling both file-based and in-memory databases with consistent
/// configuration and error handling.
pub struct DatabaseConn {
    pub conn: Connection,
}

impl DatabaseConn {
    /// Open a database at the specified path
    ///
    /// If the path is `None`, an in-memory database is created.
    pub fn open(path: Option<&str>) -> Result<Self> {
        let conn = match path {
            Some(p) => Connection::open(p)
                .map_err(|e| anyhow!("Failed to open database at '{}': {}", p, e))?,
            None => Connection::open_in_memory()
                .map_err(|e| anyhow!("Failed to create in-memory database: {}", e))?,
        };

        let db = DatabaseConn { conn };
        db.configure()?;
        Ok(db)
    }

    /// Open a database at the specified path (convenience method)
    pub fn open_path(path: &str) -> Result<Self> {
        Self::open(Some(path))
    }

    /// Create an in-memory database
    pub fn open_in_memory() -> Result<Self> {
        Self::open(None)
    }

    fn configure(&self) -> Result<()> {
        // WAL lets readers proceed while a migration transaction is open
        let _: String = self
            .conn
            .query_row("PRAGMA journal_mode=WAL", [], |row| row.get(0))
            .map_err(|e| anyhow!("Failed to set journal mode: {}", e))?;

        self.conn
            .execute("PRAGMA synchronous=NORMAL", [])
            .map_err(|e| anyhow!("Failed to set synchronous mode: {}", e))?;

        // dependent_values references content_cache
        self.conn
            .execute("PRAGMA foreign_keys=ON", [])
            .map_err(|e| anyhow!("Failed to enable foreign keys: {}", e))?;

        self.set_busy_timeout(DEFAULT_BUSY_TIMEOUT)
    }

    /// Set how long a statement waits on a locked database before failing
    pub fn set_busy_timeout(&self, timeout: Duration) -> Result<()> {
        self.conn
            .busy_timeout(timeout)
            .map_err(|e| anyhow!("Failed to set busy timeout: {}", e))
    }

    /// Get a handle that can interrupt a long-running statement from another thread
    ///
    /// An interrupted statement fails like any other, so a migration in flight
    /// is rolled back and the run stops.
    pub fn interrupt_handle(&self) -> InterruptHandle {
        self.conn.get_interrupt_handle()
    }

    /// Check if a table exists in the database
    pub fn table_exists(&self, table_name: &str) -> Result<bool> {
        let count: i32 = self
            .conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name=?1",
                [table_name],
                |row| row.get(0),
            )
            .map_err(|e| anyhow!("Failed to check table existence: {}", e))?;
        Ok(count > 0)
    }

    /// Get the row count for a table
    pub fn table_count(&self, table_name: &str) -> Result<u64> {
        let query = format!("SELECT COUNT(*) FROM {}", table_name);
        let count: u64 = self
            .conn
            .query_row(&query, [], |row| row.get(0))
            .map_err(|e| anyhow!("Failed to get table count: {}", e))?;
        Ok(count)
    }
}

fn query_row_values(
    conn: &Connection,
    sql: &str,
    params: &[&dyn ToSql],
) -> Result<Vec<Value>, StoreError> {
    conn.query_row(sql, params, |row| {
        let columns = row.as_ref().column_count();
        (0..columns)
            .map(|i| row.get::<_, Value>(i))
            .collect::<rusqlite::Result<Vec<Value>>>()
    })
    .map_err(StoreError::from)
}

impl Store for DatabaseConn {
    fn begin(&self) -> Result<Box<dyn StoreTransaction + '_>, StoreError> {
        let tx = self.conn.unchecked_transaction()?;
        Ok(Box::new(tx))
    }

    fn execute(&self, sql: &str, params: &[&dyn ToSql]) -> Result<usize, StoreError> {
        Ok(self.conn.execute(sql, params)?)
    }

    fn query_one(&self, sql: &str, params: &[&dyn ToSql]) -> Result<Vec<Value>, StoreError> {
        query_row_values(&self.conn, sql, params)
    }
}

impl StoreTransaction for Transaction<'_> {
    fn execute(&self, sql: &str, params: &[&dyn ToSql]) -> Result<usize, StoreError> {
        let conn: &Connection = self;
        Ok(conn.execute(sql, params)?)
    }

    fn execute_batch(&self, sql: &str) -> Result<(), StoreError> {
        let conn: &Connection = self;
        Ok(conn.execute_batch(sql)?)
    }

    fn query_one(&self, sql: &str, params: &[&dyn ToSql]) -> Result<Vec<Value>, StoreError> {
        query_row_values(self, sql, params)
    }

    fn commit(self: Box<Self>) -> Result<(), StoreError> {
        Ok(Transaction::commit(*self)?)
    }

    fn rollback(self: Box<Self>) -> Result<(), StoreError> {
        Ok(Transaction::rollback(*self)?)
    }
}
