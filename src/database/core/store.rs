//! Transactional store contract
//!
//! The migration engine never touches storage directly. Everything it does
//! goes through [`Store`] (autocommit statements, used for bootstrap and
//! locking) and [`StoreTransaction`] (one per migration). Statements are
//! passed through untouched; the engine does not parse or validate SQL.
//!
//! [`DatabaseConn`](super::DatabaseConn) is the SQLite implementation.

use rusqlite::types::Value;
use rusqlite::ToSql;
use thiserror::Error;

/// Errors surfaced by a store operation
#[derive(Debug, Error)]
pub enum StoreError {
    /// A single-row query matched nothing
    #[error("query returned no rows")]
    NotFound,

    /// A statement touched a different number of rows than required
    #[error("expected {expected} row(s) to be affected, got {actual}")]
    RowCount { expected: usize, actual: usize },

    /// A query returned a value of the wrong type
    #[error("unexpected value in result: {0}")]
    UnexpectedValue(String),

    #[error(transparent)]
    Sqlite(rusqlite::Error),
}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        match err {
            rusqlite::Error::QueryReturnedNoRows => StoreError::NotFound,
            other => StoreError::Sqlite(other),
        }
    }
}

impl StoreError {
    /// Whether this is the "no row" condition rather than a real failure
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound)
    }
}

/// A store that can run single statements and open transactions
pub trait Store {
    /// Begin a new transaction
    ///
    /// Dropping the returned transaction without committing rolls it back.
    fn begin(&self) -> Result<Box<dyn StoreTransaction + '_>, StoreError>;

    /// Execute a single statement outside of any transaction
    fn execute(&self, sql: &str, params: &[&dyn ToSql]) -> Result<usize, StoreError>;

    /// Fetch exactly one row
    ///
    /// Returns [`StoreError::NotFound`] when the query matches no rows.
    fn query_one(&self, sql: &str, params: &[&dyn ToSql]) -> Result<Vec<Value>, StoreError>;

    /// Fetch the first column of exactly one row as an integer
    fn query_i64(&self, sql: &str, params: &[&dyn ToSql]) -> Result<i64, StoreError> {
        first_integer(self.query_one(sql, params)?)
    }
}

/// An open transaction on a [`Store`]
pub trait StoreTransaction {
    /// Execute a single statement inside the transaction
    fn execute(&self, sql: &str, params: &[&dyn ToSql]) -> Result<usize, StoreError>;

    /// Execute a batch of semicolon-separated statements without parameters
    fn execute_batch(&self, sql: &str) -> Result<(), StoreError>;

    /// Fetch exactly one row inside the transaction
    fn query_one(&self, sql: &str, params: &[&dyn ToSql]) -> Result<Vec<Value>, StoreError>;

    fn query_i64(&self, sql: &str, params: &[&dyn ToSql]) -> Result<i64, StoreError> {
        first_integer(self.query_one(sql, params)?)
    }

    fn commit(self: Box<Self>) -> Result<(), StoreError>;

    fn rollback(self: Box<Self>) -> Result<(), StoreError>;
}

/// Extract the first column of a row as an integer
fn first_integer(row: Vec<Value>) -> Result<i64, StoreError> {
    match row.into_iter().next() {
        Some(Value::Integer(v)) => Ok(v),
        other => Err(StoreError::UnexpectedValue(format!(
            "expected integer, got {:?}",
            other
        ))),
    }
}

/// Extract the first column of a row as text
#[cfg(test)]
pub(crate) fn first_text(row: Vec<Value>) -> Result<String, StoreError> {
    match row.into_iter().next() {
        Some(Value::Text(s)) => Ok(s),
        other => Err(StoreError::UnexpectedValue(format!(
            "expected text, got {:?}",
            other
        ))),
    }
}
