//! Core database infrastructure
//!
//! This module provides the foundational database components used throughout tipstore:
//! - `DatabaseConn`: Core SQLite connection wrapper with configuration
//! - `Store` / `StoreTransaction`: the storage contract the migration engine runs against

mod connection;
mod store;

pub use connection::{DatabaseConn, DEFAULT_BUSY_TIMEOUT};
pub use store::{Store, StoreError, StoreTransaction};

#[cfg(test)]
pub(crate) use store::first_text;
