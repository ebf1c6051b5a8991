//! Database module
//!
//! This module provides all database functionality for tipstore, organized into:
//!
//! - **core**: SQLite connection wrapper and the transactional store contract
//! - **migration**: versioned schema migrations (registry, runner, lock, status)
//! - **schema**: the built-in tipstore tables and their migrations
//! - **tipstore**: the main database, migrated on open
//!
//! # Architecture
//!
//! ```text
//! database/
//! ├── core/           # Foundation
//! │   ├── connection  # SQLite DatabaseConn wrapper
//! │   └── store       # Store / StoreTransaction contract
//! │
//! ├── migration/      # Schema migration engine
//! │   ├── registry    # Migration records, MigrationSet
//! │   ├── select      # Pending-set selection
//! │   ├── runner      # Apply / roll back, one transaction per version
//! │   ├── lock        # Advisory lock across invocations
//! │   └── status      # Read-only status classification
//! │
//! ├── schema          # Built-in content_cache / dependent_values migrations
//! └── tipstore        # TipstoreDatabase
//! ```
//!
//! # Usage
//!
//! ```rust,ignore
//! use tipstore::database::TipstoreDatabase;
//!
//! // Open the database; pending migrations are applied first
//! let db = TipstoreDatabase::open_in_dir("/var/lib/tipstore")?;
//! println!("schema at v{}", db.report().new_version);
//! ```
//!
//! Custom migrations run against any [`Store`]:
//!
//! ```rust,ignore
//! use tipstore::database::{DatabaseConn, MigrationRegistry, MigrationRunner};
//!
//! let mut registry = MigrationRegistry::new();
//! registry.register(1, create_users, drop_users);
//! let migrations = registry.build()?;
//!
//! let db = DatabaseConn::open_path("app.sqlite3")?;
//! MigrationRunner::new(&migrations).run(&db)?;
//! ```

pub mod core;
pub mod migration;
pub mod schema;
mod tipstore;

// Connection and store contract
pub use core::{DatabaseConn, Store, StoreError, StoreTransaction, DEFAULT_BUSY_TIMEOUT};

// Migration engine
pub use migration::{
    describe_migrations, select_pending, Migration, MigrationError, MigrationFn, MigrationInfo,
    MigrationRegistry, MigrationReport, MigrationRunner, MigrationSet, MigrationState,
    MigrationStep, RollbackReport, RunnerOptions, SchemaStatus, DEFAULT_STALE_LOCK_AFTER,
};

// Built-in schema
pub use schema::{builtin_migrations, register_builtin, SchemaDefinitions};

// Main database
pub use tipstore::{TipstoreDatabase, DATABASE_FILE_NAME};

/// Ensure the data directory exists
pub fn ensure_data_dir(data_dir: &str) -> anyhow::Result<()> {
    std::fs::create_dir_all(data_dir)
        .map_err(|e| anyhow::anyhow!("Failed to create data directory '{}': {}", data_dir, e))
}
