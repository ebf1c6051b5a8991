#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]

//! Tipstore - versioned schema migrations for the tipstore cache database
//!
//! Tipstore keeps a SQLite-backed content cache and brings its schema up to
//! date at startup. Migrations are numbered, applied in ascending order, and
//! each one commits together with the new schema version, so a failed run
//! leaves the database at the last version that fully applied.
//!
//! # Feature Flags
//!
//! | Feature | Description | Key Dependencies |
//! |---------|-------------|------------------|
//! | `display` | Table formatting with `tabled` | `tabled` |
//! | `cli` | The `tipstore` command-line binary | `display` + `clap`, `tracing-subscriber` |
//!
//! ```toml
//! # Library only
//! tipstore = { version = "0.3", default-features = false }
//!
//! # Default (CLI binary)
//! tipstore = "0.3"
//! ```
//!
//! # Architecture
//!
//! - **[`database`]**: connection, store contract, migration engine, built-in schema
//! - **[`config`]**: configuration management
//! - **[`utils`]**: output formatting
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use tipstore::{TipstoreConfig, TipstoreDatabase};
//!
//! // Open or create the configured database; pending migrations run first
//! let config = TipstoreConfig::new(&None)?;
//! let db = TipstoreDatabase::open_with_config(&config)?;
//! let report = db.report();
//! println!("v{} -> v{} ({} applied)", report.old_version, report.new_version, report.applied.len());
//! ```
//!
//! ## Custom migrations
//!
//! ```rust,ignore
//! use tipstore::database::{DatabaseConn, MigrationError, MigrationRegistry, MigrationRunner, StoreTransaction};
//!
//! fn create_users(tx: &dyn StoreTransaction) -> anyhow::Result<()> {
//!     tx.execute_batch("CREATE TABLE users (id INTEGER PRIMARY KEY, name TEXT NOT NULL);")?;
//!     Ok(())
//! }
//!
//! fn drop_users(tx: &dyn StoreTransaction) -> anyhow::Result<()> {
//!     tx.execute_batch("DROP TABLE users;")?;
//!     Ok(())
//! }
//!
//! let mut registry = MigrationRegistry::new();
//! registry.register_named(1, "users", create_users, drop_users);
//! let migrations = registry.build()?;
//!
//! let db = DatabaseConn::open_path("app.sqlite3")?;
//! match MigrationRunner::new(&migrations).run(&db) {
//!     Ok(report) => println!("schema at v{}", report.new_version),
//!     Err(e) => eprintln!("{} (committed: {:?})", e, e.committed_version()),
//! }
//! ```

pub mod config;
pub mod database;
pub mod utils;

// =============================================================================
// Configuration
// =============================================================================

pub use config::TipstoreConfig;
pub use config::{format_size, get_sqlite_info, SqliteDatabaseInfo};

// =============================================================================
// Database Module - Re-export commonly used types
// =============================================================================

pub use database::TipstoreDatabase;

pub use database::{DatabaseConn, Store, StoreError, StoreTransaction};

pub use database::{
    Migration, MigrationError, MigrationRegistry, MigrationReport, MigrationRunner, MigrationSet,
    RollbackReport, RunnerOptions, SchemaStatus,
};

// =============================================================================
// Output formatting
// =============================================================================

pub use utils::OutputFormat;
