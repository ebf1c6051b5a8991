//! Tipstore database
//!
//! Opening a [`TipstoreDatabase`] brings the schema up to date with the
//! built-in migrations before anything else touches it. Any migration error
//! fails the open.

use anyhow::{Context, Result};
use tracing::info;

use crate::config::TipstoreConfig;
use crate::database::core::DatabaseConn;
use crate::database::migration::{
    MigrationReport, MigrationRunner, MigrationSet, RunnerOptions, SchemaStatus,
};
use crate::database::schema::builtin_migrations;

/// File name of the database inside the data directory
pub const DATABASE_FILE_NAME: &str = "tipstore-data.sqlite3";

/// Main tipstore database (SQLite backend)
pub struct TipstoreDatabase {
    db: DatabaseConn,
    migrations: MigrationSet,
    report: MigrationReport,
}

impl TipstoreDatabase {
    /// Open the database at the specified path and apply pending migrations
    ///
    /// If the database doesn't exist, it will be created.
    pub fn open(path: &str) -> Result<Self> {
        Self::open_with_options(path, RunnerOptions::default())
    }

    pub fn open_with_options(path: &str, options: RunnerOptions) -> Result<Self> {
        let db = DatabaseConn::open_path(path)?;
        Self::migrate(db, options)
    }

    /// Open the database described by a configuration
    ///
    /// Uses the configured data directory, busy timeout and lock settings.
    pub fn open_with_config(config: &TipstoreConfig) -> Result<Self> {
        crate::database::ensure_data_dir(&config.data_dir)?;
        let db = DatabaseConn::open_path(&config.sqlite_path())?;
        db.set_busy_timeout(config.busy_timeout())?;
        Self::migrate(db, config.runner_options())
    }

    /// Open the database from a data directory
    ///
    /// Uses the standard database file path: `{data_dir}/tipstore-data.sqlite3`.
    /// The path is used as given; `~` is not expanded.
    pub fn open_in_dir(data_dir: &str) -> Result<Self> {
        crate::database::ensure_data_dir(data_dir)?;
        let path = format!("{}/{}", data_dir.trim_end_matches('/'), DATABASE_FILE_NAME);
        Self::open(&path)
    }

    /// Create an in-memory database (for testing)
    pub fn open_in_memory() -> Result<Self> {
        let db = DatabaseConn::open_in_memory()?;
        Self::migrate(db, RunnerOptions::default())
    }

    fn migrate(db: DatabaseConn, options: RunnerOptions) -> Result<Self> {
        let migrations = builtin_migrations().context("Invalid built-in migrations")?;
        let report = MigrationRunner::with_options(&migrations, options)
            .run(&db)
            .context("Failed to migrate tipstore database")?;

        if report.is_noop() {
            info!("Tipstore database schema is current at v{}", report.new_version);
        } else {
            info!(
                "Tipstore database migrated from v{} to v{}",
                report.old_version, report.new_version
            );
        }

        Ok(Self {
            db,
            migrations,
            report,
        })
    }

    /// Get the underlying database connection (for advanced queries)
    pub fn connection(&self) -> &rusqlite::Connection {
        &self.db.conn
    }

    /// The store the migrations ran against
    pub fn store(&self) -> &DatabaseConn {
        &self.db
    }

    pub fn migrations(&self) -> &MigrationSet {
        &self.migrations
    }

    /// What the migration run on open did
    pub fn report(&self) -> &MigrationReport {
        &self.report
    }

    /// Current recorded schema version
    pub fn schema_version(&self) -> Result<i64> {
        Ok(self.status()?.version())
    }

    pub fn status(&self) -> Result<SchemaStatus> {
        MigrationRunner::new(&self.migrations)
            .status(&self.db)
            .context("Failed to read schema status")
    }
}
