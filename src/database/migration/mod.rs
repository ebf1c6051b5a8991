//! Versioned schema migrations
//!
//! - **registry**: migration records and the validated [`MigrationSet`]
//! - **select**: which migrations are still pending
//! - **runner**: applies pending migrations, one transaction each
//! - **lock**: advisory lock serializing concurrent runner invocations
//! - **status**: read-only classification of a store
//!
//! ```rust,ignore
//! use tipstore::database::{DatabaseConn, MigrationRegistry, MigrationRunner};
//!
//! let mut registry = MigrationRegistry::new();
//! registry.register_named(1, "content_cache", create_cache, drop_cache);
//! let migrations = registry.build()?;
//!
//! let db = DatabaseConn::open_path("tipstore.sqlite3")?;
//! let report = MigrationRunner::new(&migrations).run(&db)?;
//! println!("v{} -> v{}", report.old_version, report.new_version);
//! ```

mod error;
mod lock;
mod registry;
mod runner;
mod select;
mod status;

pub use error::{MigrationError, MigrationStep};
pub use registry::{Migration, MigrationFn, MigrationRegistry, MigrationSet};
pub use runner::{
    MigrationReport, MigrationRunner, RollbackReport, RunnerOptions, DEFAULT_STALE_LOCK_AFTER,
};
pub use select::select_pending;
pub use status::{describe_migrations, MigrationInfo, MigrationState, SchemaStatus};
