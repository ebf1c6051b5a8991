//! Built-in tipstore schema
//!
//! Table definitions for the tipstore cache and the migrations that create
//! them. Each schema change gets a new version; existing migrations are never
//! edited once released.

use crate::database::core::StoreTransaction;
use crate::database::migration::{MigrationError, MigrationRegistry, MigrationSet};

/// Schema definitions for the tipstore tables
pub struct SchemaDefinitions;

impl SchemaDefinitions {
    /// Cached content entries, keyed by cache key
    pub const CONTENT_CACHE_TABLE: &'static str = r#"
        CREATE TABLE IF NOT EXISTS content_cache (
            key TEXT PRIMARY KEY,
            payload BLOB NOT NULL,
            status INTEGER NOT NULL,
            content_type TEXT,
            expires_at INTEGER NOT NULL
        );
    "#;

    pub const CONTENT_CACHE_INDEXES: &'static [&'static str] = &[
        "CREATE INDEX IF NOT EXISTS idx_content_cache_expires_at ON content_cache(expires_at)",
    ];

    /// Values derived from a cached entry; removed with their parent
    pub const DEPENDENT_VALUES_TABLE: &'static str = r#"
        CREATE TABLE IF NOT EXISTS dependent_values (
            key TEXT PRIMARY KEY,
            parent_key TEXT NOT NULL REFERENCES content_cache(key) ON DELETE CASCADE,
            payload BLOB NOT NULL,
            committed INTEGER NOT NULL DEFAULT 0 CHECK (committed IN (0, 1)),
            expires_at INTEGER NOT NULL
        );
    "#;

    pub const DEPENDENT_VALUES_INDEXES: &'static [&'static str] = &[
        "CREATE INDEX IF NOT EXISTS idx_dependent_values_parent_key ON dependent_values(parent_key)",
        "CREATE INDEX IF NOT EXISTS idx_dependent_values_expires_at ON dependent_values(expires_at)",
    ];
}

fn create_content_cache(tx: &dyn StoreTransaction) -> anyhow::Result<()> {
    tx.execute(SchemaDefinitions::CONTENT_CACHE_TABLE, &[])?;
    for index_sql in SchemaDefinitions::CONTENT_CACHE_INDEXES {
        tx.execute(index_sql, &[])?;
    }
    Ok(())
}

fn drop_content_cache(tx: &dyn StoreTransaction) -> anyhow::Result<()> {
    tx.execute_batch(
        "DROP INDEX IF EXISTS idx_content_cache_expires_at;
         DROP TABLE IF EXISTS content_cache;",
    )?;
    Ok(())
}

fn create_dependent_values(tx: &dyn StoreTransaction) -> anyhow::Result<()> {
    tx.execute(SchemaDefinitions::DEPENDENT_VALUES_TABLE, &[])?;
    for index_sql in SchemaDefinitions::DEPENDENT_VALUES_INDEXES {
        tx.execute(index_sql, &[])?;
    }
    Ok(())
}

fn drop_dependent_values(tx: &dyn StoreTransaction) -> anyhow::Result<()> {
    tx.execute_batch(
        "DROP INDEX IF EXISTS idx_dependent_values_parent_key;
         DROP INDEX IF EXISTS idx_dependent_values_expires_at;
         DROP TABLE IF EXISTS dependent_values;",
    )?;
    Ok(())
}

/// Register the built-in migrations
pub fn register_builtin(registry: &mut MigrationRegistry) -> &mut MigrationRegistry {
    registry
        .register_named(1, "content_cache", create_content_cache, drop_content_cache)
        .register_named(
            2,
            "dependent_values",
            create_dependent_values,
            drop_dependent_values,
        )
}

/// The built-in migration set
pub fn builtin_migrations() -> Result<MigrationSet, MigrationError> {
    let mut registry = MigrationRegistry::new();
    register_builtin(&mut registry);
    registry.build()
}
