//! Migration runner
//!
//! Applies pending migrations from a [`MigrationSet`] against a [`Store`]:
//!
//! 1. create the tracking tables if absent (`schema_lock`, `schema_version`)
//! 2. take the advisory migration lock
//! 3. read the current version, initializing it to 0 on first run
//! 4. apply each pending migration in ascending order, each in its own
//!    transaction that also advances `schema_version`
//!
//! The run stops at the first failure. Migrations committed before the
//! failure stay committed, and the error reports the durable version.

use std::cmp::Reverse;
use std::time::Duration;

use chrono::Utc;
use rusqlite::params;
use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::database::core::{Store, StoreError, StoreTransaction};

use super::error::{MigrationError, MigrationStep};
use super::lock::{MigrationLock, LOCK_TABLE};
use super::registry::{Migration, MigrationFn, MigrationSet};
use super::status::SchemaStatus;

/// Singleton tracking table; `id` can only ever be 1
pub(crate) const VERSION_TABLE: &str = r#"
    CREATE TABLE IF NOT EXISTS schema_version (
        id INTEGER PRIMARY KEY CHECK (id = 1),
        version INTEGER NOT NULL,
        updated_at INTEGER NOT NULL
    );
"#;

/// Default age after which a migration lock is considered abandoned (10 minutes)
pub const DEFAULT_STALE_LOCK_AFTER: Duration = Duration::from_secs(10 * 60);

/// Runner settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunnerOptions {
    /// Take the advisory lock before reading the version. Only disable this
    /// when the deployment guarantees a single invoker per store.
    pub lock: bool,
    /// Lock age after which another invocation may take it over
    pub stale_lock_after: Duration,
}

impl Default for RunnerOptions {
    fn default() -> Self {
        Self {
            lock: true,
            stale_lock_after: DEFAULT_STALE_LOCK_AFTER,
        }
    }
}

/// Outcome of a successful [`MigrationRunner::run`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MigrationReport {
    /// Version before the run
    pub old_version: i64,
    /// Version after the run; equal to `old_version` if nothing was pending
    pub new_version: i64,
    /// Versions applied, in order
    pub applied: Vec<i64>,
}

impl MigrationReport {
    pub fn is_noop(&self) -> bool {
        self.applied.is_empty()
    }
}

/// Outcome of a successful [`MigrationRunner::rollback_to`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RollbackReport {
    pub old_version: i64,
    pub new_version: i64,
    /// Versions reverted, highest first
    pub reverted: Vec<i64>,
}

/// Applies a [`MigrationSet`] to a store
pub struct MigrationRunner<'m> {
    migrations: &'m MigrationSet,
    options: RunnerOptions,
}

impl<'m> MigrationRunner<'m> {
    pub fn new(migrations: &'m MigrationSet) -> Self {
        Self::with_options(migrations, RunnerOptions::default())
    }

    pub fn with_options(migrations: &'m MigrationSet, options: RunnerOptions) -> Self {
        Self {
            migrations,
            options,
        }
    }

    pub fn options(&self) -> &RunnerOptions {
        &self.options
    }

    /// Apply every pending migration
    ///
    /// Assumes no other invocation runs against the same store unless the
    /// lock is enabled.
    pub fn run<S: Store + ?Sized>(&self, store: &S) -> Result<MigrationReport, MigrationError> {
        bootstrap(store)?;
        let lock = self.acquire_lock(store)?;
        if let Some(lock) = &lock {
            debug!("Running migrations under lock {}", lock.holder());
        }

        let old_version = read_or_init_version(store)?;
        let pending = self.migrations.pending(old_version);
        if pending.is_empty() {
            info!("Schema is current at v{}", old_version);
            return Ok(MigrationReport {
                old_version,
                new_version: old_version,
                applied: Vec::new(),
            });
        }

        info!(
            "Applying {} pending migration(s) from v{}",
            pending.len(),
            old_version
        );

        let mut committed_version = old_version;
        let mut applied = Vec::with_capacity(pending.len());
        for migration in pending {
            debug!("Applying migration {}", migration.label());
            transact(store, migration.up, migration.version).map_err(|(step, source)| {
                error!(
                    "Migration {} failed during {}: {:#}",
                    migration.label(),
                    step,
                    source
                );
                MigrationError::Apply {
                    version: migration.version,
                    step,
                    old_version,
                    committed_version,
                    source,
                }
            })?;

            committed_version = migration.version;
            applied.push(migration.version);
            info!("Applied migration {}", migration.label());
        }

        info!(
            "Migrated schema from v{} to v{}",
            old_version, committed_version
        );
        Ok(MigrationReport {
            old_version,
            new_version: committed_version,
            applied,
        })
    }

    /// Revert applied migrations down to `target` by running their `down`
    /// procedures, highest version first
    ///
    /// Each revert is its own transaction and moves `schema_version` to the
    /// next lower registered version (0 below the first). Never called by
    /// [`run`](Self::run).
    pub fn rollback_to<S: Store + ?Sized>(
        &self,
        store: &S,
        target: i64,
    ) -> Result<RollbackReport, MigrationError> {
        if target < 0 {
            return Err(MigrationError::InvalidVersion { version: target });
        }

        bootstrap(store)?;
        let _lock = self.acquire_lock(store)?;

        let old_version = read_or_init_version(store)?;
        if target >= old_version {
            info!(
                "Schema is at v{}, nothing to roll back to v{}",
                old_version, target
            );
            return Ok(RollbackReport {
                old_version,
                new_version: old_version,
                reverted: Vec::new(),
            });
        }
        if self.migrations.get(old_version).is_none() {
            return Err(MigrationError::UnknownVersion {
                version: old_version,
            });
        }

        let mut to_revert: Vec<&Migration> = self
            .migrations
            .migrations()
            .iter()
            .filter(|m| m.version > target && m.version <= old_version)
            .collect();
        to_revert.sort_by_key(|m| Reverse(m.version));

        let mut committed_version = old_version;
        let mut reverted = Vec::with_capacity(to_revert.len());
        for migration in to_revert {
            let previous = self.migrations.previous_version(migration.version);
            debug!(
                "Reverting migration {} to v{}",
                migration.label(),
                previous
            );
            transact(store, migration.down, previous).map_err(|(step, source)| {
                error!(
                    "Rollback of {} failed during {}: {:#}",
                    migration.label(),
                    step,
                    source
                );
                MigrationError::Rollback {
                    version: migration.version,
                    step,
                    old_version,
                    committed_version,
                    source,
                }
            })?;

            committed_version = previous;
            reverted.push(migration.version);
            info!("Reverted migration {}", migration.label());
        }

        info!(
            "Rolled back schema from v{} to v{}",
            old_version, committed_version
        );
        Ok(RollbackReport {
            old_version,
            new_version: committed_version,
            reverted,
        })
    }

    /// Read the recorded version without creating anything
    ///
    /// Returns `None` when the store has never been migrated.
    pub fn current_version<S: Store + ?Sized>(
        &self,
        store: &S,
    ) -> Result<Option<i64>, MigrationError> {
        let tables = store
            .query_i64(
                "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = 'schema_version'",
                &[],
            )
            .map_err(MigrationError::ReadVersion)?;
        if tables == 0 {
            return Ok(None);
        }

        match read_version(store) {
            Ok(version) => Ok(Some(version)),
            Err(StoreError::NotFound) => Ok(None),
            Err(e) => Err(MigrationError::ReadVersion(e)),
        }
    }

    /// Classify the store against the registered migrations, read-only
    pub fn status<S: Store + ?Sized>(&self, store: &S) -> Result<SchemaStatus, MigrationError> {
        Ok(match self.current_version(store)? {
            Some(version) => SchemaStatus::classify(self.migrations, version),
            None => SchemaStatus::NotInitialized,
        })
    }

    /// The migrations [`run`](Self::run) would apply, read-only
    pub fn plan<S: Store + ?Sized>(&self, store: &S) -> Result<Vec<&'m Migration>, MigrationError> {
        let current = self.current_version(store)?.unwrap_or(0);
        Ok(self.migrations.pending(current))
    }

    fn acquire_lock<'s, S: Store + ?Sized>(
        &self,
        store: &'s S,
    ) -> Result<Option<MigrationLock<'s, S>>, MigrationError> {
        if !self.options.lock {
            return Ok(None);
        }
        MigrationLock::acquire(store, self.options.stale_lock_after).map(Some)
    }
}

/// Create the tracking tables if they don't exist
fn bootstrap<S: Store + ?Sized>(store: &S) -> Result<(), MigrationError> {
    debug!("Ensuring schema tracking tables exist");
    store
        .execute(LOCK_TABLE, &[])
        .map_err(MigrationError::Bootstrap)?;
    store
        .execute(VERSION_TABLE, &[])
        .map_err(MigrationError::Bootstrap)?;
    Ok(())
}

fn read_version<S: Store + ?Sized>(store: &S) -> Result<i64, StoreError> {
    store.query_i64("SELECT version FROM schema_version WHERE id = 1", &[])
}

/// Read the version, recording v0 if the store has none yet
fn read_or_init_version<S: Store + ?Sized>(store: &S) -> Result<i64, MigrationError> {
    match read_version(store) {
        Ok(version) => Ok(version),
        Err(StoreError::NotFound) => {
            debug!("No schema version recorded, initializing to v0");
            store
                .execute(
                    "INSERT OR IGNORE INTO schema_version (id, version, updated_at) VALUES (1, 0, ?1)",
                    params![Utc::now().timestamp()],
                )
                .map_err(MigrationError::ReadVersion)?;
            read_version(store).map_err(MigrationError::ReadVersion)
        }
        Err(e) => Err(MigrationError::ReadVersion(e)),
    }
}

/// Point the singleton tracking row at `version`
fn write_version(tx: &dyn StoreTransaction, version: i64) -> Result<(), StoreError> {
    let updated = tx.execute(
        "UPDATE schema_version SET version = ?1, updated_at = ?2 WHERE id = 1",
        params![version, Utc::now().timestamp()],
    )?;
    if updated != 1 {
        return Err(StoreError::RowCount {
            expected: 1,
            actual: updated,
        });
    }
    Ok(())
}

/// Run `body` and record `version` in one transaction
fn transact<S: Store + ?Sized>(
    store: &S,
    body: MigrationFn,
    version: i64,
) -> Result<(), (MigrationStep, anyhow::Error)> {
    let tx = store
        .begin()
        .map_err(|e| (MigrationStep::Begin, e.into()))?;

    if let Err(e) = body(&*tx) {
        abort(tx);
        return Err((MigrationStep::Body, e));
    }

    if let Err(e) = write_version(&*tx, version) {
        abort(tx);
        return Err((MigrationStep::RecordVersion, e.into()));
    }

    tx.commit().map_err(|e| (MigrationStep::Commit, e.into()))
}

fn abort(tx: Box<dyn StoreTransaction + '_>) {
    if let Err(e) = tx.rollback() {
        warn!("Failed to roll back migration transaction: {}", e);
    }
}
