//! Advisory migration lock
//!
//! A singleton row in `schema_lock` marks a runner invocation in progress.
//! The row is inserted before the version is read and deleted by its holder
//! when the guard is dropped. A row older than the stale threshold is assumed
//! to belong to a crashed process and is taken over.

use std::time::Duration;

use chrono::Utc;
use rusqlite::params;
use rusqlite::types::Value;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::database::core::{Store, StoreError};

use super::error::MigrationError;

pub(crate) const LOCK_TABLE: &str = r#"
    CREATE TABLE IF NOT EXISTS schema_lock (
        id INTEGER PRIMARY KEY CHECK (id = 1),
        holder TEXT NOT NULL,
        acquired_at INTEGER NOT NULL
    );
"#;

/// Held migration lock; released on drop
pub(crate) struct MigrationLock<'s, S: Store + ?Sized> {
    store: &'s S,
    holder: String,
}

impl<'s, S: Store + ?Sized> MigrationLock<'s, S> {
    /// Try to take the lock, replacing it if its holder went stale
    ///
    /// Expects the lock table to exist.
    pub(crate) fn acquire(store: &'s S, stale_after: Duration) -> Result<Self, MigrationError> {
        let holder = Uuid::new_v4().to_string();
        let now = Utc::now().timestamp();
        // thresholds beyond i64 seconds mean "never stale"
        let stale_secs = i64::try_from(stale_after.as_secs()).unwrap_or(i64::MAX);
        let stale_before = now.saturating_sub(stale_secs);

        let removed = store
            .execute(
                "DELETE FROM schema_lock WHERE id = 1 AND acquired_at < ?1",
                params![stale_before],
            )
            .map_err(MigrationError::Lock)?;
        if removed > 0 {
            warn!(
                "Took over stale migration lock (older than {} seconds)",
                stale_after.as_secs()
            );
        }

        let inserted = store
            .execute(
                "INSERT OR IGNORE INTO schema_lock (id, holder, acquired_at) VALUES (1, ?1, ?2)",
                params![holder, now],
            )
            .map_err(MigrationError::Lock)?;

        if inserted == 1 {
            debug!("Acquired migration lock {}", holder);
            return Ok(Self { store, holder });
        }

        let row = store
            .query_one(
                "SELECT holder, acquired_at FROM schema_lock WHERE id = 1",
                &[],
            )
            .map_err(MigrationError::Lock)?;
        let mut columns = row.into_iter();
        match (columns.next(), columns.next()) {
            (Some(Value::Text(holder)), Some(Value::Integer(acquired_at))) => {
                Err(MigrationError::Locked {
                    holder,
                    acquired_at,
                })
            }
            other => Err(MigrationError::Lock(StoreError::UnexpectedValue(format!(
                "malformed lock row: {:?}",
                other
            )))),
        }
    }

    pub(crate) fn holder(&self) -> &str {
        &self.holder
    }
}

impl<S: Store + ?Sized> Drop for MigrationLock<'_, S> {
    fn drop(&mut self) {
        match self.store.execute(
            "DELETE FROM schema_lock WHERE id = 1 AND holder = ?1",
            params![self.holder],
        ) {
            Ok(_) => debug!("Released migration lock {}", self.holder),
            Err(e) => warn!("Failed to release migration lock {}: {}", self.holder, e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::core::{first_text, DatabaseConn};

    fn lock_db() -> DatabaseConn {
        let db = DatabaseConn::open_in_memory().unwrap();
        db.execute(LOCK_TABLE, &[]).unwrap();
        db
    }

    #[test]
    fn test_acquire_and_release() {
        let db = lock_db();
        {
            let lock = MigrationLock::acquire(&db, Duration::from_secs(600)).unwrap();
            let holder = db
                .query_one("SELECT holder FROM schema_lock WHERE id = 1", &[])
                .map(first_text)
                .unwrap()
                .unwrap();
            assert_eq!(holder, lock.holder());
        }
        assert_eq!(db.table_count("schema_lock").unwrap(), 0);
    }

    #[test]
    fn test_second_acquire_is_locked() {
        let db = lock_db();
        let first = MigrationLock::acquire(&db, Duration::from_secs(600)).unwrap();

        match MigrationLock::acquire(&db, Duration::from_secs(600)) {
            Err(MigrationError::Locked { holder, .. }) => assert_eq!(holder, first.holder()),
            Err(e) => panic!("expected locked error, got {}", e),
            Ok(_) => panic!("expected locked error, got a second lock"),
        }

        // the failed attempt must not release the held lock
        assert_eq!(db.table_count("schema_lock").unwrap(), 1);
    }

    #[test]
    fn test_stale_lock_taken_over() {
        let db = lock_db();
        let old = Utc::now().timestamp() - 3600;
        db.execute(
            "INSERT INTO schema_lock (id, holder, acquired_at) VALUES (1, 'crashed', ?1)",
            params![old],
        )
        .unwrap();

        let lock = MigrationLock::acquire(&db, Duration::from_secs(600)).unwrap();
        assert_ne!(lock.holder(), "crashed");
    }

    #[test]
    fn test_huge_stale_threshold_keeps_fresh_lock() {
        let db = lock_db();
        db.execute(
            "INSERT INTO schema_lock (id, holder, acquired_at) VALUES (1, 'other-process', ?1)",
            params![Utc::now().timestamp()],
        )
        .unwrap();

        match MigrationLock::acquire(&db, Duration::from_secs(u64::MAX)) {
            Err(MigrationError::Locked { holder, .. }) => assert_eq!(holder, "other-process"),
            Err(e) => panic!("expected locked error, got {}", e),
            Ok(_) => panic!("fresh lock was taken over"),
        };
    }

    #[test]
    fn test_release_only_own_lock() {
        let db = lock_db();
        let lock = MigrationLock::acquire(&db, Duration::from_secs(600)).unwrap();

        // someone else took over after we went stale
        db.execute(
            "UPDATE schema_lock SET holder = 'other' WHERE id = 1",
            &[],
        )
        .unwrap();
        drop(lock);

        assert_eq!(db.table_count("schema_lock").unwrap(), 1);
    }
}
