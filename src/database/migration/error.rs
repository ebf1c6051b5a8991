//! Error types for the migration engine.

use std::fmt;

use thiserror::Error;

use crate::database::core::StoreError;

/// The part of a migration transaction that failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MigrationStep {
    /// Opening the transaction
    Begin,
    /// The migration's own `up` or `down` procedure
    Body,
    /// Writing the new version to the tracking table
    RecordVersion,
    Commit,
}

impl fmt::Display for MigrationStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MigrationStep::Begin => write!(f, "begin transaction"),
            MigrationStep::Body => write!(f, "migration body"),
            MigrationStep::RecordVersion => write!(f, "record schema version"),
            MigrationStep::Commit => write!(f, "commit"),
        }
    }
}

/// Migration engine errors
#[derive(Debug, Error)]
pub enum MigrationError {
    /// The tracking tables could not be created; nothing was attempted.
    #[error("failed to bootstrap schema tracking tables")]
    Bootstrap(#[source] StoreError),

    /// The current version could not be read for a reason other than
    /// "not yet initialized".
    #[error("failed to read current schema version")]
    ReadVersion(#[source] StoreError),

    /// The lock table could not be read or written.
    #[error("failed to acquire migration lock")]
    Lock(#[source] StoreError),

    /// Another invocation holds a fresh migration lock.
    #[error("migration lock is held by {holder} since {acquired_at}")]
    Locked { holder: String, acquired_at: i64 },

    /// A pending migration failed. Every earlier migration in the run is
    /// committed and `committed_version` is the durable schema version.
    #[error("migration v{version} failed during {step}, schema is at v{committed_version}")]
    Apply {
        version: i64,
        step: MigrationStep,
        old_version: i64,
        committed_version: i64,
        #[source]
        source: anyhow::Error,
    },

    /// Reverting a migration failed. Every earlier revert in the run is
    /// committed and `committed_version` is the durable schema version.
    #[error("rollback of v{version} failed during {step}, schema is at v{committed_version}")]
    Rollback {
        version: i64,
        step: MigrationStep,
        old_version: i64,
        committed_version: i64,
        #[source]
        source: anyhow::Error,
    },

    #[error("duplicate migration version {version}")]
    DuplicateVersion { version: i64 },

    #[error("invalid migration version {version}, versions must be positive")]
    InvalidVersion { version: i64 },

    /// The store records a version that no registered migration has.
    #[error("schema version {version} does not match any registered migration")]
    UnknownVersion { version: i64 },
}

impl MigrationError {
    /// The last durably committed schema version, when the failure happened
    /// after the version was known
    pub fn committed_version(&self) -> Option<i64> {
        match self {
            MigrationError::Apply {
                committed_version, ..
            }
            | MigrationError::Rollback {
                committed_version, ..
            } => Some(*committed_version),
            _ => None,
        }
    }
}
