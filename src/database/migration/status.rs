//! Schema status reporting

use std::fmt;

use serde::Serialize;

use super::registry::MigrationSet;

/// Status of a store relative to a [`MigrationSet`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SchemaStatus {
    /// No version has ever been recorded (fresh database)
    NotInitialized,

    /// Every registered migration is applied
    Current { version: i64 },

    /// Registered migrations above the recorded version remain
    Pending {
        from: i64,
        to: i64,
        pending: Vec<i64>,
    },

    /// Database was migrated by a build with newer migrations
    Ahead {
        database_version: i64,
        latest_version: i64,
    },
}

impl SchemaStatus {
    /// Classify a recorded version against the set
    pub fn classify(migrations: &MigrationSet, version: i64) -> Self {
        let latest_version = migrations.latest_version();
        if version > latest_version {
            return SchemaStatus::Ahead {
                database_version: version,
                latest_version,
            };
        }

        let pending: Vec<i64> = migrations.pending(version).iter().map(|m| m.version).collect();
        if pending.is_empty() {
            SchemaStatus::Current { version }
        } else {
            SchemaStatus::Pending {
                from: version,
                to: latest_version,
                pending,
            }
        }
    }

    /// Recorded version, 0 when not initialized
    pub fn version(&self) -> i64 {
        match self {
            SchemaStatus::NotInitialized => 0,
            SchemaStatus::Current { version } => *version,
            SchemaStatus::Pending { from, .. } => *from,
            SchemaStatus::Ahead {
                database_version, ..
            } => *database_version,
        }
    }

    pub fn needs_migration(&self) -> bool {
        matches!(
            self,
            SchemaStatus::NotInitialized | SchemaStatus::Pending { .. }
        )
    }
}

impl fmt::Display for SchemaStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SchemaStatus::NotInitialized => write!(f, "not initialized"),
            SchemaStatus::Current { version } => write!(f, "current (v{})", version),
            SchemaStatus::Pending { from, to, pending } => write!(
                f,
                "{} migration(s) pending (v{} -> v{})",
                pending.len(),
                from,
                to
            ),
            SchemaStatus::Ahead {
                database_version,
                latest_version,
            } => write!(
                f,
                "database is at v{}, newer than latest known v{}",
                database_version, latest_version
            ),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MigrationState {
    Applied,
    Pending,
}

impl fmt::Display for MigrationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MigrationState::Applied => write!(f, "applied"),
            MigrationState::Pending => write!(f, "pending"),
        }
    }
}

/// One row of the per-migration status table
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[cfg_attr(feature = "display", derive(tabled::Tabled))]
pub struct MigrationInfo {
    pub version: i64,
    pub name: String,
    pub state: MigrationState,
}

/// Describe every registered migration relative to `current`, ascending
pub fn describe_migrations(migrations: &MigrationSet, current: i64) -> Vec<MigrationInfo> {
    let mut infos: Vec<MigrationInfo> = migrations
        .migrations()
        .iter()
        .map(|m| MigrationInfo {
            version: m.version,
            name: m.name.clone().unwrap_or_else(|| "-".to_string()),
            state: if m.version <= current {
                MigrationState::Applied
            } else {
                MigrationState::Pending
            },
        })
        .collect();
    infos.sort_by_key(|info| info.version);
    infos
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::core::StoreTransaction;
    use crate::database::migration::MigrationRegistry;

    fn noop(_tx: &dyn StoreTransaction) -> anyhow::Result<()> {
        Ok(())
    }

    fn three() -> MigrationSet {
        let mut registry = MigrationRegistry::new();
        registry
            .register_named(2, "second", noop, noop)
            .register(1, noop, noop)
            .register(3, noop, noop);
        registry.build().unwrap()
    }

    #[test]
    fn test_classify() {
        let set = three();

        assert_eq!(
            SchemaStatus::classify(&set, 0),
            SchemaStatus::Pending {
                from: 0,
                to: 3,
                pending: vec![1, 2, 3]
            }
        );
        assert_eq!(
            SchemaStatus::classify(&set, 3),
            SchemaStatus::Current { version: 3 }
        );
        assert_eq!(
            SchemaStatus::classify(&set, 9),
            SchemaStatus::Ahead {
                database_version: 9,
                latest_version: 3
            }
        );
        assert_eq!(
            SchemaStatus::classify(&MigrationSet::empty(), 0),
            SchemaStatus::Current { version: 0 }
        );
    }

    #[test]
    fn test_needs_migration() {
        assert!(SchemaStatus::NotInitialized.needs_migration());
        assert!(SchemaStatus::classify(&three(), 1).needs_migration());
        assert!(!SchemaStatus::classify(&three(), 3).needs_migration());
        assert!(!SchemaStatus::classify(&three(), 4).needs_migration());
    }

    #[test]
    fn test_status_json() {
        let json = serde_json::to_value(SchemaStatus::Current { version: 2 }).unwrap();
        assert_eq!(json["status"], "current");
        assert_eq!(json["version"], 2);
    }

    #[test]
    fn test_describe_migrations() {
        let infos = describe_migrations(&three(), 1);

        let rows: Vec<(i64, &str, MigrationState)> = infos
            .iter()
            .map(|i| (i.version, i.name.as_str(), i.state))
            .collect();
        assert_eq!(
            rows,
            vec![
                (1, "-", MigrationState::Applied),
                (2, "second", MigrationState::Pending),
                (3, "-", MigrationState::Pending),
            ]
        );
    }
}
