//! Migration records and the registry they are collected in
//!
//! Schema-owning modules each expose their `up`/`down` procedures, and the
//! caller registers them into a [`MigrationRegistry`] before the runner is
//! invoked. [`MigrationRegistry::build`] freezes the registry into a
//! [`MigrationSet`], rejecting duplicate or non-positive versions.

use std::collections::HashSet;
use std::fmt;

use crate::database::core::StoreTransaction;

use super::error::MigrationError;
use super::select::select_pending;

/// A migration procedure: one opaque unit of work run inside a transaction
pub type MigrationFn = fn(&dyn StoreTransaction) -> anyhow::Result<()>;

/// A single versioned schema change
#[derive(Clone)]
pub struct Migration {
    /// Ordering key and durable position marker
    pub version: i64,
    pub name: Option<String>,
    /// Forward schema change
    pub up: MigrationFn,
    /// Inverse of `up`, only ever run by explicit rollback
    pub down: MigrationFn,
}

impl Migration {
    pub fn new(version: i64, up: MigrationFn, down: MigrationFn) -> Self {
        Self {
            version,
            name: None,
            up,
            down,
        }
    }

    /// Display label, e.g. `v2 (dependent_values)`
    pub fn label(&self) -> String {
        match &self.name {
            Some(name) => format!("v{} ({})", self.version, name),
            None => format!("v{}", self.version),
        }
    }
}

impl fmt::Debug for Migration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Migration")
            .field("version", &self.version)
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// Ordered collection of migrations, in registration order
#[derive(Debug, Default)]
pub struct MigrationRegistry {
    migrations: Vec<Migration>,
}

impl MigrationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a migration
    ///
    /// Never fails; versions are validated by [`build`](Self::build).
    pub fn register(&mut self, version: i64, up: MigrationFn, down: MigrationFn) -> &mut Self {
        self.migrations.push(Migration::new(version, up, down));
        self
    }

    /// Append a migration with a human-readable name
    pub fn register_named(
        &mut self,
        version: i64,
        name: &str,
        up: MigrationFn,
        down: MigrationFn,
    ) -> &mut Self {
        self.migrations.push(Migration {
            name: Some(name.to_string()),
            ..Migration::new(version, up, down)
        });
        self
    }

    pub fn len(&self) -> usize {
        self.migrations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.migrations.is_empty()
    }

    /// Validate and freeze the registry
    pub fn build(self) -> Result<MigrationSet, MigrationError> {
        let mut seen = HashSet::new();
        for migration in &self.migrations {
            if migration.version <= 0 {
                return Err(MigrationError::InvalidVersion {
                    version: migration.version,
                });
            }
            if !seen.insert(migration.version) {
                return Err(MigrationError::DuplicateVersion {
                    version: migration.version,
                });
            }
        }

        Ok(MigrationSet {
            migrations: self.migrations,
        })
    }
}

/// A validated, read-only set of migrations
///
/// Versions are unique and positive.
#[derive(Debug, Clone, Default)]
pub struct MigrationSet {
    migrations: Vec<Migration>,
}

impl MigrationSet {
    /// A set with no migrations
    pub fn empty() -> Self {
        Self::default()
    }

    /// All migrations, in registration order
    pub fn migrations(&self) -> &[Migration] {
        &self.migrations
    }

    pub fn len(&self) -> usize {
        self.migrations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.migrations.is_empty()
    }

    pub fn get(&self, version: i64) -> Option<&Migration> {
        self.migrations.iter().find(|m| m.version == version)
    }

    /// Highest registered version, or 0 when the set is empty
    pub fn latest_version(&self) -> i64 {
        self.migrations.iter().map(|m| m.version).max().unwrap_or(0)
    }

    /// Migrations above `current`, ascending
    pub fn pending(&self, current: i64) -> Vec<&Migration> {
        select_pending(&self.migrations, current)
    }

    /// Highest registered version below `version`, or 0 if there is none
    pub fn previous_version(&self, version: i64) -> i64 {
        self.migrations
            .iter()
            .map(|m| m.version)
            .filter(|v| *v < version)
            .max()
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noop(_tx: &dyn StoreTransaction) -> anyhow::Result<()> {
        Ok(())
    }

    #[test]
    fn test_register_keeps_order() {
        let mut registry = MigrationRegistry::new();
        registry
            .register(2, noop, noop)
            .register_named(1, "first", noop, noop);
        assert_eq!(registry.len(), 2);

        let set = registry.build().unwrap();
        let versions: Vec<i64> = set.migrations().iter().map(|m| m.version).collect();
        assert_eq!(versions, vec![2, 1]);
        assert_eq!(set.get(1).unwrap().label(), "v1 (first)");
        assert_eq!(set.get(2).unwrap().label(), "v2");
    }

    #[test]
    fn test_build_rejects_duplicates() {
        let mut registry = MigrationRegistry::new();
        registry
            .register(1, noop, noop)
            .register(2, noop, noop)
            .register(1, noop, noop);

        match registry.build() {
            Err(MigrationError::DuplicateVersion { version }) => assert_eq!(version, 1),
            other => panic!("expected duplicate version error, got {:?}", other),
        }
    }

    #[test]
    fn test_build_rejects_non_positive() {
        let mut registry = MigrationRegistry::new();
        registry.register(0, noop, noop);

        assert!(matches!(
            registry.build(),
            Err(MigrationError::InvalidVersion { version: 0 })
        ));

        let mut registry = MigrationRegistry::new();
        registry.register(-4, noop, noop);
        assert!(matches!(
            registry.build(),
            Err(MigrationError::InvalidVersion { version: -4 })
        ));
    }

    #[test]
    fn test_empty_set() {
        let set = MigrationRegistry::new().build().unwrap();
        assert!(set.is_empty());
        assert_eq!(set.latest_version(), 0);
        assert!(set.pending(0).is_empty());
    }

    #[test]
    fn test_versions() {
        let mut registry = MigrationRegistry::new();
        registry
            .register(5, noop, noop)
            .register(1, noop, noop)
            .register(3, noop, noop);
        let set = registry.build().unwrap();

        assert_eq!(set.latest_version(), 5);
        assert_eq!(set.previous_version(5), 3);
        assert_eq!(set.previous_version(3), 1);
        assert_eq!(set.previous_version(1), 0);
        assert_eq!(set.previous_version(4), 3);
    }
}
