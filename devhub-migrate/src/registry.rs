//! Ordered, validated set of migrations

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::{error::RegistrationError, migration::Migration};

/// Migrations keyed by version.
///
/// Built once at startup and handed to the runner; versions are positive and
/// unique, and iteration is always in ascending version order regardless of
/// registration order.
#[derive(Debug, Default, Clone)]
pub struct MigrationRegistry {
    migrations: BTreeMap<i64, Arc<dyn Migration>>,
}

impl MigrationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register every migration, stopping at the first invalid one
    pub fn from_migrations<I>(migrations: I) -> Result<Self, RegistrationError>
    where
        I: IntoIterator<Item = Arc<dyn Migration>>,
    {
        let mut registry = Self::new();
        for migration in migrations {
            registry.register(migration)?;
        }
        Ok(registry)
    }

    /// Add a migration
    pub fn register(&mut self, migration: Arc<dyn Migration>) -> Result<(), RegistrationError> {
        let version = migration.version();
        if version <= 0 {
            return Err(RegistrationError::NonPositiveVersion {
                version,
                description: migration.description().to_string(),
            });
        }
        if let Some(existing) = self.migrations.get(&version) {
            return Err(RegistrationError::DuplicateVersion {
                version,
                existing: existing.description().to_string(),
                duplicate: migration.description().to_string(),
            });
        }
        self.migrations.insert(version, migration);
        Ok(())
    }

    /// Migrations in ascending version order
    pub fn list_ordered(&self) -> Vec<Arc<dyn Migration>> {
        self.migrations.values().cloned().collect()
    }

    pub fn versions(&self) -> Vec<i64> {
        self.migrations.keys().copied().collect()
    }

    /// Highest registered version, 0 when empty
    pub fn latest_version(&self) -> i64 {
        self.migrations.keys().next_back().copied().unwrap_or(0)
    }

    pub fn get(&self, version: i64) -> Option<Arc<dyn Migration>> {
        self.migrations.get(&version).cloned()
    }

    /// Next lower registered version, 0 if none
    pub fn version_below(&self, version: i64) -> i64 {
        self.migrations
            .range(..version)
            .next_back()
            .map(|(v, _)| *v)
            .unwrap_or(0)
    }

    pub fn len(&self) -> usize {
        self.migrations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.migrations.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::NoopMigration;

    fn registry(versions: &[i64]) -> Result<MigrationRegistry, RegistrationError> {
        MigrationRegistry::from_migrations(
            versions
                .iter()
                .map(|v| Arc::new(NoopMigration::new(*v)) as Arc<dyn Migration>),
        )
    }

    #[test]
    fn test_list_ordered_ignores_declaration_order() {
        let registry = registry(&[10, 2, 5, 1]).unwrap();
        let versions: Vec<i64> = registry.list_ordered().iter().map(|m| m.version()).collect();
        assert_eq!(versions, vec![1, 2, 5, 10]);
        assert_eq!(registry.latest_version(), 10);
        assert_eq!(registry.len(), 4);
    }

    #[test]
    fn test_rejects_duplicates_and_non_positive() {
        assert!(matches!(
            registry(&[1, 2, 2]),
            Err(RegistrationError::DuplicateVersion { version: 2, .. })
        ));
        assert!(matches!(
            registry(&[1, 0]),
            Err(RegistrationError::NonPositiveVersion { version: 0, .. })
        ));
        assert!(matches!(
            registry(&[-3]),
            Err(RegistrationError::NonPositiveVersion { version: -3, .. })
        ));
    }

    #[test]
    fn test_version_below() {
        let registry = registry(&[1, 2, 5, 10]).unwrap();
        assert_eq!(registry.version_below(10), 5);
        assert_eq!(registry.version_below(5), 2);
        assert_eq!(registry.version_below(7), 5);
        assert_eq!(registry.version_below(1), 0);
        assert!(registry.get(3).is_none());
        assert_eq!(MigrationRegistry::new().latest_version(), 0);
    }
}
