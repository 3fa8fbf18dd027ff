//! Migration catalog for devhub databases
//!
//! Every migration the service ships, in one place. The same catalog is
//! applied to the default database and to each tenant database.

use devhub_migrate::{Migration, MigrationRegistry, RegistrationError};
use std::sync::Arc;

pub mod v0001_users_email_index;
pub mod v0002_users_origin;
pub mod v0003_devices_auth_sets_count;
pub mod v0004_users_email_normalized;
pub mod v0005_tokens_hashed;
pub mod v0006_tenants_plan;
pub mod v0010_devices_drop_identity_index;

/// Collections touched by the catalog
pub mod collections {
    pub const USERS: &str = "users";
    pub const DEVICES: &str = "devices";
    pub const AUTH_SETS: &str = "auth_sets";
    pub const TOKENS: &str = "tokens";
    pub const TENANTS: &str = "tenants";
}

/// All shipped migrations
pub fn catalog() -> Vec<Arc<dyn Migration>> {
    vec![
        Arc::new(v0001_users_email_index::UsersEmailIndex),
        Arc::new(v0002_users_origin::UsersOrigin),
        Arc::new(v0003_devices_auth_sets_count::DevicesAuthSetsCount),
        Arc::new(v0004_users_email_normalized::UsersEmailNormalized),
        Arc::new(v0005_tokens_hashed::TokensHashed),
        Arc::new(v0006_tenants_plan::TenantsPlan),
        Arc::new(v0010_devices_drop_identity_index::DevicesDropIdentityIndex),
    ]
}

/// Validated registry over [`catalog`]
pub fn registry() -> Result<MigrationRegistry, RegistrationError> {
    MigrationRegistry::from_migrations(catalog())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catalog_registers() {
        let registry = registry().unwrap();
        assert_eq!(registry.versions(), vec![1, 2, 3, 4, 5, 6, 10]);
        assert_eq!(registry.latest_version(), 10);
        assert_eq!(registry.version_below(10), 6);
    }
}
