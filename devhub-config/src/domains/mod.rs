//! Domain-specific configuration modules

pub mod deployment;
pub mod logging;
pub mod migration;
pub mod store;
pub mod utils;

use crate::error::ConfigResult;
use crate::validation::Validatable;
use serde::{Deserialize, Serialize};

/// Main devhub configuration combining all domains
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DevhubConfig {
    /// Data location and database naming
    pub store: store::StoreConfig,

    /// Migration run settings
    pub migration: migration::MigrationConfig,

    /// Deployment description
    pub deployment: deployment::DeploymentConfig,

    /// Logging configuration
    pub logging: logging::LoggingConfig,
}

impl DevhubConfig {
    /// Validate all domain configurations
    pub fn validate_all(&self) -> ConfigResult<()> {
        self.store.validate()?;
        self.migration.validate()?;
        self.deployment.validate()?;
        self.logging.validate()?;
        Ok(())
    }

    /// Generate a sample configuration file
    pub fn generate_sample() -> String {
        let config = DevhubConfig::default();
        serde_yaml::to_string(&config)
            .unwrap_or_else(|_| "# Failed to generate sample config".to_string())
    }
}
